#![allow(warnings)]
//! SCOT Portal Frontend Entry Point

mod app;
mod components;
mod config;
mod context;
mod logger;
mod platform;
mod store;

use app::App;
use leptos::prelude::*;

fn main() {
    console_error_panic_hook::set_once();
    let debug = logger::debug_requested();
    logger::init(debug);
    log::info!("SCOT portal starting");
    mount_to_body(move || view! { <App debug=debug /> });
}
