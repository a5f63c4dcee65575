//! Sign-in Screen
//!
//! Mounts the Google Identity Services button through JS reflection. The
//! script loads asynchronously, so mounting is retried for a while.

use gloo_timers::future::TimeoutFuture;
use js_sys::{Function, Object, Reflect};
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::context::use_app_context;

const MOUNT_ATTEMPTS: u32 = 50;
const MOUNT_RETRY_MS: u32 = 200;

fn prop(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    let value = Reflect::get(target, &JsValue::from_str(key))?;
    if value.is_undefined() || value.is_null() {
        return Err(JsValue::from_str(&format!("{} is not available", key)));
    }
    Ok(value)
}

fn mount_google_button(client_id: &str, target: &web_sys::HtmlElement, on_credential: Callback<String>) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let id_api = prop(&prop(&prop(&window, "google")?, "accounts")?, "id")?;

    let callback = Closure::<dyn FnMut(JsValue)>::new(move |response: JsValue| {
        let credential = Reflect::get(&response, &JsValue::from_str("credential"))
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default();
        on_credential.run(credential);
    });

    let config = Object::new();
    Reflect::set(&config, &"client_id".into(), &client_id.into())?;
    Reflect::set(&config, &"callback".into(), callback.as_ref())?;
    let initialize: Function = prop(&id_api, "initialize")?.dyn_into()?;
    initialize.call1(&id_api, &config)?;

    let options = Object::new();
    Reflect::set(&options, &"theme".into(), &"outline".into())?;
    Reflect::set(&options, &"size".into(), &"large".into())?;
    Reflect::set(&options, &"text".into(), &"signin_with".into())?;
    let render: Function = prop(&id_api, "renderButton")?.dyn_into()?;
    render.call2(&id_api, target, &options)?;

    // GIS keeps calling back for the lifetime of the page
    callback.forget();
    Ok(())
}

#[component]
pub fn SignIn(#[prop(into)] on_credential: Callback<String>, #[prop(into)] busy: Signal<bool>) -> impl IntoView {
    let ctx = use_app_context();
    let client_id = ctx.sync().config().client_id.clone();
    let button_ref = NodeRef::<leptos::html::Div>::new();
    let (problem, set_problem) = signal(None::<String>);

    if client_id.is_empty() {
        set_problem.set(Some("Sign-in is not configured (SCOT_CLIENT_ID).".to_string()));
    }

    Effect::new(move |mounted: Option<bool>| {
        if mounted == Some(true) {
            return true;
        }
        let Some(el) = button_ref.get() else { return false };
        if client_id.is_empty() {
            return true;
        }
        let client_id = client_id.clone();
        spawn_local(async move {
            for attempt in 1..=MOUNT_ATTEMPTS {
                match mount_google_button(&client_id, &el, on_credential) {
                    Ok(()) => return,
                    Err(e) if attempt == MOUNT_ATTEMPTS => {
                        log::error!("sign-in button unavailable: {:?}", e);
                        set_problem.set(Some("Google sign-in could not be loaded. Reload the page.".to_string()));
                    }
                    Err(_) => TimeoutFuture::new(MOUNT_RETRY_MS).await,
                }
            }
        });
        true
    });

    view! {
        <div class="sign-in-screen">
            <div class="sign-in-card">
                <h1>"SCOT Follow-ups"</h1>
                <p class="sign-in-hint">"Sign in with your company Google account."</p>
                <div class="gsi-button" node_ref=button_ref></div>
                <Show when=move || busy.get()>
                    <p class="sign-in-busy">"Signing in…"</p>
                </Show>
                {move || problem.get().map(|p| view! { <p class="sign-in-error">{p}</p> })}
            </div>
        </div>
    }
}
