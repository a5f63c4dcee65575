//! Toast Component

use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::context::use_app_context;

const TOAST_MS: u32 = 2_200;

/// Shows the latest notice, hiding it after a short delay
#[component]
pub fn Toast() -> impl IntoView {
    let ctx = use_app_context();
    let toast = ctx.toast;

    Effect::new(move |_| {
        if let Some((id, _)) = toast.get() {
            spawn_local(async move {
                TimeoutFuture::new(TOAST_MS).await;
                // a newer toast owns the timer now
                if toast.with_untracked(|t| t.as_ref().map(|(current, _)| *current) == Some(id)) {
                    toast.set(None);
                }
            });
        }
    });

    view! {
        {move || toast.get().map(|(_, message)| view! { <div class="toast" role="status">{message}</div> })}
    }
}
