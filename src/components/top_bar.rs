//! Top Bar Component
//!
//! Reference date, due/overdue badges, sync indicator and session controls.

use leptos::prelude::*;

use scot_sync::dates::{format_date_label, overdue_count};

use crate::context::use_app_context;
use crate::store::{use_app_store, AppStateStoreFields};

#[component]
pub fn TopBar(#[prop(into)] on_sign_out: Callback<()>) -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();

    let date_label = move || store.today().get().map(format_date_label).unwrap_or_else(|| "—".to_string());
    let due = move || store.items().with(Vec::len);
    let overdue = move || {
        let today = store.today().get();
        let now = ctx.now_utc();
        store.items().with(|items| overdue_count(items, today, now))
    };
    let user = move || store.user().get().unwrap_or_default();

    view! {
        <header class="top-bar">
            <div class="top-bar-title">
                <span class="app-name">"SCOT"</span>
                <span class="date-label">{date_label}</span>
            </div>

            <div class="badges">
                <span class="badge due">{due} " due"</span>
                <span class=move || { if overdue() > 0 { "badge overdue active" } else { "badge overdue" } }>
                    {overdue} " overdue"
                </span>
                <Show when=move || store.syncing().get()>
                    <span class="syncing">"Syncing…"</span>
                </Show>
            </div>

            <div class="top-bar-actions">
                <button
                    class="btn"
                    disabled=move || store.syncing().get()
                    on:click=move |_| ctx.reload()
                >
                    "Refresh"
                </button>
                <button class="btn primary" on:click=move |_| ctx.quick_order_open.set(true)>
                    "New Order"
                </button>
                <span class="user" title=move || user().email>
                    {move || {
                        let picture = user().picture;
                        (!picture.is_empty()).then(|| view! { <img class="avatar" src=picture alt="" /> })
                    }}
                    {move || {
                        let u = user();
                        if u.name.is_empty() { u.email } else { u.name }
                    }}
                </span>
                <button class="btn subtle" on:click=move |_| on_sign_out.run(())>
                    "Sign out"
                </button>
            </div>
        </header>
    }
}

/// Last sync failure with a retry action
#[component]
pub fn SyncErrorBanner() -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();

    view! {
        {move || store.last_error().get().map(|message| view! {
            <div class="sync-error" role="alert">
                <span>"Sync error: " {message}</span>
                <button class="btn small" on:click=move |_| ctx.reload()>"Retry"</button>
            </div>
        })}
    }
}
