//! Diagnostics Panel (`?debug` only)

use leptos::prelude::*;

use crate::context::use_app_context;
use crate::platform::local_offset;
use crate::store::{use_app_store, AppStateStoreFields};

#[component]
pub fn Diagnostics() -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();
    let sync = ctx.sync();
    let config = sync.config().clone();

    let last_synced = move || {
        store
            .last_synced_at()
            .get()
            .map(|t| t.with_timezone(&local_offset()).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string())
    };
    let polling = move || {
        let _ = store.generation().get();
        if ctx.sync().is_polling() { "on" } else { "paused" }
    };

    view! {
        <details class="diagnostics">
            <summary>"Diagnostics"</summary>
            <dl>
                <dt>"API base"</dt><dd>{config.api_base.clone()}</dd>
                <dt>"Order form"</dt><dd>{config.order_punch_url.clone()}</dd>
                <dt>"Poll interval"</dt><dd>{config.poll_interval_secs} "s"</dd>
                <dt>"Polling"</dt><dd>{polling}</dd>
                <dt>"Cycle"</dt><dd>{move || store.generation().get()}</dd>
                <dt>"Last sync"</dt><dd>{last_synced}</dd>
                <dt>"Due items"</dt><dd>{move || store.items().with(Vec::len)}</dd>
                <dt>"Received / in process"</dt>
                <dd>{move || format!("{} / {}", store.received().with(Vec::len), store.in_process().with(Vec::len))}</dd>
                <dt>"Dealers"</dt><dd>{move || store.dealers().with(Vec::len)}</dd>
                <dt>"Last error"</dt><dd>{move || store.last_error().get().unwrap_or_else(|| "none".to_string())}</dd>
            </dl>
        </details>
    }
}
