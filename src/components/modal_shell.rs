//! Modal Shell Component
//!
//! Backdrop and frame shared by every dialog. Background polling is held
//! while a modal is mounted.

use leptos::prelude::*;

use crate::context::use_app_context;

#[component]
pub fn ModalShell(
    #[prop(into)] title: String,
    #[prop(into)] on_close: Callback<()>,
    #[prop(optional)] wide: bool,
    children: Children,
) -> impl IntoView {
    let ctx = use_app_context();
    ctx.sync().suspend_polling();
    on_cleanup(move || ctx.sync().resume_polling());

    view! {
        <div class="modal-backdrop" on:click=move |_| on_close.run(())>
            <div
                class=if wide { "modal wide" } else { "modal" }
                on:click=|ev| ev.stop_propagation()
            >
                <div class="modal-header">
                    <h3>{title}</h3>
                    <button class="modal-close" title="Close" on:click=move |_| on_close.run(())>
                        "✕"
                    </button>
                </div>
                <div class="modal-body">{children()}</div>
            </div>
        </div>
    }
}
