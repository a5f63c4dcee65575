//! Orders Panel
//!
//! Received and in-process orders from the order cycle summary.

use leptos::prelude::*;

use scot_sync::OrderSummaryEntry;

use crate::context::use_app_context;
use crate::platform::local_offset;
use crate::store::{use_app_store, AppStateStoreFields};

#[component]
pub fn OrdersPanel() -> impl IntoView {
    let store = use_app_store();

    view! {
        <aside class="orders-panel">
            <OrderList title="Orders Received" entries=Signal::derive(move || store.received().get()) />
            <OrderList title="In Process" entries=Signal::derive(move || store.in_process().get()) />
        </aside>
    }
}

#[component]
fn OrderList(title: &'static str, #[prop(into)] entries: Signal<Vec<OrderSummaryEntry>>) -> impl IntoView {
    view! {
        <section class="order-list">
            <h3>{title} " " <span class="count">{move || entries.with(Vec::len)}</span></h3>
            <Show
                when=move || !entries.with(Vec::is_empty)
                fallback=|| view! { <p class="empty">"Nothing here."</p> }
            >
                <For
                    each=move || entries.get()
                    key=|o| (o.order_id.clone(), o.ts, o.dealer_name.clone())
                    children=move |order| view! { <OrderRow order=order /> }
                />
            </Show>
        </section>
    }
}

#[component]
fn OrderRow(order: OrderSummaryEntry) -> impl IntoView {
    let ctx = use_app_context();
    let when = order
        .ts
        .map(|ts| ts.with_timezone(&local_offset()).format("%d %b %H:%M").to_string())
        .unwrap_or_default();
    let view_link = order.primary_url().map(|url| view! {
        <a class="btn small" href=url target="_blank" rel="noopener">"View"</a>
    });
    let location = (!order.location.is_empty()).then(|| view! { <span class="order-location">{order.location.clone()}</span> });
    let dealer = order.dealer_name.clone();
    let order_id = order.order_id.clone();

    view! {
        <div class="order-row">
            <div class="order-main">
                <span class="order-dealer">{dealer}</span>
                <span class="order-id">{order_id}</span>
            </div>
            <div class="order-meta">
                <span class="order-ts">{when}</span>
                {location}
            </div>
            <div class="order-actions">
                {view_link}
                <button class="btn small" on:click=move |_| ctx.scheduling.set(Some(order.clone()))>
                    "Schedule Call"
                </button>
            </div>
        </div>
    }
}
