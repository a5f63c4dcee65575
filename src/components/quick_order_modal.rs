//! Quick Order Modal
//!
//! "New Order" flow without a call slot: the native sales-order form. Once
//! intake accepts the order the dealer's row is marked OR.

use leptos::prelude::*;

use scot_sync::SalesOrderReceipt;

use crate::components::followup_modal::delivery_notice;
use crate::components::{ModalShell, SalesOrderForm};
use crate::context::use_app_context;

#[component]
pub fn QuickOrderModal() -> impl IntoView {
    let ctx = use_app_context();

    let close = Callback::new(move |_: ()| ctx.quick_order_open.set(false));

    let on_done = Callback::new(move |receipt: SalesOrderReceipt| {
        match &receipt.marked {
            Ok(delivery) => ctx.toast(format!("Order for {}: {}", receipt.dealer_name, delivery_notice(delivery))),
            Err(e) => {
                log::warn!("order {} went in but its row was not marked: {}", receipt.order_id, e);
                ctx.toast(format!("Order submitted, but follow-ups were not updated: {}", e.user_message()));
            }
        }
        ctx.quick_order_open.set(false);
    });

    view! {
        <ModalShell title="New Order" on_close=close wide=true>
            <SalesOrderForm on_done=on_done on_cancel=close />
        </ModalShell>
    }
}
