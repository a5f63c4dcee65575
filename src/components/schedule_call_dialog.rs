//! Schedule Call Dialog
//!
//! Books a follow-up call for the dealer behind an order, in the dealer's
//! first free call slot.

use leptos::prelude::*;
use leptos::task::spawn_local;

use scot_sync::dates::format_date_label;
use scot_sync::models::find_dealer;
use scot_sync::OrderSummaryEntry;

use crate::components::ModalShell;
use crate::context::use_app_context;
use crate::store::{use_app_store, AppStateStoreFields};

#[component]
pub fn ScheduleCallDialog(order: OrderSummaryEntry) -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();

    let preselected = store
        .dealers()
        .with_untracked(|dealers| find_dealer(dealers, &order.dealer_name).map(str::to_string))
        .unwrap_or_else(|| order.dealer_name.clone());
    let (dealer, set_dealer) = signal(preselected);
    let (error, set_error) = signal(None::<String>);
    let (busy, set_busy) = signal(false);
    let order = StoredValue::new(order);

    let close = Callback::new(move |_: ()| ctx.scheduling.set(None));

    let confirm = move |_| {
        if busy.get_untracked() {
            return;
        }
        set_error.set(None);
        set_busy.set(true);
        spawn_local(async move {
            match ctx.sync().schedule_followup(&order.get_value(), &dealer.get_untracked()).await {
                Ok(scheduled) => {
                    ctx.toast(format!(
                        "Call {} scheduled for {}",
                        scheduled.call_n,
                        format_date_label(scheduled.target.planned_date)
                    ));
                    ctx.scheduling.set(None);
                }
                Err(e) => {
                    set_error.set(Some(e.user_message()));
                    set_busy.set(false);
                }
            }
        });
    };

    let title = format!("Schedule Call · {}", order.with_value(|o| o.order_id.clone()));

    view! {
        <ModalShell title=title on_close=close>
            <p class="muted">
                "A follow-up is booked " {ctx.sync().config().followup_offset_days} " days out, in the first free call slot."
            </p>
            <label>
                "Dealer"
                <select on:change=move |ev| set_dealer.set(event_target_value(&ev))>
                    {move || {
                        let selected = dealer.get_untracked();
                        let mut options = store.dealers().get();
                        if find_dealer(&options, &selected).is_none() && !selected.trim().is_empty() {
                            options.insert(0, selected.clone());
                        }
                        options
                            .into_iter()
                            .map(|d| {
                                let is_selected = d == selected;
                                view! { <option value=d.clone() selected=is_selected>{d.clone()}</option> }
                            })
                            .collect_view()
                    }}
                </select>
            </label>
            {move || error.get().map(|e| view! { <p class="form-error">{e}</p> })}
            <div class="dialog-actions">
                <button class="btn subtle" on:click=move |_| close.run(())>"Cancel"</button>
                <button class="btn primary" disabled=move || busy.get() on:click=confirm>
                    {move || if busy.get() { "Scheduling…" } else { "Schedule" }}
                </button>
            </div>
        </ModalShell>
    }
}
