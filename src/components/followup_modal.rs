//! Follow-up Modal
//!
//! Outcome form for one call slot. `OR` is never submitted by hand: the
//! embedded order form reports the punched order and the outcome is recorded
//! from that.

use leptos::prelude::*;
use leptos::task::spawn_local;

use scot_sync::dates::format_date_label;
use scot_sync::embed::OrderPunched;
use scot_sync::{Delivery, FollowupContext, Outcome};

use crate::components::{ModalShell, OrderFrame};
use crate::context::use_app_context;
use crate::platform::local_input_to_utc;

pub fn delivery_notice(delivery: &Delivery) -> &'static str {
    match delivery {
        Delivery::Confirmed(_) => "Saved",
        _ => "Sent. It will show up after the next sync.",
    }
}

#[component]
pub fn FollowupModal(followup: FollowupContext) -> impl IntoView {
    let ctx = use_app_context();
    let slot = StoredValue::new(followup.clone());

    let (outcome, set_outcome) = signal(None::<Outcome>);
    let (remark, set_remark) = signal(String::new());
    let (next_at, set_next_at) = signal(String::new());
    let (error, set_error) = signal(None::<String>);
    let (busy, set_busy) = signal(false);

    let close = Callback::new(move |_: ()| ctx.followup.set(None));

    let finish = move |result: scot_sync::SyncResult<Delivery>| match result {
        Ok(delivery) => {
            ctx.toast(delivery_notice(&delivery));
            ctx.followup.set(None);
        }
        Err(e) => {
            set_error.set(Some(e.user_message()));
            set_busy.set(false);
        }
    };

    let submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if busy.get_untracked() {
            return;
        }
        set_error.set(None);
        set_busy.set(true);
        let schedule_at = local_input_to_utc(&next_at.get_untracked());
        spawn_local(async move {
            let result = ctx
                .sync()
                .record_outcome(&slot.get_value(), outcome.get_untracked(), &remark.get_untracked(), schedule_at)
                .await;
            finish(result);
        });
    };

    let on_punched = Callback::new(move |_: OrderPunched| {
        if busy.get_untracked() {
            return;
        }
        set_busy.set(true);
        spawn_local(async move {
            let result = ctx.sync().auto_mark_order_received(&slot.get_value(), &remark.get_untracked()).await;
            finish(result);
        });
    });

    let title = format!("{} · Call {}", followup.client_name, followup.call_n);
    let planned = format_date_label(followup.call_date);

    view! {
        <ModalShell title=title on_close=close wide=true>
            <form class="followup-form" on:submit=submit>
                <p class="muted">"Planned for " {planned}</p>

                <label>
                    "Outcome"
                    <select on:change=move |ev| set_outcome.set(Outcome::from_code(&event_target_value(&ev)))>
                        <option value="" selected=true>"Select…"</option>
                        {Outcome::ALL.into_iter().map(|o| view! {
                            <option value=o.code()>{o.label()}</option>
                        }).collect_view()}
                    </select>
                </label>

                <Show when=move || outcome.get() == Some(Outcome::ScheduleFollowup)>
                    <label>
                        "Next follow-up"
                        <input
                            type="datetime-local"
                            prop:value=move || next_at.get()
                            on:input=move |ev| set_next_at.set(event_target_value(&ev))
                        />
                    </label>
                </Show>

                <label>
                    "Remark"
                    <textarea
                        rows="3"
                        prop:value=move || remark.get()
                        on:input=move |ev| set_remark.set(event_target_value(&ev))
                    ></textarea>
                </label>

                <Show
                    when=move || outcome.get() == Some(Outcome::OrderReceived)
                    fallback=move || view! {
                        <button type="submit" class="btn primary" disabled=move || busy.get()>
                            {move || if busy.get() { "Saving…" } else { "Save" }}
                        </button>
                    }
                >
                    <p class="hint">"Punch the order below. The call is marked OR once the form confirms."</p>
                    <OrderFrame followup=slot.get_value() on_punched=on_punched />
                </Show>

                {move || error.get().map(|e| view! { <p class="form-error">{e}</p> })}
            </form>
        </ModalShell>
    }
}
