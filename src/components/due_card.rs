//! Due Cards
//!
//! One card per dealer owed calls: call-slot buttons, follow-up countdown and
//! a lazily loaded remark history.

use chrono::{DateTime, NaiveDate, Utc};
use leptos::prelude::*;
use leptos::task::spawn_local;

use scot_sync::dates::{countdown, format_call_label, is_overdue, slot_is_active};
use scot_sync::models::{CallSlot, Remark};
use scot_sync::{DueItem, FollowupContext};

use crate::context::use_app_context;
use crate::platform::local_offset;
use crate::store::{use_app_store, AppStateStoreFields};

type CardKey = (u32, String, Option<DateTime<Utc>>, Vec<(u8, NaiveDate, Option<DateTime<Utc>>)>);

/// Re-render a card whenever anything it shows changes
fn card_key(item: &DueItem) -> CardKey {
    (
        item.row_index,
        item.remark_text.clone(),
        item.sf_future,
        item.due_calls.iter().map(|c| (c.call_n, c.call_date, c.sf_at)).collect(),
    )
}

#[component]
pub fn DueGrid() -> impl IntoView {
    let store = use_app_store();

    view! {
        <section class="due-grid">
            <Show
                when=move || !store.items().with(Vec::is_empty)
                fallback=|| view! { <p class="empty">"No follow-ups due."</p> }
            >
                <For
                    each=move || store.items().get()
                    key=card_key
                    children=move |item| view! { <DueCard item=item /> }
                />
            </Show>
        </section>
    }
}

#[component]
fn SlotButton(item: DueItem, slot: CallSlot) -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();
    let label = format!("Call {} · {}", slot.call_n, format_call_label(slot.call_date));
    let active = {
        let slot = slot.clone();
        move || slot_is_active(&slot, ctx.clock.get().naive_local())
    };
    let open = move |_| {
        ctx.followup.set(Some(FollowupContext::open(&item, &slot, store.today().get_untracked())));
    };

    view! {
        <button
            class={
                let active = active.clone();
                move || if active() { "slot-btn" } else { "slot-btn expired" }
            }
            disabled=move || !active()
            on:click=open
        >
            {label}
        </button>
    }
}

#[component]
pub fn DueCard(item: DueItem) -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();
    let (show_remarks, set_show_remarks) = signal(false);

    let overdue = {
        let item = item.clone();
        move || store.today().get().is_some_and(|day| is_overdue(&item, day, ctx.now_utc()))
    };
    let followup = item.sf_future.map(|at| {
        let when = at.with_timezone(&local_offset()).format("%d %b %H:%M").to_string();
        view! {
            <div class="card-countdown">
                <span class="countdown-when">"Follow-up " {when}</span>
                <span class=move || if countdown(at, ctx.now_utc()).is_overdue() { "countdown overdue" } else { "countdown" }>
                    {move || countdown(at, ctx.now_utc()).to_string()}
                </span>
            </div>
        }
    });
    let slots = item
        .due_calls
        .iter()
        .map(|slot| SlotButton(SlotButtonProps { item: item.clone(), slot: slot.clone() }))
        .collect_view();
    let client_name = item.client_name.clone();

    view! {
        <article class=move || if overdue() { "due-card overdue" } else { "due-card" }>
            <header class="card-header">
                <span class="color-dot" style=format!("background:{}", item.client_color.hex())></span>
                <h4 class="client-name">{item.client_name.clone()}</h4>
                <span class="row-index">"#" {item.row_index}</span>
            </header>
            {(!item.remark_text.is_empty()).then(|| view! { <p class="card-remark">{item.remark_text.clone()}</p> })}
            {followup}
            <div class="slots">{slots}</div>
            <button class="link-btn" on:click=move |_| set_show_remarks.update(|v| *v = !*v)>
                {move || if show_remarks.get() { "Hide remarks" } else { "Remarks" }}
            </button>
            <Show when=move || show_remarks.get()>
                <RemarkPanel client_name=client_name.clone() />
            </Show>
        </article>
    }
}

/// Follow-up remark history, fetched when the panel opens
#[component]
fn RemarkPanel(client_name: String) -> impl IntoView {
    let ctx = use_app_context();
    let (remarks, set_remarks) = signal(None::<Result<Vec<Remark>, String>>);

    spawn_local(async move {
        let result = ctx.sync().sf_remarks(&client_name).await.map_err(|e| e.user_message());
        set_remarks.set(Some(result));
    });

    let format_ts = |ts: Option<DateTime<Utc>>| {
        ts.map(|t| t.with_timezone(&local_offset()).format("%d %b %Y %H:%M").to_string())
            .unwrap_or_default()
    };

    view! {
        <div class="remark-panel">
            {move || match remarks.get() {
                None => view! { <p class="muted">"Loading…"</p> }.into_any(),
                Some(Err(e)) => view! { <p class="error">{e}</p> }.into_any(),
                Some(Ok(list)) if list.is_empty() => view! { <p class="muted">"No follow-up remarks yet."</p> }.into_any(),
                Some(Ok(list)) => view! {
                    <ul class="remark-list">
                        {list.into_iter().map(|r| view! {
                            <li>
                                <span class="remark-ts">{format_ts(r.ts)}</span>
                                <span class="remark-text">{r.remark}</span>
                            </li>
                        }).collect_view()}
                    </ul>
                }.into_any(),
            }}
        </div>
    }
}
