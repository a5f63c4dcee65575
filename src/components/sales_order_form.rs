//! Sales Order Form
//!
//! Native "New Order" entry: dealer search (a name outside the list becomes a
//! new dealer and needs a color), marketing person, location and attachments.

use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use scot_sync::sales_order::{filter_dealers, DraftErrors};
use scot_sync::{ClientColor, OrderAttachment, SalesOrderDraft, SalesOrderReceipt};

use crate::context::use_app_context;
use crate::store::{use_app_store, AppStateStoreFields};

async fn read_attachment(file: web_sys::File) -> Result<OrderAttachment, String> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| format!("Could not read {}: {:?}", file.name(), e))?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    Ok(OrderAttachment::from_bytes(&file.name(), &file.type_(), &bytes))
}

async fn read_attachments(files: Vec<web_sys::File>) -> Result<Vec<OrderAttachment>, String> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        out.push(read_attachment(file).await?);
    }
    Ok(out)
}

fn selected_files(ev: &leptos::ev::Event) -> Vec<web_sys::File> {
    let Some(input) = ev.target().and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok()) else {
        return Vec::new();
    };
    let Some(list) = input.files() else { return Vec::new() };
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}

fn field_error(errors: ReadSignal<DraftErrors>, pick: fn(&DraftErrors) -> Option<String>) -> impl IntoView {
    move || errors.with(pick).map(|e| view! { <span class="form-error">{e}</span> })
}

#[component]
pub fn SalesOrderForm(
    #[prop(into)] on_done: Callback<SalesOrderReceipt>,
    #[prop(into)] on_cancel: Callback<()>,
) -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();

    let (dealer, set_dealer) = signal(String::new());
    let (marketing, set_marketing) = signal(String::new());
    let (location, set_location) = signal(String::new());
    let (color, set_color) = signal(None::<ClientColor>);
    let (files, set_files) = signal_local(Vec::<web_sys::File>::new());
    let (errors, set_errors) = signal(DraftErrors::default());
    let (submit_error, set_submit_error) = signal(None::<String>);
    let (busy, set_busy) = signal(false);

    let suggestions = Memo::new(move |_| filter_dealers(&store.dealers().get(), &dealer.get()));
    let is_new = Memo::new(move |_| {
        let draft = SalesOrderDraft { dealer_name: dealer.get(), ..SalesOrderDraft::default() };
        draft.is_new_dealer(&store.dealers().get())
    });

    let submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if busy.get_untracked() {
            return;
        }
        set_submit_error.set(None);

        let email = store.user().get_untracked().map(|u| u.email).unwrap_or_default();
        let dealers = store.dealers().get_untracked();
        let mut draft = SalesOrderDraft {
            dealer_name: dealer.get_untracked(),
            marketing_person_name: marketing.get_untracked(),
            dealer_location: location.get_untracked(),
            files: Vec::new(),
            new_dealer_color: color.get_untracked(),
        };
        let picked = files.get_untracked();
        let origin = window().location().origin().unwrap_or_default();

        set_busy.set(true);
        spawn_local(async move {
            let result = match read_attachments(picked).await {
                Ok(attachments) => {
                    draft.files = attachments;
                    let found = draft.validate(&email, &dealers);
                    let ok = found.is_empty();
                    set_errors.set(found);
                    if !ok {
                        set_busy.set(false);
                        return;
                    }
                    ctx.sync().submit_sales_order(&draft, &origin).await.map_err(|e| e.user_message())
                }
                Err(e) => Err(e),
            };
            set_busy.set(false);
            match result {
                Ok(receipt) => {
                    if let Some(warning) = &receipt.dealer_warning {
                        ctx.toast(warning.clone());
                    }
                    ctx.toast("Order submitted successfully.");
                    on_done.run(receipt);
                }
                Err(message) => {
                    ctx.toast(format!("Order submit failed: {}", message));
                    set_submit_error.set(Some(message));
                }
            }
        });
    };

    view! {
        <form class="sales-order-form" on:submit=submit>
            <label>
                "Dealer Name"
                <input
                    type="text"
                    list="sales-order-dealers"
                    autocomplete="off"
                    placeholder="Search or type a new dealer"
                    prop:value=move || dealer.get()
                    on:input=move |ev| set_dealer.set(event_target_value(&ev))
                />
                <datalist id="sales-order-dealers">
                    {move || suggestions.get().into_iter().map(|d| view! { <option value=d.clone()>{d.clone()}</option> }).collect_view()}
                </datalist>
                {field_error(errors, |e| e.dealer_name.clone())}
            </label>

            <Show when=move || is_new.get()>
                <fieldset class="new-dealer">
                    <legend>"New dealer color"</legend>
                    <div class="color-picker">
                        {ClientColor::PICKABLE.into_iter().map(|c| view! {
                            <label class="color-btn" style=format!("--dot:{}", c.hex())>
                                <input
                                    type="radio"
                                    name="new-dealer-color"
                                    prop:checked=move || color.get() == Some(c)
                                    on:change=move |_| set_color.set(Some(c))
                                />
                                {c.as_str()}
                            </label>
                        }).collect_view()}
                    </div>
                    {field_error(errors, |e| e.dealer_color.clone())}
                </fieldset>
            </Show>

            <label>
                "Marketing Person Name"
                <input
                    type="text"
                    prop:value=move || marketing.get()
                    on:input=move |ev| set_marketing.set(event_target_value(&ev))
                />
                {field_error(errors, |e| e.marketing_person_name.clone())}
            </label>

            <label>
                "Dealer Location"
                <input
                    type="text"
                    prop:value=move || location.get()
                    on:input=move |ev| set_location.set(event_target_value(&ev))
                />
                {field_error(errors, |e| e.dealer_location.clone())}
            </label>

            <label>
                "Order files"
                <input type="file" multiple=true on:change=move |ev| set_files.set(selected_files(&ev)) />
                {move || {
                    let n = files.with(Vec::len);
                    (n > 0).then(|| view! { <span class="muted">{format!("{} file(s) selected", n)}</span> })
                }}
                {field_error(errors, |e| e.files.clone())}
            </label>

            {field_error(errors, |e| e.auth.clone())}
            {move || submit_error.get().map(|e| view! { <p class="form-error">{e}</p> })}

            <div class="dialog-actions">
                <button type="button" class="btn subtle" disabled=move || busy.get() on:click=move |_| on_cancel.run(())>
                    "Cancel"
                </button>
                <button type="submit" class="btn primary" disabled=move || busy.get()>
                    {move || if busy.get() { "Submitting..." } else { "Submit" }}
                </button>
            </div>
        </form>
    }
}
