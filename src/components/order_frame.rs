//! Embedded Order Form
//!
//! Hosts the order-entry peer in an iframe, hands it the session and dealer
//! list, and reports its success messages.

use leptos::ev;
use leptos::prelude::*;
use serde::Serialize;
use serde_json::Value;

use scot_sync::embed::{allowed_origins, order_punch_url, parse_peer_message, HostMessage, OrderPunched, PeerSession};
use scot_sync::FollowupContext;

use crate::context::use_app_context;
use crate::store::{use_app_store, AppStateStoreFields};

/// Who the form is talking to, captured when the frame mounts
#[derive(Clone)]
struct PeerTarget {
    origins: Vec<String>,
    email: String,
    name: String,
    id_token: String,
}

fn post_handshake(frame: &web_sys::HtmlIFrameElement, target: &PeerTarget, dealers: &[String]) {
    let Some(peer) = frame.content_window() else { return };
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    for message in HostMessage::handshake(dealers, &target.email, &target.name, &target.id_token) {
        let value = match message.serialize(&serializer) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("could not encode order form message: {}", e);
                continue;
            }
        };
        // Only the window actually at that origin receives it
        for origin in &target.origins {
            if let Err(e) = peer.post_message(&value, origin) {
                log::warn!("order form handshake to {} failed: {:?}", origin, e);
            }
        }
    }
}

#[component]
pub fn OrderFrame(
    #[prop(optional)] followup: Option<FollowupContext>,
    #[prop(into)] on_punched: Callback<OrderPunched>,
) -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();
    let sync = ctx.sync();
    let config = sync.config();

    let user = store.user().get_untracked().unwrap_or_default();
    let target = PeerTarget {
        origins: allowed_origins(&config.order_punch_origin()),
        email: user.email,
        name: user.name,
        id_token: sync.state().id_token.unwrap_or_default(),
    };
    let parent_origin = window().location().origin().unwrap_or_default();
    let src = order_punch_url(
        &config.order_punch_url,
        PeerSession {
            email: &target.email,
            name: &target.name,
            id_token: &target.id_token,
            parent_origin: &parent_origin,
        },
        followup.as_ref(),
    );

    let frame_ref = NodeRef::<leptos::html::Iframe>::new();

    // Resend whenever the dealer list changes; the load handler covers reloads
    let on_dealers = target.clone();
    Effect::new(move |_| {
        let dealers = store.dealers().get();
        if let Some(frame) = frame_ref.get_untracked() {
            post_handshake(&frame, &on_dealers, &dealers);
        }
    });
    let on_load = target.clone();
    let loaded = move |_| {
        if let Some(frame) = frame_ref.get_untracked() {
            post_handshake(&frame, &on_load, &store.dealers().get_untracked());
        }
    };

    let allowed = target.origins.clone();
    let listener = window_event_listener(ev::message, move |event: web_sys::MessageEvent| {
        let Ok(data) = serde_wasm_bindgen::from_value::<Value>(event.data()) else { return };
        let Some(punched) = parse_peer_message(&event.origin(), &data, &allowed) else { return };
        if followup.as_ref().is_some_and(|slot| !punched.matches(slot)) {
            log::debug!("ignoring order form message for another call slot");
            return;
        }
        on_punched.run(punched);
    });
    on_cleanup(move || listener.remove());

    match src {
        Ok(src) => view! {
            <iframe
                class="order-frame"
                title="Order form"
                src=src
                referrerpolicy="no-referrer"
                node_ref=frame_ref
                on:load=loaded
            ></iframe>
        }
        .into_any(),
        Err(e) => {
            log::error!("order form unavailable: {}", e);
            view! { <p class="form-error">"The order form is not configured correctly."</p> }.into_any()
        }
    }
}
