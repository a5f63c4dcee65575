//! Order-Entry Peer
//!
//! Message contract with the embedded order-entry form, which runs on another
//! origin and talks to the dashboard only through `postMessage`.

use serde::Serialize;
use serde_json::Value;

use crate::error::SyncResult;
use crate::models::FollowupContext;
use crate::query::{origin_of, parse_url};
use crate::wire::{pick_value, value_to_string, value_to_u32};

const SCRIPT_ORIGIN: &str = "https://script.google.com";
const SCRIPT_CONTENT_ORIGIN: &str = "https://script.googleusercontent.com";

/// Messages the dashboard sends into the form
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum HostMessage {
    #[serde(rename = "DEALERS_INIT")]
    DealersInit { dealers: Vec<String>, email: String },
    #[serde(rename = "USER_CONTEXT")]
    UserContext { email: String, name: String, id_token: String },
}

impl HostMessage {
    /// The pair sent whenever the form (re)loads or the dealer list changes
    pub fn handshake(dealers: &[String], email: &str, name: &str, id_token: &str) -> [HostMessage; 2] {
        [
            HostMessage::DealersInit { dealers: dealers.to_vec(), email: email.to_string() },
            HostMessage::UserContext {
                email: email.to_string(),
                name: name.to_string(),
                id_token: id_token.to_string(),
            },
        ]
    }
}

/// Context the form echoes back with a punched order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PunchMeta {
    pub row_index: Option<u32>,
    pub call_n: Option<u32>,
    pub planned_date: Option<String>,
}

/// A success signal from the form
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPunched {
    pub dealer_name: String,
    pub meta: PunchMeta,
}

impl OrderPunched {
    /// Meta fields that are present must agree with the open slot
    pub fn matches(&self, ctx: &FollowupContext) -> bool {
        if self.meta.row_index.is_some_and(|r| r != ctx.row_index) {
            return false;
        }
        if self.meta.call_n.is_some_and(|n| n != u32::from(ctx.call_n)) {
            return false;
        }
        let call_date = ctx.call_date.format("%Y-%m-%d").to_string();
        if self.meta.planned_date.as_deref().is_some_and(|d| d != call_date) {
            return false;
        }
        true
    }
}

/// The configured origin plus its Apps Script twin. A full URL is reduced
/// to its origin first.
pub fn allowed_origins(origin: &str) -> Vec<String> {
    let trimmed = origin.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    let base = origin_of(trimmed).unwrap_or_else(|| trimmed.to_string());
    let twin = match base.as_str() {
        SCRIPT_ORIGIN => Some(SCRIPT_CONTENT_ORIGIN),
        SCRIPT_CONTENT_ORIGIN => Some(SCRIPT_ORIGIN),
        _ => None,
    };
    let mut out = vec![base];
    out.extend(twin.map(str::to_string));
    out
}

/// Accept `data` only from an allowed origin and only as a success signal
pub fn parse_peer_message(origin: &str, data: &Value, allowed: &[String]) -> Option<OrderPunched> {
    if !allowed.iter().any(|a| a == origin) {
        return None;
    }
    match data.get("type").and_then(Value::as_str) {
        Some("ORDER_PUNCHED") | Some("SUCCESS") => {}
        _ => return None,
    }

    let payload = data.get("payload").filter(|p| p.is_object()).unwrap_or(data);
    let dealer_name = pick_value(payload, &["dealerName", "dealer"])
        .and_then(value_to_string)
        .unwrap_or_default();
    let meta = payload
        .get("meta")
        .map(|m| PunchMeta {
            row_index: m.get("rowIndex").and_then(value_to_u32).filter(|r| *r > 0),
            call_n: m.get("callN").and_then(value_to_u32).filter(|n| *n > 0),
            planned_date: m.get("plannedDate").and_then(value_to_string),
        })
        .unwrap_or_default();

    Some(OrderPunched { dealer_name, meta })
}

/// Who is opening the form
#[derive(Debug, Clone, Copy)]
pub struct PeerSession<'a> {
    pub email: &'a str,
    pub name: &'a str,
    pub id_token: &'a str,
    /// Dashboard origin, so the form knows where to post back
    pub parent_origin: &'a str,
}

/// Form URL in quick mode, carrying the session and, from a call slot, the
/// context the form should echo back. Parameters already on `base` with the
/// same names are replaced.
pub fn order_punch_url(base: &str, session: PeerSession<'_>, ctx: Option<&FollowupContext>) -> SyncResult<String> {
    let mut url = parse_url(base)?;

    let mut params: Vec<(&str, String)> = vec![
        ("variant", "quick".to_string()),
        ("fromScot", "1".to_string()),
        ("scEmail", session.email.to_string()),
        ("scName", session.name.to_string()),
        ("scIdToken", session.id_token.to_string()),
        ("parentOrigin", session.parent_origin.to_string()),
    ];
    if let Some(ctx) = ctx {
        params.extend([
            ("rowIndex", ctx.row_index.to_string()),
            ("callN", ctx.call_n.to_string()),
            ("plannedDate", ctx.call_date.format("%Y-%m-%d").to_string()),
            ("clientName", ctx.client_name.clone()),
        ]);
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(k, _)| !params.iter().any(|(p, _)| p == k))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(params);
    Ok(url.into())
}
