//! Dashboard Models
//!
//! Canonical data structures. Field-name variants the spreadsheet backend
//! emits are resolved by serde aliases and the lenient helpers in `wire`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::wire;

/// Dealer priority tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ClientColor {
    Red,
    Yellow,
    Green,
    #[default]
    Unknown,
}

impl ClientColor {
    /// Normalize a free-form sheet value by its first letter
    pub fn from_tag(raw: &str) -> Self {
        match raw.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('r') => ClientColor::Red,
            Some('y') => ClientColor::Yellow,
            Some('g') => ClientColor::Green,
            _ => ClientColor::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientColor::Red => "Red",
            ClientColor::Yellow => "Yellow",
            ClientColor::Green => "Green",
            ClientColor::Unknown => "",
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            ClientColor::Red => "#ef4444",
            ClientColor::Yellow => "#f59e0b",
            ClientColor::Green => "#10b981",
            ClientColor::Unknown => "#94a3b8",
        }
    }

    /// Colors a user may pick when adding a dealer
    pub const PICKABLE: [ClientColor; 3] = [ClientColor::Red, ClientColor::Yellow, ClientColor::Green];
}

/// One scheduled call attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSlot {
    /// 1..=4, ordering key
    pub call_n: u8,
    pub call_date: NaiveDate,
    /// When a follow-up was scheduled for this slot
    #[serde(default)]
    pub sf_at: Option<DateTime<Utc>>,
}

/// A dealer currently owed follow-up calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueItem {
    /// Sheet row; 0 means the backend sent no usable identity
    #[serde(default, alias = "row_index", deserialize_with = "wire::lenient_u32")]
    pub row_index: u32,
    #[serde(default, alias = "client", alias = "client_name", deserialize_with = "wire::lenient_string")]
    pub client_name: String,
    #[serde(default, alias = "color", alias = "client_color", deserialize_with = "wire::lenient_color")]
    pub client_color: ClientColor,
    #[serde(default, alias = "remark", alias = "remark_text", deserialize_with = "wire::lenient_string")]
    pub remark_text: String,
    #[serde(default, alias = "remark_day", deserialize_with = "wire::lenient_opt_u32")]
    pub remark_day: Option<u32>,
    #[serde(default, alias = "sf_future", deserialize_with = "wire::lenient_instant")]
    pub sf_future: Option<DateTime<Utc>>,
    #[serde(default, alias = "due_calls", alias = "calls", deserialize_with = "wire::call_slots")]
    pub due_calls: Vec<CallSlot>,
}

/// A received or in-process order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryEntry {
    #[serde(default, alias = "order_id", deserialize_with = "wire::lenient_string")]
    pub order_id: String,
    #[serde(default, alias = "dealer", alias = "dealer_name", deserialize_with = "wire::lenient_string")]
    pub dealer_name: String,
    #[serde(default, rename = "tsISO", alias = "ts", alias = "ts_iso", deserialize_with = "wire::lenient_instant")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::lenient_string")]
    pub location: String,
    /// One or more URLs in a single delimited string
    #[serde(default, alias = "order_url", deserialize_with = "wire::lenient_string")]
    pub order_url: String,
}

impl OrderSummaryEntry {
    pub fn urls(&self) -> Vec<String> {
        parse_order_urls(&self.order_url)
    }

    /// Link behind the "View" button
    pub fn primary_url(&self) -> Option<String> {
        self.urls().into_iter().next()
    }
}

/// One page of the due-items endpoint
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DuePage {
    pub today: Option<NaiveDate>,
    pub items: Vec<DueItem>,
    /// Present while more pages remain
    pub next_cursor: Option<u32>,
}

/// Both order lists from the order cycle summary
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderSummary {
    pub received: Vec<OrderSummaryEntry>,
    pub in_process: Vec<OrderSummaryEntry>,
}

/// Scheduled follow-up history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    #[serde(default, deserialize_with = "wire::lenient_instant")]
    pub ts: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::lenient_string")]
    pub remark: String,
}

/// Signed-in coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserIdentity {
    #[serde(default, deserialize_with = "wire::lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "wire::lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "wire::lenient_string")]
    pub picture: String,
}

/// Result of a dealer row lookup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowRecord {
    pub row_index: u32,
    /// Raw call-slot cells; blank means the slot is free
    pub call_slots: Vec<String>,
}

impl RowRecord {
    /// First free slot among 1..=4, or 4 when all are taken
    pub fn first_free_slot(&self) -> u8 {
        (0..4)
            .find(|&i| self.call_slots.get(i).map_or(true, |v| v.trim().is_empty()))
            .map(|i| i as u8 + 1)
            .unwrap_or(4)
    }
}

/// State of an open call-slot interaction
#[derive(Debug, Clone, PartialEq)]
pub struct FollowupContext {
    pub row_index: u32,
    pub call_n: u8,
    pub client_name: String,
    pub call_date: NaiveDate,
    /// Session reference date when the modal opened
    pub date_of_record: Option<NaiveDate>,
}

impl FollowupContext {
    pub fn open(item: &DueItem, slot: &CallSlot, today: Option<NaiveDate>) -> Self {
        Self {
            row_index: item.row_index,
            call_n: slot.call_n,
            client_name: item.client_name.clone(),
            call_date: slot.call_date,
            date_of_record: today,
        }
    }
}

/// Call outcome codes understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "OR")]
    OrderReceived,
    #[serde(rename = "SF")]
    ScheduleFollowup,
    #[serde(rename = "AP")]
    AlreadyInProcess,
    #[serde(rename = "NR")]
    NoRequirement,
    #[serde(rename = "AI")]
    AccountsIntel,
    #[serde(rename = "MD")]
    OwnerRestricted,
}

impl Outcome {
    pub const ALL: [Outcome; 6] = [
        Outcome::OrderReceived,
        Outcome::ScheduleFollowup,
        Outcome::AlreadyInProcess,
        Outcome::NoRequirement,
        Outcome::AccountsIntel,
        Outcome::OwnerRestricted,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Outcome::OrderReceived => "OR",
            Outcome::ScheduleFollowup => "SF",
            Outcome::AlreadyInProcess => "AP",
            Outcome::NoRequirement => "NR",
            Outcome::AccountsIntel => "AI",
            Outcome::OwnerRestricted => "MD",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::OrderReceived => "OR (Order Received)",
            Outcome::ScheduleFollowup => "SF (Schedule Follow-up)",
            Outcome::AlreadyInProcess => "AP (Already in Process)",
            Outcome::NoRequirement => "NR (No Requirement)",
            Outcome::AccountsIntel => "AI (Accounts Intel)",
            Outcome::OwnerRestricted => "MD (Owner Restricted for Call)",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Outcome::ALL.into_iter().find(|o| o.code().eq_ignore_ascii_case(code.trim()))
    }
}

/// Fixed-shape "mark" command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkCommand {
    pub row_index: u32,
    pub date: NaiveDate,
    pub outcome: Outcome,
    pub remark: String,
    pub call_n: u8,
    pub planned_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_at: Option<DateTime<Utc>>,
}

/// Split a delimited `orderUrl` cell into individual URLs.
///
/// With commas present, a token that does not start with `http(s)://` and
/// follows a URL is a comma that belonged to that URL.
pub fn parse_order_urls(raw: &str) -> Vec<String> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return Vec::new();
    }

    let has_comma = normalized.contains(',');
    let delimiter = if has_comma { ',' } else { '\n' };
    let tokens = normalized.split(delimiter).map(str::trim).filter(|t| !t.is_empty());

    if !has_comma {
        return tokens.map(str::to_string).collect();
    }

    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        match out.last_mut() {
            Some(last) if !starts_with_http(token) && starts_with_http(last) => {
                last.push(',');
                last.push_str(token);
            }
            _ => out.push(token.to_string()),
        }
    }
    out
}

/// Dealer in `dealers` matching `name` case-insensitively
pub fn find_dealer<'a>(dealers: &'a [String], name: &str) -> Option<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    dealers.iter().map(String::as_str).find(|d| d.trim().eq_ignore_ascii_case(name))
}

fn starts_with_http(s: &str) -> bool {
    let lower = s.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
