//! Wire Normalization
//!
//! The spreadsheet backend spells the same concept several ways and mixes
//! numbers with numeric strings. Everything is resolved here, once, into the
//! canonical models; nothing past this module sees the raw shapes.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{
    CallSlot, ClientColor, DueItem, DuePage, OrderSummary, OrderSummaryEntry, Remark, RowRecord, UserIdentity,
};

const DUE_ITEM_KEYS: &[&str] = &["items", "dueItems", "due_items"];
const TODAY_KEYS: &[&str] = &["today", "todayISO", "today_iso"];
const CURSOR_KEYS: &[&str] = &["nextCursor", "next_cursor"];
const RECEIVED_KEYS: &[&str] = &["received", "ordersReceived", "orders_received"];
const IN_PROCESS_KEYS: &[&str] = &["inProcess", "in_process", "ordersInProcess", "orders_in_process"];

/// First array found under any of `keys`
pub fn pick_array<'a>(obj: &'a Value, keys: &[&str]) -> &'a [Value] {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// First non-null value found under any of `keys`
pub fn pick_value<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

/// Decode each entry, dropping the ones that do not fit the schema
pub fn parse_entries<T: DeserializeOwned>(values: &[Value]) -> Vec<T> {
    values.iter().filter_map(|v| T::deserialize(v).ok()).collect()
}

impl DuePage {
    pub fn from_envelope(env: &Value) -> Self {
        Self {
            today: pick_value(env, TODAY_KEYS).and_then(value_to_date),
            items: parse_entries(pick_array(env, DUE_ITEM_KEYS)),
            next_cursor: pick_value(env, CURSOR_KEYS).and_then(value_to_u32).filter(|c| *c > 0),
        }
    }
}

impl OrderSummary {
    pub fn from_envelope(env: &Value) -> Self {
        Self {
            received: parse_entries::<OrderSummaryEntry>(pick_array(env, RECEIVED_KEYS)),
            in_process: parse_entries::<OrderSummaryEntry>(pick_array(env, IN_PROCESS_KEYS)),
        }
    }
}

impl RowRecord {
    pub fn from_envelope(env: &Value) -> Option<Self> {
        let row = env.get("row").filter(|v| v.is_object()).unwrap_or(env);
        let row_index = pick_value(row, &["rowIndex", "row_index"]).and_then(value_to_u32).filter(|r| *r > 0)?;
        let call_slots = pick_array(row, &["callSlots", "call_slots"])
            .iter()
            .map(|v| value_to_string(v).unwrap_or_default())
            .collect();
        Some(Self { row_index, call_slots })
    }
}

pub fn remarks_from_envelope(env: &Value) -> Vec<Remark> {
    parse_entries(pick_array(env, &["remarks"]))
}

pub fn dealers_from_envelope(env: &Value) -> Vec<String> {
    pick_array(env, &["dealers"])
        .iter()
        .filter_map(value_to_string)
        .collect()
}

pub fn user_from_envelope(env: &Value) -> Option<UserIdentity> {
    let user: UserIdentity = UserIdentity::deserialize(env.get("user")?).ok()?;
    (!user.email.is_empty()).then_some(user)
}

// ========================
// Scalar coercions
// ========================

pub(crate) fn value_to_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn value_to_date(v: &Value) -> Option<NaiveDate> {
    let s = v.as_str()?.trim();
    let head = s.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub(crate) fn value_to_instant(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_instant(s),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// RFC 3339, or a zone-less `YYYY-MM-DDTHH:MM[:SS]` read as local wall time
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    parse_instant_in(raw, &Local)
}

/// `parse_instant` with zone-less values read in `tz`
pub fn parse_instant_in<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| wall_time_to_utc(tz, naive))
}

/// Ambiguous wall times take the earlier instant; skipped ones use the
/// offset in force after the jump.
fn wall_time_to_utc<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| {
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            naive.and_utc() - Duration::seconds(i64::from(offset.local_minus_utc()))
        })
}

// ========================
// serde field helpers
// ========================

pub(crate) fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(value_to_u32(&Value::deserialize(d)?).unwrap_or(0))
}

pub(crate) fn lenient_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    Ok(value_to_u32(&Value::deserialize(d)?).filter(|n| *n > 0))
}

pub(crate) fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(&Value::deserialize(d)?).unwrap_or_default())
}

pub(crate) fn lenient_color<'de, D: Deserializer<'de>>(d: D) -> Result<ClientColor, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_str().map(ClientColor::from_tag).unwrap_or_default())
}

pub(crate) fn lenient_instant<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(value_to_instant(&Value::deserialize(d)?))
}

/// Slots sorted by `callN`, one per `callN`; unusable slots are dropped
pub(crate) fn call_slots<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<CallSlot>, D::Error> {
    let raw = Value::deserialize(d)?;
    let mut slots: Vec<CallSlot> = raw
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| {
            let call_n = pick_value(v, &["callN", "call_n", "n"]).and_then(value_to_u32)?;
            let call_n = u8::try_from(call_n).ok().filter(|n| (1..=4).contains(n))?;
            let call_date = pick_value(v, &["callDate", "call_date", "date"]).and_then(value_to_date)?;
            let sf_at = pick_value(v, &["sfAt", "sf_at"]).and_then(value_to_instant);
            Some(CallSlot { call_n, call_date, sf_at })
        })
        .collect();
    slots.sort_by_key(|s| s.call_n);
    slots.dedup_by_key(|s| s.call_n);
    Ok(slots)
}
