//! Date Utilities
//!
//! Derived follow-up state: overdue status, week windows, countdowns and the
//! auto follow-up target. All functions take "now" explicitly.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use std::fmt;

use crate::models::{CallSlot, DueItem};

/// End-of-day instant (local wall clock) of the week window containing `date`.
///
/// A month splits into days 1-7, 8-14, 15-21 and 22-end of month.
pub fn week_window_end(date: NaiveDate) -> NaiveDateTime {
    let end_day = match date.day() {
        1..=7 => date.with_day(7),
        8..=14 => date.with_day(14),
        15..=21 => date.with_day(21),
        _ => Some(last_day_of_month(date)),
    }
    .unwrap_or(date);
    end_day
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| end_day.and_time(NaiveTime::MIN))
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 { (date.year() + 1, 1) } else { (date.year(), date.month() + 1) };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// A slot can be actioned until its week window closes; after that it stays expired
pub fn slot_is_active(slot: &CallSlot, now_local: NaiveDateTime) -> bool {
    now_local <= week_window_end(slot.call_date)
}

/// Any call date before the reference day, any slot follow-up instant in the
/// past, or the item's own scheduled follow-up reached.
pub fn is_overdue(item: &DueItem, reference: NaiveDate, now: DateTime<Utc>) -> bool {
    let late_call = item.due_calls.iter().any(|c| c.call_date < reference);
    let slot_followup_passed = item.due_calls.iter().any(|c| c.sf_at.is_some_and(|at| at < now));
    let followup_reached = item.sf_future.is_some_and(|at| at <= now);
    late_call || slot_followup_passed || followup_reached
}

/// Without a reference date nothing counts as overdue
pub fn overdue_count(items: &[DueItem], reference: Option<NaiveDate>, now: DateTime<Utc>) -> usize {
    match reference {
        Some(day) => items.iter().filter(|it| is_overdue(it, day, now)).count(),
        None => 0,
    }
}

/// Time left until a scheduled follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Remaining(Duration),
    Overdue,
}

impl Countdown {
    pub fn is_overdue(&self) -> bool {
        matches!(self, Countdown::Overdue)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Remaining(left) => f.write_str(&format_dhms(*left)),
            Countdown::Overdue => f.write_str("Overdue"),
        }
    }
}

pub fn countdown(target: DateTime<Utc>, now: DateTime<Utc>) -> Countdown {
    let left = target - now;
    if left <= Duration::zero() {
        Countdown::Overdue
    } else {
        Countdown::Remaining(left)
    }
}

/// `"<d>d HH:MM:SS"`
pub fn format_dhms(left: Duration) -> String {
    let s = left.num_seconds().max(0);
    format!("{}d {:02}:{:02}:{:02}", s / 86_400, (s % 86_400) / 3600, (s % 3600) / 60, s % 60)
}

/// Target of an automatically scheduled follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoFollowup {
    pub planned_date: NaiveDate,
    pub schedule_at: DateTime<Utc>,
}

/// `offset_days` after the reference date (or now's local date), at now's
/// local time of day truncated to the minute.
pub fn auto_followup<Tz: TimeZone>(reference: Option<NaiveDate>, now: &DateTime<Tz>, offset_days: i64) -> AutoFollowup {
    let local_now = now.naive_local();
    let time_of_day = NaiveTime::from_hms_opt(local_now.hour(), local_now.minute(), 0).unwrap_or(NaiveTime::MIN);
    let base_date = reference.unwrap_or_else(|| local_now.date());
    let target = base_date.and_time(time_of_day) + Duration::days(offset_days);

    let schedule_at = now
        .timezone()
        .from_local_datetime(&target)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(offset_days));

    AutoFollowup { planned_date: target.date(), schedule_at }
}

/// `Sun, 10 Mar 2024`
pub fn format_date_label(date: NaiveDate) -> String {
    date.format("%a, %d %b %Y").to_string()
}

/// `05 Mar`, used on call-slot buttons
pub fn format_call_label(date: NaiveDate) -> String {
    date.format("%d %b").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn item_with(calls: Vec<CallSlot>, sf_future: Option<DateTime<Utc>>) -> DueItem {
        DueItem {
            row_index: 1,
            client_name: "Client".to_string(),
            client_color: Default::default(),
            remark_text: String::new(),
            remark_day: None,
            sf_future,
            due_calls: calls,
        }
    }

    fn slot(n: u8, call_date: NaiveDate, sf_at: Option<DateTime<Utc>>) -> CallSlot {
        CallSlot { call_n: n, call_date, sf_at }
    }

    #[test]
    fn test_week_window_boundaries() {
        assert_eq!(week_window_end(date(2024, 3, 1)).date(), date(2024, 3, 7));
        assert_eq!(week_window_end(date(2024, 3, 7)).date(), date(2024, 3, 7));
        assert_eq!(week_window_end(date(2024, 3, 8)).date(), date(2024, 3, 14));
        assert_eq!(week_window_end(date(2024, 3, 21)).date(), date(2024, 3, 21));
        assert_eq!(week_window_end(date(2024, 3, 22)).date(), date(2024, 3, 31));
        assert_eq!(week_window_end(date(2024, 2, 29)).date(), date(2024, 2, 29));
        assert_eq!(week_window_end(date(2023, 2, 23)).date(), date(2023, 2, 28));
        assert_eq!(week_window_end(date(2024, 12, 25)).date(), date(2024, 12, 31));
    }

    #[test]
    fn test_week_window_end_never_before_date() {
        let mut d = date(2023, 12, 1);
        while d < date(2025, 1, 1) {
            let end = week_window_end(d);
            assert!(d.and_time(NaiveTime::MIN) <= end);
            assert_eq!(end.time(), NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap());
            if d.day() >= 22 {
                assert_eq!(end.date(), last_day_of_month(d));
                assert_eq!(end.date().succ_opt().unwrap().day(), 1);
            }
            d = d.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_slot_expires_after_window() {
        let s = slot(1, date(2024, 3, 5), None);
        assert!(slot_is_active(&s, date(2024, 3, 7).and_hms_opt(23, 59, 0).unwrap()));
        assert!(!slot_is_active(&s, date(2024, 3, 8).and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn test_overdue_scenario_from_due_fetch() {
        let items = vec![item_with(vec![slot(1, date(2024, 3, 5), None)], None)];
        let now = utc(2024, 3, 10, 9, 0);
        assert_eq!(overdue_count(&items, Some(date(2024, 3, 10)), now), 1);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_overdue_ignores_time_of_day_for_call_dates() {
        let it = item_with(vec![slot(1, date(2024, 3, 10), None)], None);
        assert!(!is_overdue(&it, date(2024, 3, 10), utc(2024, 3, 10, 23, 59)));
        assert!(is_overdue(&it, date(2024, 3, 11), utc(2024, 3, 10, 0, 1)));
    }

    #[test]
    fn test_overdue_by_followup_instants() {
        let future_slot = item_with(vec![slot(1, date(2024, 3, 12), Some(utc(2024, 3, 10, 12, 0)))], None);
        assert!(!is_overdue(&future_slot, date(2024, 3, 10), utc(2024, 3, 10, 12, 0)));
        assert!(is_overdue(&future_slot, date(2024, 3, 10), utc(2024, 3, 10, 12, 1)));

        let sf = item_with(vec![], Some(utc(2024, 3, 10, 12, 0)));
        assert!(!is_overdue(&sf, date(2024, 3, 10), utc(2024, 3, 10, 11, 59)));
        assert!(is_overdue(&sf, date(2024, 3, 10), utc(2024, 3, 10, 12, 0)));
    }

    #[test]
    fn test_overdue_is_monotonic_in_time() {
        let it = item_with(
            vec![slot(1, date(2024, 3, 12), Some(utc(2024, 3, 11, 8, 0)))],
            Some(utc(2024, 3, 13, 8, 0)),
        );
        let reference = date(2024, 3, 10);
        let mut seen_overdue = false;
        for hour in 0..(24 * 5) {
            let now = utc(2024, 3, 10, 0, 0) + Duration::hours(hour);
            let overdue = is_overdue(&it, reference, now);
            assert!(!seen_overdue || overdue, "overdue flipped back at {now}");
            seen_overdue |= overdue;
        }
        assert!(seen_overdue);
    }

    #[test]
    fn test_overdue_count_without_reference() {
        let items = vec![item_with(vec![slot(1, date(2020, 1, 1), None)], None)];
        assert_eq!(overdue_count(&items, None, utc(2024, 1, 1, 0, 0)), 0);
    }

    #[test]
    fn test_countdown_format() {
        let now = utc(2024, 3, 10, 0, 0);
        let target = now + Duration::days(2) + Duration::hours(3) + Duration::minutes(4) + Duration::seconds(5);
        assert_eq!(countdown(target, now).to_string(), "2d 03:04:05");
        assert_eq!(countdown(now, now), Countdown::Overdue);
        assert_eq!(countdown(now - Duration::seconds(1), now).to_string(), "Overdue");
    }

    #[test]
    fn test_auto_followup_from_reference_date() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = ist.with_ymd_and_hms(2024, 3, 12, 14, 37, 42).unwrap();
        let f = auto_followup(Some(date(2024, 3, 10)), &now, 15);
        assert_eq!(f.planned_date, date(2024, 3, 25));
        let local = f.schedule_at.with_timezone(&ist);
        assert_eq!(local.date_naive(), date(2024, 3, 25));
        assert_eq!((local.hour(), local.minute(), local.second()), (14, 37, 0));
    }

    #[test]
    fn test_auto_followup_without_reference_uses_local_today() {
        let now = Utc.with_ymd_and_hms(2024, 1, 25, 8, 15, 30).unwrap();
        let f = auto_followup(None, &now, 15);
        assert_eq!(f.planned_date, date(2024, 2, 9));
        assert_eq!(f.schedule_at, Utc.with_ymd_and_hms(2024, 2, 9, 8, 15, 0).unwrap());
    }

    #[test]
    fn test_auto_followup_drops_seconds_and_subseconds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 59).unwrap() + Duration::milliseconds(731);
        let f = auto_followup(Some(date(2024, 3, 10)), &now, 15);
        assert_eq!(f.schedule_at, Utc.with_ymd_and_hms(2024, 3, 25, 9, 0, 0).unwrap());
        assert_eq!(f.schedule_at.to_rfc3339(), "2024-03-25T09:00:00+00:00");
    }

    #[test]
    fn test_labels() {
        assert_eq!(format_date_label(date(2024, 3, 10)), "Sun, 10 Mar 2024");
        assert_eq!(format_call_label(date(2024, 3, 5)), "05 Mar");
    }
}
