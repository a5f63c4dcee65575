//! Application Context
//!
//! Shared handles provided via Leptos Context API.

use chrono::{DateTime, FixedOffset, Utc};
use leptos::prelude::*;

use scot_sync::{FollowupContext, OrderSummaryEntry, RefreshOptions, Runtime, SyncOrchestrator};

use crate::store::{show_toast, ToastSignal};

/// App-wide handles provided via context
#[derive(Clone, Copy)]
pub struct AppContext {
    /// The sync engine; lives on the UI thread only
    sync: StoredValue<SyncOrchestrator, LocalStorage>,
    pub toast: ToastSignal,
    /// Local wall clock, ticking every few seconds
    pub clock: RwSignal<DateTime<FixedOffset>>,
    /// Call slot whose follow-up modal is open
    pub followup: RwSignal<Option<FollowupContext>>,
    /// Order whose "Schedule Call" dialog is open
    pub scheduling: RwSignal<Option<OrderSummaryEntry>>,
    pub quick_order_open: RwSignal<bool>,
    pub debug: bool,
}

impl AppContext {
    pub fn new(sync: SyncOrchestrator, toast: ToastSignal, debug: bool) -> Self {
        let clock = RwSignal::new(sync.runtime().now_local());
        Self {
            sync: StoredValue::new_local(sync),
            toast,
            clock,
            followup: RwSignal::new(None),
            scheduling: RwSignal::new(None),
            quick_order_open: RwSignal::new(false),
            debug,
        }
    }

    pub fn sync(&self) -> SyncOrchestrator {
        self.sync.get_value()
    }

    pub fn toast(&self, message: impl Into<String>) {
        show_toast(self.toast, message);
    }

    /// Manual reload
    pub fn reload(&self) {
        self.sync().spawn_refresh(RefreshOptions::forced());
    }

    pub fn now_utc(&self) -> DateTime<Utc> {
        self.clock.get().with_timezone(&Utc)
    }

    pub fn tick(&self) {
        self.clock.set(self.sync().runtime().now_local());
    }
}

pub fn use_app_context() -> AppContext {
    expect_context::<AppContext>()
}
