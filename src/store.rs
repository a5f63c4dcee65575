//! Global Application State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity. The store mirrors
//! the orchestrator's `SyncState`; only `StoreObserver` writes to it.

use chrono::{DateTime, NaiveDate, Utc};
use leptos::prelude::*;
use reactive_stores::Store;

use scot_sync::{DueItem, OrderSummaryEntry, SyncObserver, SyncState, UserIdentity};

use crate::platform;

/// What the dashboard renders, field by field
#[derive(Clone, Debug, Default, Store)]
pub struct AppState {
    pub signed_in: bool,
    pub user: Option<UserIdentity>,
    /// Backend reference date
    pub today: Option<NaiveDate>,
    pub items: Vec<DueItem>,
    pub received: Vec<OrderSummaryEntry>,
    pub in_process: Vec<OrderSummaryEntry>,
    pub dealers: Vec<String>,
    pub last_error: Option<String>,
    pub syncing: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

/// Type alias for the store
pub type AppStore = Store<AppState>;

/// Get the app store from context
pub fn use_app_store() -> AppStore {
    expect_context::<AppStore>()
}

// ========================
// Store Helper Functions
// ========================

/// Write `value` into a store field only when it changed
macro_rules! sync_field {
    ($field:expr, $value:expr) => {{
        let field = $field;
        let value = $value;
        if field.with_untracked(|current| current != value) {
            field.set(value.clone());
        }
    }};
}

/// Copy a `SyncState` snapshot into the store
pub fn store_mirror(store: &AppStore, state: &SyncState) {
    sync_field!(store.signed_in(), &state.is_signed_in());
    sync_field!(store.user(), &state.user);
    sync_field!(store.today(), &state.today);
    sync_field!(store.items(), &state.items);
    sync_field!(store.received(), &state.orders.received);
    sync_field!(store.in_process(), &state.orders.in_process);
    sync_field!(store.dealers(), &state.dealers);
    sync_field!(store.last_error(), &state.last_error);
    sync_field!(store.syncing(), &state.syncing);
    sync_field!(store.last_synced_at(), &state.last_synced_at);
    sync_field!(store.generation(), &state.generation);
}

/// Transient toast message; the counter restarts the hide timer
pub type ToastSignal = RwSignal<Option<(u32, String)>>;

pub fn show_toast(toast: ToastSignal, message: impl Into<String>) {
    let id = toast.with_untracked(|t| t.as_ref().map_or(0, |(id, _)| id + 1));
    toast.set(Some((id, message.into())));
}

/// Bridges orchestrator callbacks into the reactive store
pub struct StoreObserver {
    pub store: AppStore,
    pub toast: ToastSignal,
}

impl SyncObserver for StoreObserver {
    fn on_state(&self, state: &SyncState) {
        store_mirror(&self.store, state);
    }

    fn on_notice(&self, message: &str) {
        show_toast(self.toast, message);
    }

    fn on_signed_out(&self) {
        platform::disable_auto_select();
    }
}
