//! SCOT Sync
//!
//! Platform-independent core of the SCOT follow-up dashboard: backend API,
//! request transport, wire parsing, date rules and the refresh orchestrator.
//! The browser shell plugs in an `HttpClient` and a `Runtime`.

pub mod api;
pub mod config;
pub mod dates;
pub mod embed;
pub mod error;
pub mod identity;
pub mod merge;
pub mod models;
pub mod orchestrator;
pub mod query;
pub mod sales_order;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod testing;

pub use api::ScotApi;
pub use config::ScotConfig;
pub use error::{SyncError, SyncResult};
pub use models::{ClientColor, DueItem, FollowupContext, OrderSummary, OrderSummaryEntry, Outcome, UserIdentity};
pub use orchestrator::{
    NoopObserver, RefreshOptions, RefreshOutcome, ScheduledFollowup, SyncObserver, SyncOrchestrator, SyncState,
};
pub use sales_order::{OrderAttachment, SalesOrderDraft, SalesOrderReceipt};
pub use transport::{Delivery, HttpClient, HttpResponse, Runtime};
