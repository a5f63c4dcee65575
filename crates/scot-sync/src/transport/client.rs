//! Platform Seams
//!
//! The only ways the core reaches the outside world: HTTP and a clock. The
//! browser app implements both with web-sys; tests implement them with tokio.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use futures::future::LocalBoxFuture;
use std::time::Duration;

use crate::error::SyncResult;

/// Status and raw body of a readable response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP.
///
/// Dropping a returned future must abort the underlying request; that is how
/// timeouts and cancellation reach the network.
#[async_trait(?Send)]
pub trait HttpClient {
    /// Readable GET
    async fn get(&self, url: &str) -> SyncResult<HttpResponse>;

    /// Readable POST of a JSON body
    async fn post(&self, url: &str, body: &str) -> SyncResult<HttpResponse>;

    /// Queue a delivery that survives page navigation. `false` when the
    /// platform refused to queue it.
    fn send_beacon(&self, url: &str, body: &str) -> bool;

    /// Fire-and-forget POST whose response cannot be read
    async fn post_opaque(&self, url: &str, body: &str) -> SyncResult<()>;
}

/// Clock and task scheduling for a single-threaded event loop
pub trait Runtime {
    fn now(&self) -> DateTime<Utc>;

    /// Wall clock in the user's zone; UTC unless the platform knows better
    fn now_local(&self) -> DateTime<FixedOffset> {
        self.now().fixed_offset()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Run a detached task on the current thread
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}
