//! Request Transport
//!
//! JSON reads and writes against the spreadsheet backend with timeouts,
//! cancellation, read coalescing, write retries and a best-effort delivery
//! path for mutations. Failures are typed and returned, never logged here.

pub mod client;
pub mod envelope;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{SyncError, SyncResult};
pub use client::{HttpClient, HttpResponse, Runtime};
pub use envelope::{is_truthy, parse_envelope, read_response};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(300);

type SharedRequest = Shared<LocalBoxFuture<'static, SyncResult<Value>>>;

/// Options for a read
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub cancel: Option<CancellationToken>,
    /// Falls back to the transport default
    pub timeout: Option<Duration>,
    /// Coalesce with an identical in-flight read. Ignored when `cancel` is set.
    pub dedupe_key: Option<String>,
}

impl RequestOptions {
    pub fn cancellable(cancel: &CancellationToken) -> Self {
        Self { cancel: Some(cancel.clone()), ..Self::default() }
    }

    pub fn deduped(key: impl Into<String>) -> Self {
        Self { dedupe_key: Some(key.into()), ..Self::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for a readable write
#[derive(Debug, Clone)]
pub struct PostOptions {
    pub cancel: Option<CancellationToken>,
    pub timeout: Option<Duration>,
    /// Extra attempts after the first failure
    pub retries: u32,
}

impl Default for PostOptions {
    fn default() -> Self {
        Self { cancel: None, timeout: None, retries: 1 }
    }
}

impl PostOptions {
    pub fn with_retries(retries: u32) -> Self {
        Self { retries, ..Self::default() }
    }
}

/// How far a best-effort write got
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Readable response with a truthy envelope
    Confirmed(Value),
    /// Handed to the beacon queue or an opaque POST; outcome unknowable
    Unknown,
    /// Rejected by the backend, or no path could send it at all
    Failed(SyncError),
}

impl Delivery {
    /// Confirmed or unknown: the caller proceeds optimistically
    pub fn is_delivered(&self) -> bool {
        !matches!(self, Delivery::Failed(_))
    }

    pub fn into_result(self) -> SyncResult<Option<Value>> {
        match self {
            Delivery::Confirmed(v) => Ok(Some(v)),
            Delivery::Unknown => Ok(None),
            Delivery::Failed(e) => Err(e),
        }
    }
}

/// Race `fut` against the cancellation token and the timeout. Whichever
/// loses is dropped, which aborts the underlying request.
pub async fn guarded<T, F>(
    runtime: &dyn Runtime,
    fut: F,
    cancel: Option<&CancellationToken>,
    timeout: Duration,
) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    let never = CancellationToken::new();
    let cancel = cancel.unwrap_or(&never);
    let deadline = runtime.sleep(timeout);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        _ = deadline => Err(SyncError::Timeout(timeout)),
        res = fut => res,
    }
}

/// Sleep unless cancelled first
pub async fn cancellable_sleep(runtime: &dyn Runtime, duration: Duration, cancel: Option<&CancellationToken>) -> SyncResult<()> {
    let never = CancellationToken::new();
    let cancel = cancel.unwrap_or(&never);
    let nap = runtime.sleep(duration);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        _ = nap => Ok(()),
    }
}

/// HTTP JSON transport for the backend
#[derive(Clone)]
pub struct ScotTransport {
    client: Rc<dyn HttpClient>,
    runtime: Rc<dyn Runtime>,
    timeout: Duration,
    retry_backoff: Duration,
    inflight: Rc<RefCell<HashMap<String, SharedRequest>>>,
}

impl ScotTransport {
    pub fn new(client: Rc<dyn HttpClient>, runtime: Rc<dyn Runtime>) -> Self {
        Self {
            client,
            runtime,
            timeout: DEFAULT_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            inflight: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn runtime(&self) -> &Rc<dyn Runtime> {
        &self.runtime
    }

    /// Number of coalesced reads still pending
    pub fn inflight_reads(&self) -> usize {
        self.inflight.borrow().len()
    }

    // ========================
    // Reads
    // ========================

    /// GET `url` and return the success envelope
    pub async fn fetch_json(&self, url: &str, opts: RequestOptions) -> SyncResult<Value> {
        let timeout = opts.timeout.unwrap_or(self.timeout);
        match (opts.dedupe_key, opts.cancel) {
            (Some(key), None) => self.fetch_coalesced(key, url, timeout).await,
            (_, cancel) => self.get_future(url.to_string(), cancel, timeout).await,
        }
    }

    fn get_future(&self, url: String, cancel: Option<CancellationToken>, timeout: Duration) -> LocalBoxFuture<'static, SyncResult<Value>> {
        let client = self.client.clone();
        let runtime = self.runtime.clone();
        async move {
            let resp = guarded(runtime.as_ref(), client.get(&url), cancel.as_ref(), timeout).await?;
            read_response(resp)
        }
        .boxed_local()
    }

    async fn fetch_coalesced(&self, key: String, url: &str, timeout: Duration) -> SyncResult<Value> {
        let existing = self.inflight.borrow().get(&key).cloned();
        if let Some(shared) = existing {
            return shared.await;
        }

        let request = self.get_future(url.to_string(), None, timeout);
        let registry: Weak<RefCell<HashMap<String, SharedRequest>>> = Rc::downgrade(&self.inflight);
        let cleanup_key = key.clone();
        let shared = async move {
            let res = request.await;
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().remove(&cleanup_key);
            }
            res
        }
        .boxed_local()
        .shared();

        self.inflight.borrow_mut().insert(key, shared.clone());
        shared.await
    }

    // ========================
    // Writes
    // ========================

    /// POST `body` as JSON, retrying with linear backoff on anything but
    /// cancellation
    pub async fn post_json(&self, url: &str, body: &Value, opts: PostOptions) -> SyncResult<Value> {
        let payload = body.to_string();
        let timeout = opts.timeout.unwrap_or(self.timeout);
        let cancel = opts.cancel.as_ref();
        let mut attempt: u32 = 0;
        loop {
            let res = guarded(self.runtime.as_ref(), self.client.post(url, &payload), cancel, timeout)
                .await
                .and_then(read_response);
            match res {
                Ok(v) => return Ok(v),
                Err(e) if !e.is_retryable() || attempt >= opts.retries => return Err(e),
                Err(_) => {
                    attempt += 1;
                    cancellable_sleep(self.runtime.as_ref(), self.retry_backoff * attempt, cancel).await?;
                }
            }
        }
    }

    /// Deliver a mutation by the first path that works: readable POST,
    /// beacon, opaque POST. A backend rejection on the readable path is final.
    pub async fn post_best_effort(&self, url: &str, body: &Value) -> Delivery {
        match self.post_json(url, body, PostOptions::with_retries(0)).await {
            Ok(v) => return Delivery::Confirmed(v),
            Err(e @ SyncError::Api { .. }) => return Delivery::Failed(e),
            Err(_) => {}
        }

        let payload = body.to_string();
        if self.client.send_beacon(url, &payload) {
            return Delivery::Unknown;
        }

        match guarded(self.runtime.as_ref(), self.client.post_opaque(url, &payload), None, self.timeout).await {
            Ok(()) => Delivery::Unknown,
            Err(e) => Delivery::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHttp, TestRuntime};
    use serde_json::json;
    use tokio::task::LocalSet;

    const URL: &str = "https://api.test/exec?path=due";
    const ROUTE: &str = "due";

    fn transport(http: &Rc<FakeHttp>, rt: &Rc<TestRuntime>) -> ScotTransport {
        ScotTransport::new(http.clone(), rt.clone())
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_fetch_returns_envelope() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 200, json!({"ok": true, "items": []}));
        let v = transport(&http, &rt).fetch_json(URL, RequestOptions::default()).await.unwrap();
        assert_eq!(v["items"], json!([]));
        assert_eq!(http.get_count(ROUTE), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_fetch_times_out() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        let _gate = http.gate(ROUTE);
        http.respond(ROUTE, 200, json!({"ok": true}));
        let t = transport(&http, &rt).with_timeout(Duration::from_secs(2));
        let err = t.fetch_json(URL, RequestOptions::default()).await.unwrap_err();
        assert_eq!(err, SyncError::Timeout(Duration::from_secs(2)));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_cancel_is_distinct_from_timeout() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        let _gate = http.gate(ROUTE);
        http.respond(ROUTE, 200, json!({"ok": true}));
        let t = transport(&http, &rt);
        let token = CancellationToken::new();

        let canceller = token.clone();
        let (res, _) = tokio::join!(t.fetch_json(URL, RequestOptions::cancellable(&token)), async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        assert_eq!(res.unwrap_err(), SyncError::Cancelled);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_dedupe_shares_one_call() {
        LocalSet::new()
            .run_until(async {
                let http = FakeHttp::new();
                let rt = TestRuntime::new();
                let gate = http.gate(ROUTE);
                http.respond(ROUTE, 200, json!({"ok": true, "n": 1}));
                let t = transport(&http, &rt);

                let a = tokio::task::spawn_local({
                    let t = t.clone();
                    async move { t.fetch_json(URL, RequestOptions::deduped("due")).await }
                });
                let b = tokio::task::spawn_local({
                    let t = t.clone();
                    async move { t.fetch_json(URL, RequestOptions::deduped("due")).await }
                });
                tokio::task::yield_now().await;
                assert_eq!(t.inflight_reads(), 1);
                gate.open();

                let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
                assert_eq!(a, b);
                assert_eq!(http.get_count(ROUTE), 1);
                assert_eq!(t.inflight_reads(), 0);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_dedupe_shares_failure_and_clears() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 200, json!({"ok": false, "error": "Invalid id_token"}));
        http.respond(ROUTE, 200, json!({"ok": true}));
        let t = transport(&http, &rt);

        let (a, b) = tokio::join!(
            t.fetch_json(URL, RequestOptions::deduped("due")),
            t.fetch_json(URL, RequestOptions::deduped("due"))
        );
        assert_eq!(a.unwrap_err(), SyncError::api("Invalid id_token"));
        assert_eq!(b.unwrap_err(), SyncError::api("Invalid id_token"));
        assert_eq!(http.get_count(ROUTE), 1);

        assert!(t.fetch_json(URL, RequestOptions::deduped("due")).await.is_ok());
        assert_eq!(http.get_count(ROUTE), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_dedupe_skipped_with_cancel_token() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 200, json!({"ok": true}));
        http.respond(ROUTE, 200, json!({"ok": true}));
        let t = transport(&http, &rt);
        let token = CancellationToken::new();
        let opts = RequestOptions { cancel: Some(token), dedupe_key: Some("due".into()), timeout: None };

        let (a, b) = tokio::join!(t.fetch_json(URL, opts.clone()), t.fetch_json(URL, opts));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(http.get_count(ROUTE), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_post_retries_with_linear_backoff() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 503, json!({}));
        http.respond(ROUTE, 503, json!({}));
        http.respond(ROUTE, 200, json!({"ok": true, "saved": 1}));
        let t = transport(&http, &rt);

        let started = tokio::time::Instant::now();
        let v = t.post_json(URL, &json!({"dealerName": "Alpha"}), PostOptions::with_retries(2)).await.unwrap();
        assert_eq!(v["saved"], 1);
        assert_eq!(http.post_count(ROUTE), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(300 + 600));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_post_gives_up_after_retries() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 200, json!({"ok": false, "error": "Duplicate dealer"}));
        http.respond(ROUTE, 200, json!({"ok": false, "error": "Duplicate dealer"}));
        http.respond(ROUTE, 200, json!({"ok": true}));
        let t = transport(&http, &rt);

        let err = t.post_json(URL, &json!({}), PostOptions::default()).await.unwrap_err();
        assert_eq!(err, SyncError::api("Duplicate dealer"));
        assert_eq!(http.post_count(ROUTE), 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_post_cancel_stops_retrying() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 500, json!({}));
        http.respond(ROUTE, 200, json!({"ok": true}));
        let t = transport(&http, &rt);
        let token = CancellationToken::new();
        let opts = PostOptions { cancel: Some(token.clone()), timeout: None, retries: 3 };

        let canceller = token.clone();
        let body = json!({});
        let (res, _) = tokio::join!(t.post_json(URL, &body, opts), async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });
        assert_eq!(res.unwrap_err(), SyncError::Cancelled);
        assert_eq!(http.post_count(ROUTE), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_best_effort_confirmed() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 200, json!({"ok": true, "marked": true}));
        let d = transport(&http, &rt).post_best_effort(URL, &json!({"rowIndex": 4})).await;
        assert_eq!(d, Delivery::Confirmed(json!({"ok": true, "marked": true})));
        assert_eq!(http.beacons().len(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_best_effort_backend_rejection_is_final() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.respond(ROUTE, 200, json!({"ok": false, "error": "Invalid id_token"}));
        let d = transport(&http, &rt).post_best_effort(URL, &json!({"rowIndex": 4})).await;
        assert_eq!(d, Delivery::Failed(SyncError::api("Invalid id_token")));
        assert!(http.beacons().is_empty());
        assert_eq!(http.opaque_count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_best_effort_falls_back_to_beacon() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.fail_network(ROUTE, "Failed to fetch");
        let d = transport(&http, &rt).post_best_effort(URL, &json!({"rowIndex": 4})).await;
        assert_eq!(d, Delivery::Unknown);
        assert!(d.is_delivered());
        let beacons = http.beacons();
        assert_eq!(beacons.len(), 1);
        assert_eq!(serde_json::from_str::<Value>(&beacons[0].1).unwrap()["rowIndex"], 4);
        assert_eq!(http.opaque_count(), 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_best_effort_falls_back_to_opaque() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.fail_network(ROUTE, "Failed to fetch");
        http.refuse_beacons();
        let d = transport(&http, &rt).post_best_effort(URL, &json!({"rowIndex": 4})).await;
        assert_eq!(d, Delivery::Unknown);
        assert_eq!(http.opaque_count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_best_effort_all_paths_exhausted() {
        let http = FakeHttp::new();
        let rt = TestRuntime::new();
        http.fail_network(ROUTE, "Failed to fetch");
        http.refuse_beacons();
        http.fail_opaque("offline");
        let d = transport(&http, &rt).post_best_effort(URL, &json!({})).await;
        assert_eq!(d, Delivery::Failed(SyncError::Network("offline".into())));
        assert!(d.into_result().is_err());
    }
}
