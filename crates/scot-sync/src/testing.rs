//! Test Doubles
//!
//! Scripted `HttpClient` and a tokio-backed `Runtime`.
//!
//! Requests are grouped into routes: the `path` field of a POST body, else the
//! `path` query parameter, else the whole URL. Each route has a queue of
//! scripted answers; the last one is sticky so timers can keep polling.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::{SyncError, SyncResult};
use crate::transport::{HttpClient, HttpResponse, Runtime};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(HttpResponse),
    Fail(String),
}

/// A recorded request
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub route: String,
    pub url: String,
    pub body: Option<Value>,
}

impl Call {
    /// A query parameter of the request URL, undecoded
    pub fn param(&self, key: &str) -> Option<String> {
        let (_, query) = self.url.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then(|| v.to_string())
        })
    }
}

/// Holds back the response of one request until opened
#[derive(Clone, Default)]
pub struct Gate {
    state: Rc<(Cell<bool>, Notify)>,
}

impl Gate {
    pub fn open(&self) {
        self.state.0.set(true);
        self.state.1.notify_waiters();
    }

    async fn wait(&self) {
        loop {
            let notified = self.state.1.notified();
            if self.state.0.get() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Default)]
pub struct FakeHttp {
    scripts: RefCell<HashMap<String, VecDeque<Scripted>>>,
    gates: RefCell<Vec<(String, Option<String>, Gate)>>,
    calls: RefCell<Vec<Call>>,
    beacons: RefCell<Vec<(String, String)>>,
    refuse_beacons: Cell<bool>,
    opaque: RefCell<Vec<(String, String)>>,
    opaque_error: RefCell<Option<String>>,
}

fn route_of(url: &str, body: Option<&Value>) -> String {
    if let Some(path) = body.and_then(|b| b.get("path")).and_then(Value::as_str) {
        return path.to_string();
    }
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("path="))
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}

impl FakeHttp {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Queue a readable response with a JSON body
    pub fn respond(&self, route: &str, status: u16, body: Value) {
        self.push(route, Scripted::Reply(HttpResponse::new(status, body.to_string())));
    }

    /// Queue a transport-level failure
    pub fn fail_network(&self, route: &str, message: &str) {
        self.push(route, Scripted::Fail(message.to_string()));
    }

    fn push(&self, route: &str, scripted: Scripted) {
        self.scripts.borrow_mut().entry(route.to_string()).or_default().push_back(scripted);
    }

    /// Drop everything scripted for `route`
    pub fn clear(&self, route: &str) {
        self.scripts.borrow_mut().remove(route);
    }

    /// Hold back the next request on `route` until the gate opens
    pub fn gate(&self, route: &str) -> Gate {
        self.push_gate(route, None)
    }

    /// Like `gate`, for the next request whose URL contains `needle`
    pub fn gate_matching(&self, route: &str, needle: &str) -> Gate {
        self.push_gate(route, Some(needle.to_string()))
    }

    fn push_gate(&self, route: &str, needle: Option<String>) -> Gate {
        let gate = Gate::default();
        self.gates.borrow_mut().push((route.to_string(), needle, gate.clone()));
        gate
    }

    fn take_gate(&self, route: &str, url: &str) -> Option<Gate> {
        let mut gates = self.gates.borrow_mut();
        let pos = gates
            .iter()
            .position(|(r, needle, _)| r == route && needle.as_deref().map_or(true, |n| url.contains(n)))?;
        Some(gates.remove(pos).2)
    }

    pub fn refuse_beacons(&self) {
        self.refuse_beacons.set(true);
    }

    pub fn fail_opaque(&self, message: &str) {
        *self.opaque_error.borrow_mut() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, route: &str) -> Vec<Call> {
        self.calls.borrow().iter().filter(|c| c.route == route).cloned().collect()
    }

    pub fn get_count(&self, route: &str) -> usize {
        self.calls_to(route).iter().filter(|c| c.method == "GET").count()
    }

    pub fn post_count(&self, route: &str) -> usize {
        self.calls_to(route).iter().filter(|c| c.method == "POST").count()
    }

    pub fn beacons(&self) -> Vec<(String, String)> {
        self.beacons.borrow().clone()
    }

    pub fn opaque_count(&self) -> usize {
        self.opaque.borrow().len()
    }

    async fn answer(&self, method: &'static str, url: &str, body: Option<&str>) -> SyncResult<HttpResponse> {
        let body: Option<Value> = body.and_then(|b| serde_json::from_str(b).ok());
        let route = route_of(url, body.as_ref());
        self.calls.borrow_mut().push(Call { method, route: route.clone(), url: url.to_string(), body });

        let scripted = {
            let mut scripts = self.scripts.borrow_mut();
            let queue = scripts.get_mut(&route);
            match queue {
                Some(q) if q.len() > 1 => q.pop_front(),
                Some(q) => q.front().cloned(),
                None => None,
            }
        };
        let gate = self.take_gate(&route, url);

        tokio::task::yield_now().await;
        if let Some(gate) = gate {
            gate.wait().await;
        }

        match scripted {
            Some(Scripted::Reply(resp)) => Ok(resp),
            Some(Scripted::Fail(msg)) => Err(SyncError::Network(msg)),
            None => Err(SyncError::Network(format!("no scripted response for {}", route))),
        }
    }
}

#[async_trait(?Send)]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str) -> SyncResult<HttpResponse> {
        self.answer("GET", url, None).await
    }

    async fn post(&self, url: &str, body: &str) -> SyncResult<HttpResponse> {
        self.answer("POST", url, Some(body)).await
    }

    fn send_beacon(&self, url: &str, body: &str) -> bool {
        if self.refuse_beacons.get() {
            return false;
        }
        self.beacons.borrow_mut().push((url.to_string(), body.to_string()));
        true
    }

    async fn post_opaque(&self, url: &str, body: &str) -> SyncResult<()> {
        self.opaque.borrow_mut().push((url.to_string(), body.to_string()));
        match self.opaque_error.borrow().clone() {
            Some(msg) => Err(SyncError::Network(msg)),
            None => Ok(()),
        }
    }
}

/// Wall clock that follows tokio's (pausable) clock from a fixed start
pub struct TestRuntime {
    start_wall: DateTime<Utc>,
    start: tokio::time::Instant,
    skew: Cell<chrono::Duration>,
    zone: FixedOffset,
}

impl TestRuntime {
    /// Starts at 2024-03-10 09:00 UTC
    pub fn new() -> Rc<Self> {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap())
    }

    pub fn starting_at(start_wall: DateTime<Utc>) -> Rc<Self> {
        Self::in_zone(start_wall, FixedOffset::east_opt(0).unwrap())
    }

    pub fn in_zone(start_wall: DateTime<Utc>, zone: FixedOffset) -> Rc<Self> {
        Rc::new(Self {
            start_wall,
            start: tokio::time::Instant::now(),
            skew: Cell::new(chrono::Duration::zero()),
            zone,
        })
    }

    /// Jump the wall clock without moving tokio time
    pub fn skip(&self, by: chrono::Duration) {
        self.skew.set(self.skew.get() + by);
    }
}

impl Runtime for TestRuntime {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        self.start_wall + elapsed + self.skew.get()
    }

    fn now_local(&self) -> DateTime<FixedOffset> {
        self.now().with_timezone(&self.zone)
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }
}

/// Let spawned local tasks run until they block, moving the clock only a few ms
pub async fn settle() {
    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
