//! Browser Platform
//!
//! `HttpClient` and `Runtime` backed by fetch, `navigator.sendBeacon`,
//! browser timers and the JS `Date` clock, plus the Google Identity Services
//! calls made outside the sign-in button.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::future::{FutureExt, LocalBoxFuture};
use gloo_net::http::{Request, RequestBuilder};
use js_sys::{Function, Reflect};
use std::time::Duration;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{AbortController, RequestMode};

use scot_sync::wire::parse_instant_in;
use scot_sync::{HttpClient, HttpResponse, Runtime, SyncError, SyncResult};

const TEXT_PLAIN: &str = "text/plain;charset=utf-8";

fn network_error(e: impl std::fmt::Display) -> SyncError {
    SyncError::Network(e.to_string())
}

/// Aborts the underlying fetch when the request future is dropped
struct AbortOnDrop(Option<AbortController>);

impl AbortOnDrop {
    fn new() -> Self {
        Self(AbortController::new().ok())
    }

    fn attach(&self, builder: RequestBuilder) -> RequestBuilder {
        let signal = self.0.as_ref().map(|c| c.signal());
        builder.abort_signal(signal.as_ref())
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(controller) = self.0.take() {
            controller.abort();
        }
    }
}

// ========================
// HTTP
// ========================

/// Fetch-based client. Bodies go out as `text/plain` so the backend never
/// triggers a CORS preflight.
#[derive(Clone, Copy, Default)]
pub struct BrowserHttp;

impl BrowserHttp {
    async fn send(&self, request: Request) -> SyncResult<HttpResponse> {
        let response = request.send().await.map_err(network_error)?;
        let status = response.status();
        let body = response.text().await.map_err(network_error)?;
        Ok(HttpResponse::new(status, body))
    }
}

#[async_trait(?Send)]
impl HttpClient for BrowserHttp {
    async fn get(&self, url: &str) -> SyncResult<HttpResponse> {
        let guard = AbortOnDrop::new();
        let request = guard.attach(Request::get(url)).build().map_err(network_error)?;
        self.send(request).await
    }

    async fn post(&self, url: &str, body: &str) -> SyncResult<HttpResponse> {
        let guard = AbortOnDrop::new();
        let request = guard
            .attach(Request::post(url))
            .header("Content-Type", TEXT_PLAIN)
            .body(body.to_string())
            .map_err(network_error)?;
        self.send(request).await
    }

    fn send_beacon(&self, url: &str, body: &str) -> bool {
        web_sys::window()
            .and_then(|w| w.navigator().send_beacon_with_opt_str(url, Some(body)).ok())
            .unwrap_or(false)
    }

    async fn post_opaque(&self, url: &str, body: &str) -> SyncResult<()> {
        let guard = AbortOnDrop::new();
        let request = guard
            .attach(Request::post(url))
            .mode(RequestMode::NoCors)
            .header("Content-Type", TEXT_PLAIN)
            .body(body.to_string())
            .map_err(network_error)?;
        request.send().await.map_err(network_error)?;
        Ok(())
    }
}

// ========================
// Runtime
// ========================

#[derive(Clone, Copy, Default)]
pub struct BrowserRuntime;

/// The browser's current UTC offset
pub fn local_offset() -> FixedOffset {
    // getTimezoneOffset is minutes west of UTC
    let minutes_west = js_sys::Date::new_0().get_timezone_offset() as i32;
    FixedOffset::west_opt(minutes_west * 60).unwrap_or_else(|| Utc.fix())
}

/// Value of a `datetime-local` input (`2024-03-14T11:00`) as an instant
pub fn local_input_to_utc(raw: &str) -> Option<DateTime<Utc>> {
    parse_instant_in(raw, &local_offset())
}

// ========================
// Identity widget
// ========================

/// `google.accounts.id.disableAutoSelect()`, so the next visit shows the
/// account chooser instead of signing straight back in
pub fn disable_auto_select() {
    if let Err(e) = call_gis("disableAutoSelect") {
        log::debug!("disableAutoSelect skipped: {:?}", e);
    }
}

fn call_gis(method: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let mut target: JsValue = window.into();
    for key in ["google", "accounts", "id"] {
        target = Reflect::get(&target, &JsValue::from_str(key))?;
        if target.is_undefined() || target.is_null() {
            return Err(JsValue::from_str(&format!("{} is not available", key)));
        }
    }
    let func: Function = Reflect::get(&target, &JsValue::from_str(method))?.dyn_into()?;
    func.call0(&target)?;
    Ok(())
}

impl Runtime for BrowserRuntime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_local(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&local_offset())
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        gloo_timers::future::sleep(duration).boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}
