//! SCOT Backend API
//!
//! Typed endpoints of the spreadsheet backend. Every read goes through
//! `?path=<endpoint>` on the configured base URL; writes POST a JSON body
//! whose `path` field names the endpoint.

use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ScotConfig;
use crate::error::{SyncError, SyncResult};
use crate::models::{ClientColor, DuePage, MarkCommand, OrderSummary, Remark, RowRecord, UserIdentity};
use crate::query::Query;
use crate::sales_order::SalesOrderPayload;
use crate::transport::{Delivery, HttpClient, PostOptions, RequestOptions, Runtime, ScotTransport};
use crate::wire;

/// Attachments make intake slow; it gets one long attempt
pub const ORDER_SUBMIT_TIMEOUT: Duration = Duration::from_secs(90);

/// Parameters of a due-items read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueQuery {
    /// Bypass the backend cache
    pub fresh: bool,
    pub limit: Option<u32>,
    pub cursor: Option<u32>,
}

/// Parameters of an order cycle summary read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrdersQuery {
    pub fresh: bool,
    /// Bounded fast mode
    pub fast: bool,
    pub window_rows: Option<u32>,
}

#[derive(Serialize)]
struct Command<'a, T: Serialize> {
    path: &'a str,
    id_token: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDealer<'a> {
    email: &'a str,
    dealer_name: &'a str,
    color: &'a str,
}

/// Client for the SCOT backend
#[derive(Clone)]
pub struct ScotApi {
    base: String,
    order_post_url: String,
    transport: ScotTransport,
    write_retries: u32,
}

impl ScotApi {
    pub fn new(config: &ScotConfig, client: Rc<dyn HttpClient>, runtime: Rc<dyn Runtime>) -> Self {
        let transport = ScotTransport::new(client, runtime)
            .with_timeout(config.request_timeout())
            .with_retry_backoff(config.retry_backoff());
        Self {
            base: config.api_base.trim().to_string(),
            order_post_url: config.order_post_url.trim().to_string(),
            transport,
            write_retries: config.write_retries,
        }
    }

    pub fn transport(&self) -> &ScotTransport {
        &self.transport
    }

    fn base(&self) -> SyncResult<&str> {
        if self.base.is_empty() {
            return Err(SyncError::Validation("Missing SCOT API base URL".to_string()));
        }
        Ok(&self.base)
    }

    fn endpoint(&self, path: &str) -> SyncResult<Query> {
        Ok(Query::parse(self.base()?)?.set("path", path))
    }

    fn authed(&self, path: &str, id_token: &str) -> SyncResult<Query> {
        if id_token.trim().is_empty() {
            return Err(SyncError::Validation("Missing id_token".to_string()));
        }
        Ok(self.endpoint(path)?.set("id_token", id_token))
    }

    /// Cancellable when a token is given, otherwise coalesced on the URL
    async fn read(&self, url: String, cancel: Option<&CancellationToken>) -> SyncResult<Value> {
        let opts = match cancel {
            Some(token) => RequestOptions::cancellable(token),
            None => RequestOptions::deduped(url.clone()),
        };
        self.transport.fetch_json(&url, opts).await
    }

    fn command<T: Serialize>(&self, path: &str, id_token: &str, body: &T) -> SyncResult<Value> {
        serde_json::to_value(Command { path, id_token, body })
            .map_err(|e| SyncError::Validation(format!("could not encode {}: {}", path, e)))
    }

    // ========================
    // Reads
    // ========================

    pub async fn whoami(&self, id_token: &str, cancel: Option<&CancellationToken>) -> SyncResult<UserIdentity> {
        let url = self.authed("me", id_token)?.build();
        let env = self.read(url, cancel).await?;
        wire::user_from_envelope(&env).ok_or_else(|| SyncError::api("Signed-in user has no email"))
    }

    pub async fn due(&self, id_token: &str, query: DueQuery, cancel: Option<&CancellationToken>) -> SyncResult<DuePage> {
        let url = self
            .authed("due", id_token)?
            .flag("nocache", query.fresh)
            .set_opt("limit", query.limit)
            .set_opt("cursor", query.cursor)
            .build();
        let env = self.read(url, cancel).await?;
        Ok(DuePage::from_envelope(&env))
    }

    pub async fn order_summary(
        &self,
        id_token: &str,
        query: OrdersQuery,
        cancel: Option<&CancellationToken>,
    ) -> SyncResult<OrderSummary> {
        let url = self
            .authed("orderCycleSummary", id_token)?
            .flag("nocache", query.fresh)
            .flag("fast", query.fast)
            .set_opt("windowRows", query.window_rows)
            .build();
        let env = self.read(url, cancel).await?;
        Ok(OrderSummary::from_envelope(&env))
    }

    /// Scheduled follow-up history of one client
    pub async fn sf_remarks(&self, id_token: &str, client_name: &str) -> SyncResult<Vec<Remark>> {
        let url = self.authed("sfRemarks", id_token)?.set("client", client_name).build();
        let env = self.read(url, None).await?;
        Ok(wire::remarks_from_envelope(&env))
    }

    /// Dealers mapped to `email`
    pub async fn dealers(&self, email: &str) -> SyncResult<Vec<String>> {
        let url = self.endpoint("scotDealers")?.set("email", email).build();
        let env = self.read(url, None).await?;
        Ok(wire::dealers_from_envelope(&env))
    }

    pub async fn row_by_dealer(
        &self,
        id_token: &str,
        email: &str,
        dealer: &str,
        include_calls: bool,
    ) -> SyncResult<RowRecord> {
        let url = self
            .endpoint("rowByDealer")?
            .set("email", email)
            .set("dealer", dealer)
            .set("id_token", id_token)
            .flag("includeCalls", include_calls)
            .build();
        let env = self.read(url, None).await?;
        RowRecord::from_envelope(&env).ok_or_else(|| SyncError::api(format!("No row found for dealer \"{}\"", dealer)))
    }

    // ========================
    // Writes
    // ========================

    /// Record a call outcome. Never fails outright; see `Delivery`.
    pub async fn mark(&self, id_token: &str, cmd: &MarkCommand) -> Delivery {
        let prepared = self.base().and_then(|base| Ok((base, self.command("mark", id_token, cmd)?)));
        match prepared {
            Ok((base, body)) => self.transport.post_best_effort(base, &body).await,
            Err(e) => Delivery::Failed(e),
        }
    }

    pub async fn add_dealer(&self, id_token: &str, email: &str, dealer_name: &str, color: ClientColor) -> SyncResult<Value> {
        let base = self.base()?;
        let body = self.command("addDealer", id_token, &NewDealer { email, dealer_name, color: color.as_str() })?;
        self.transport
            .post_json(base, &body, PostOptions::with_retries(self.write_retries))
            .await
    }

    /// Hand a sales order to the intake endpoint, tagged with the page
    /// origin it was punched from. Not retried: intake is not idempotent.
    pub async fn submit_sales_order(&self, payload: &SalesOrderPayload<'_>, origin: &str) -> SyncResult<Value> {
        if self.order_post_url.is_empty() {
            return Err(SyncError::Validation("Missing order intake URL".to_string()));
        }
        let url = Query::parse(&self.order_post_url)?.set("origin", origin).build();
        let body = serde_json::to_value(payload)
            .map_err(|e| SyncError::Validation(format!("could not encode order: {}", e)))?;
        let opts = PostOptions { timeout: Some(ORDER_SUBMIT_TIMEOUT), ..PostOptions::with_retries(0) };
        self.transport.post_json(&url, &body, opts).await.map_err(|e| match e {
            SyncError::Api { message } if message == "Request failed" => SyncError::api("Order submit failed"),
            other => other,
        })
    }
}
