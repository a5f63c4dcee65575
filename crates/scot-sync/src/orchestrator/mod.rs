//! Sync Orchestrator
//!
//! Owns `SyncState` and runs refresh cycles against the backend. Each cycle
//! is identified by a generation number; a cycle may only write state while
//! its generation is the current one, so out-of-order completions of
//! superseded cycles are dropped instead of overwriting newer data.
//!
//! Everything runs on one thread. State lives in `RefCell`s and is never
//! borrowed across an `.await`.

mod mutations;
mod polling;

pub use mutations::ScheduledFollowup;

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tokio_util::sync::CancellationToken;

use crate::api::{DueQuery, OrdersQuery, ScotApi};
use crate::config::ScotConfig;
use crate::dates;
use crate::error::{SyncError, SyncResult};
use crate::identity::decode_credential_claims;
use crate::merge::merge_unique;
use crate::models::{DueItem, OrderSummary, Remark, UserIdentity};
use crate::transport::{HttpClient, Runtime};

type SharedCycle = Shared<LocalBoxFuture<'static, RefreshOutcome>>;

// ========================
// State
// ========================

/// Everything the dashboard shows, written only by the orchestrator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    /// Bearer credential of the current session
    pub id_token: Option<String>,
    pub user: Option<UserIdentity>,
    /// Backend's reference date from the last successful due fetch
    pub today: Option<NaiveDate>,
    pub items: Vec<DueItem>,
    pub orders: OrderSummary,
    pub dealers: Vec<String>,
    pub last_error: Option<String>,
    /// Generation of the current cycle; 0 when no cycle has started
    pub generation: u64,
    /// A visible (non-silent) cycle is running
    pub syncing: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_full_orders_at: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn is_signed_in(&self) -> bool {
        self.id_token.is_some()
    }

    pub fn overdue_count(&self, now: DateTime<Utc>) -> usize {
        dates::overdue_count(&self.items, self.today, now)
    }
}

/// Receives every committed state change and user-facing notices
pub trait SyncObserver {
    fn on_state(&self, state: &SyncState);

    /// Transient message for a toast
    fn on_notice(&self, _message: &str) {}

    /// A session ended; the identity widget should stop auto-selecting the account
    fn on_signed_out(&self) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_state(&self, _state: &SyncState) {}
}

/// How a refresh was requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Timer-driven: failures update `last_error` only, no notice
    pub silent: bool,
    /// Supersede any cycle in flight instead of joining it
    pub force: bool,
    /// First load of a session: small first page, then background pagination
    pub initial: bool,
    /// Bypass the backend cache on the first page of an initial load
    pub fresh: bool,
}

impl RefreshOptions {
    /// Periodic background refresh
    pub fn silent() -> Self {
        Self { silent: true, ..Self::default() }
    }

    /// After a mutation or a manual reload
    pub fn forced() -> Self {
        Self { force: true, fresh: true, ..Self::default() }
    }

    /// First load after sign-in
    pub fn initial() -> Self {
        Self { silent: true, force: true, initial: true, fresh: true }
    }
}

/// What a refresh call ended with
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Completed,
    /// A newer cycle took over before this one finished
    Superseded,
    NoSession,
    Failed(SyncError),
}

// ========================
// Orchestrator
// ========================

struct Inner {
    api: ScotApi,
    runtime: Rc<dyn Runtime>,
    config: ScotConfig,
    observer: RefCell<Rc<dyn SyncObserver>>,
    state: RefCell<SyncState>,
    /// Last generation handed out; never reset so numbers are never reused
    minted: Cell<u64>,
    cancel: RefCell<Option<CancellationToken>>,
    inflight: RefCell<Option<(u64, SharedCycle)>>,
    poll_epoch: Cell<u64>,
    polling: Cell<bool>,
    suspended: Cell<u32>,
}

/// Handle to the single sync engine; clones share it
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Rc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(config: ScotConfig, client: Rc<dyn HttpClient>, runtime: Rc<dyn Runtime>) -> Self {
        let api = ScotApi::new(&config, client, runtime.clone());
        Self {
            inner: Rc::new(Inner {
                api,
                runtime,
                config,
                observer: RefCell::new(Rc::new(NoopObserver)),
                state: RefCell::new(SyncState::default()),
                minted: Cell::new(0),
                cancel: RefCell::new(None),
                inflight: RefCell::new(None),
                poll_epoch: Cell::new(0),
                polling: Cell::new(false),
                suspended: Cell::new(0),
            }),
        }
    }

    pub fn set_observer(&self, observer: Rc<dyn SyncObserver>) {
        *self.inner.observer.borrow_mut() = observer;
    }

    pub fn config(&self) -> &ScotConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &ScotApi {
        &self.inner.api
    }

    pub fn runtime(&self) -> &Rc<dyn Runtime> {
        &self.inner.runtime
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.state.borrow().is_signed_in()
    }

    /// Whether a refresh cycle is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.inflight.borrow().is_some()
    }

    fn id_token(&self) -> Option<String> {
        self.inner.state.borrow().id_token.clone()
    }

    fn observer(&self) -> Rc<dyn SyncObserver> {
        self.inner.observer.borrow().clone()
    }

    fn notice(&self, message: &str) {
        self.observer().on_notice(message);
    }

    /// Apply `change` and publish the new snapshot
    fn update(&self, change: impl FnOnce(&mut SyncState)) {
        let snapshot = {
            let mut state = self.inner.state.borrow_mut();
            change(&mut state);
            state.clone()
        };
        self.observer().on_state(&snapshot);
    }

    fn is_current(&self, generation: u64) -> bool {
        generation != 0 && self.inner.state.borrow().generation == generation
    }

    /// `update`, but only while `generation` is current. Returns whether it applied.
    fn commit(&self, generation: u64, change: impl FnOnce(&mut SyncState)) -> bool {
        if !self.is_current(generation) {
            log::debug!("dropping result of superseded cycle {}", generation);
            return false;
        }
        self.update(change);
        true
    }

    // ========================
    // Session
    // ========================

    /// Start a session with a sign-in credential and run the first load.
    ///
    /// On failure the session is torn down again and the error returned.
    pub async fn sign_in(&self, credential: &str) -> SyncResult<UserIdentity> {
        let credential = credential.trim().to_string();
        if credential.is_empty() {
            return Err(SyncError::Validation("Missing id_token".to_string()));
        }

        self.sign_out();
        let guessed = decode_credential_claims(&credential);
        self.update(|s| {
            s.id_token = Some(credential.clone());
            s.user = guessed.clone();
        });

        let user = match guessed {
            Some(user) => user,
            None => match self.inner.api.whoami(&credential, None).await {
                Ok(user) => user,
                Err(e) => return Err(self.abort_sign_in(&credential, e)),
            },
        };
        if !self.session_is(&credential) {
            return Err(SyncError::Cancelled);
        }
        self.update(|s| s.user = Some(user.clone()));

        match self.refresh(RefreshOptions::initial()).await {
            RefreshOutcome::Completed => {}
            RefreshOutcome::Failed(e) => return Err(self.abort_sign_in(&credential, e)),
            RefreshOutcome::Superseded | RefreshOutcome::NoSession => {
                if !self.session_is(&credential) {
                    return Err(SyncError::Cancelled);
                }
            }
        }

        log::info!("signed in as {}", user.email);
        self.load_dealers(user.email.clone());
        self.start_polling();
        Ok(user)
    }

    fn session_is(&self, credential: &str) -> bool {
        self.inner.state.borrow().id_token.as_deref() == Some(credential)
    }

    fn abort_sign_in(&self, credential: &str, error: SyncError) -> SyncError {
        log::error!("sign-in failed: {}", error);
        if self.session_is(credential) {
            self.sign_out();
        }
        error
    }

    /// End the session: cancel outstanding work, stop polling and clear state
    pub fn sign_out(&self) {
        self.stop_polling();
        self.inner.suspended.set(0);
        if let Some(token) = self.inner.cancel.borrow_mut().take() {
            token.cancel();
        }
        self.inner.inflight.borrow_mut().take();
        let had_session = self.is_signed_in();
        self.update(|s| *s = SyncState::default());
        if had_session {
            log::info!("signed out");
            self.observer().on_signed_out();
        }
    }

    fn load_dealers(&self, email: String) {
        if email.is_empty() {
            return;
        }
        let this = self.clone();
        let session = self.id_token();
        self.inner.runtime.spawn(
            async move {
                match this.inner.api.dealers(&email).await {
                    Ok(dealers) if this.id_token() == session => this.update(|s| s.dealers = dealers),
                    Ok(_) => {}
                    Err(e) => log::warn!("dealer list unavailable: {}", e),
                }
            }
            .boxed_local(),
        );
    }

    /// Follow-up remark history for one client
    pub async fn sf_remarks(&self, client_name: &str) -> SyncResult<Vec<Remark>> {
        let token = self.id_token().ok_or_else(not_signed_in)?;
        self.inner.api.sf_remarks(&token, client_name).await
    }

    // ========================
    // Refresh cycle
    // ========================

    /// Run (or join) a refresh cycle.
    ///
    /// A non-forced, non-initial call while a cycle is in flight resolves with
    /// that cycle's outcome. Otherwise any cycle in flight is cancelled and
    /// superseded.
    pub async fn refresh(&self, opts: RefreshOptions) -> RefreshOutcome {
        let Some(id_token) = self.id_token() else {
            return RefreshOutcome::NoSession;
        };

        if !opts.force && !opts.initial {
            let joined = self.inner.inflight.borrow().as_ref().map(|(_, cycle)| cycle.clone());
            if let Some(cycle) = joined {
                log::debug!("joining refresh cycle in flight");
                return cycle.await;
            }
        }

        let (generation, cancel) = self.begin_cycle(opts);
        let this = self.clone();
        let cycle = async move { this.run_cycle(generation, id_token, cancel, opts).await }
            .boxed_local()
            .shared();
        *self.inner.inflight.borrow_mut() = Some((generation, cycle.clone()));

        // Keep the cycle running even if this caller stops waiting
        self.inner.runtime.spawn(cycle.clone().map(|_| ()).boxed_local());
        cycle.await
    }

    /// Fire-and-forget `refresh`
    pub fn spawn_refresh(&self, opts: RefreshOptions) {
        let this = self.clone();
        self.inner.runtime.spawn(
            async move {
                this.refresh(opts).await;
            }
            .boxed_local(),
        );
    }

    fn begin_cycle(&self, opts: RefreshOptions) -> (u64, CancellationToken) {
        if let Some(previous) = self.inner.cancel.borrow_mut().take() {
            previous.cancel();
        }
        let generation = self.inner.minted.get() + 1;
        self.inner.minted.set(generation);
        let cancel = CancellationToken::new();
        *self.inner.cancel.borrow_mut() = Some(cancel.clone());

        log::debug!(
            "refresh cycle {} started (initial: {}, silent: {}, force: {})",
            generation,
            opts.initial,
            opts.silent,
            opts.force
        );
        self.update(|s| {
            s.generation = generation;
            if !opts.silent {
                s.syncing = true;
            }
        });
        (generation, cancel)
    }

    async fn run_cycle(&self, generation: u64, id_token: String, cancel: CancellationToken, opts: RefreshOptions) -> RefreshOutcome {
        let result = self.cycle_body(generation, &id_token, &cancel, opts).await;
        self.finish_cycle(generation, opts, result)
    }

    async fn cycle_body(&self, generation: u64, id_token: &str, cancel: &CancellationToken, opts: RefreshOptions) -> SyncResult<()> {
        let api = &self.inner.api;
        let config = &self.inner.config;

        let due_query = if opts.initial {
            DueQuery { fresh: opts.fresh, limit: Some(config.first_page_limit), cursor: None }
        } else {
            DueQuery { fresh: true, limit: None, cursor: None }
        };
        let page = api.due(id_token, due_query, Some(cancel)).await?;

        let now = self.inner.runtime.now();
        let next_cursor = page.next_cursor;
        let committed = self.commit(generation, |s| {
            if page.today.is_some() {
                s.today = page.today;
            }
            s.items = page.items;
            s.last_error = None;
            s.last_synced_at = Some(now);
        });
        if !committed {
            return Ok(());
        }
        log::debug!("cycle {} committed due items", generation);

        if opts.initial {
            if let Some(cursor) = next_cursor {
                self.spawn_pagination(generation, id_token.to_string(), cancel.clone(), cursor, opts.fresh);
            }
        }

        let fast = OrdersQuery { fresh: false, fast: true, window_rows: Some(config.orders_window_rows) };
        match api.order_summary(id_token, fast, Some(cancel)).await {
            Ok(summary) => {
                self.commit(generation, |s| s.orders = summary);
            }
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                log::warn!("order summary unavailable: {}", e);
                return Ok(());
            }
        }

        let now = self.inner.runtime.now();
        let last_full = self.inner.state.borrow().last_full_orders_at;
        let full_due = opts.initial || last_full.map_or(true, |at| now - at > config.full_orders_refresh());
        if full_due && self.is_current(generation) {
            self.spawn_full_orders(generation, id_token.to_string(), cancel.clone(), now);
        }
        Ok(())
    }

    fn finish_cycle(&self, generation: u64, opts: RefreshOptions, result: SyncResult<()>) -> RefreshOutcome {
        {
            let mut inflight = self.inner.inflight.borrow_mut();
            if inflight.as_ref().is_some_and(|(g, _)| *g == generation) {
                *inflight = None;
            }
        }

        let current = self.is_current(generation);
        let outcome = match result {
            Ok(()) if current => RefreshOutcome::Completed,
            Ok(()) => RefreshOutcome::Superseded,
            Err(e) if e.is_cancelled() => {
                log::debug!("cycle {} cancelled", generation);
                RefreshOutcome::Superseded
            }
            Err(e) if !current => {
                log::debug!("cycle {} failed after being superseded: {}", generation, e);
                RefreshOutcome::Superseded
            }
            Err(e) => {
                let message = e.user_message();
                log::error!("sync failed: {}", message);
                self.update(|s| s.last_error = Some(message.clone()));
                if !opts.silent {
                    self.notice(&message);
                }
                RefreshOutcome::Failed(e)
            }
        };

        if current {
            self.update(|s| s.syncing = false);
        }
        outcome
    }

    fn spawn_pagination(&self, generation: u64, id_token: String, cancel: CancellationToken, first_cursor: u32, fresh: bool) {
        let this = self.clone();
        let page_limit = self.inner.config.page_limit;
        self.inner.runtime.spawn(
            async move {
                let mut cursor = first_cursor;
                loop {
                    let query = DueQuery { fresh, limit: Some(page_limit), cursor: Some(cursor) };
                    let page = match this.inner.api.due(&id_token, query, Some(&cancel)).await {
                        Ok(page) => page,
                        Err(e) => {
                            if !e.is_cancelled() {
                                log::warn!("due page at cursor {} failed: {}", cursor, e);
                            }
                            return;
                        }
                    };
                    let next = page.next_cursor;
                    let applied = this.commit(generation, |s| {
                        let shown = std::mem::take(&mut s.items);
                        s.items = merge_unique(shown, page.items);
                    });
                    if !applied {
                        return;
                    }
                    match next {
                        Some(n) if n != cursor => cursor = n,
                        _ => return,
                    }
                }
            }
            .boxed_local(),
        );
    }

    fn spawn_full_orders(&self, generation: u64, id_token: String, cancel: CancellationToken, started: DateTime<Utc>) {
        let this = self.clone();
        self.inner.runtime.spawn(
            async move {
                let full = OrdersQuery { fresh: true, fast: false, window_rows: None };
                match this.inner.api.order_summary(&id_token, full, Some(&cancel)).await {
                    Ok(summary) => {
                        this.commit(generation, |s| {
                            s.orders = summary;
                            s.last_full_orders_at = Some(started);
                        });
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => log::warn!("full order summary failed: {}", e),
                }
            }
            .boxed_local(),
        );
    }
}

fn not_signed_in() -> SyncError {
    SyncError::Validation("Not signed in".to_string())
}
