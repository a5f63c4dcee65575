//! Mutation Flows
//!
//! Outcome recording, the automatic OR after an order is punched, quick
//! orders, native sales orders, follow-ups scheduled from an order, and new
//! dealers. Each builds a
//! fixed-shape command, delivers it, and on a confirmed or unknown delivery
//! triggers a forced refresh. A failed delivery comes back as an error so the
//! form stays editable.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use super::{not_signed_in, RefreshOptions, SyncOrchestrator};
use crate::dates::{auto_followup, AutoFollowup};
use crate::error::{SyncError, SyncResult};
use crate::models::{find_dealer, ClientColor, FollowupContext, MarkCommand, OrderSummaryEntry, Outcome};
use crate::sales_order::{order_id_of, validation_error, SalesOrderDraft, SalesOrderReceipt};
use crate::transport::Delivery;

/// Result of scheduling a follow-up from an order
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledFollowup {
    pub row_index: u32,
    pub call_n: u8,
    pub target: AutoFollowup,
    pub delivery: Delivery,
}

impl SyncOrchestrator {
    /// Session reference date, else the local calendar date
    fn date_of_record(&self) -> NaiveDate {
        self.inner
            .state
            .borrow()
            .today
            .unwrap_or_else(|| self.inner.runtime.now_local().date_naive())
    }

    fn session(&self) -> SyncResult<(String, String)> {
        let state = self.inner.state.borrow();
        let token = state.id_token.clone().ok_or_else(not_signed_in)?;
        let email = state.user.as_ref().map(|u| u.email.clone()).unwrap_or_default();
        Ok((token, email))
    }

    async fn deliver(&self, cmd: &MarkCommand) -> SyncResult<Delivery> {
        let (token, _) = self.session()?;
        log::debug!("recording {} for row {} call {}", cmd.outcome.code(), cmd.row_index, cmd.call_n);
        match self.inner.api.mark(&token, cmd).await {
            Delivery::Failed(e) => {
                log::warn!("could not record {} for row {}: {}", cmd.outcome.code(), cmd.row_index, e);
                Err(e)
            }
            delivery => {
                if matches!(delivery, Delivery::Unknown) {
                    log::info!("{} for row {} sent without confirmation", cmd.outcome.code(), cmd.row_index);
                }
                self.spawn_refresh(RefreshOptions::forced());
                Ok(delivery)
            }
        }
    }

    fn slot_command(&self, ctx: &FollowupContext, outcome: Outcome, remark: &str, schedule_at: Option<DateTime<Utc>>) -> MarkCommand {
        let date = ctx.date_of_record.unwrap_or_else(|| self.date_of_record());
        MarkCommand {
            row_index: ctx.row_index,
            date,
            outcome,
            remark: remark.trim().to_string(),
            call_n: ctx.call_n,
            planned_date: ctx.call_date,
            schedule_at,
        }
    }

    /// Submit the follow-up form for an open call slot
    pub async fn record_outcome(
        &self,
        ctx: &FollowupContext,
        outcome: Option<Outcome>,
        remark: &str,
        schedule_at: Option<DateTime<Utc>>,
    ) -> SyncResult<Delivery> {
        let outcome = outcome.ok_or_else(|| SyncError::Validation("Select an outcome".to_string()))?;
        let schedule_at = match outcome {
            Outcome::OrderReceived => {
                return Err(SyncError::Validation(
                    "Submit the order in the embedded order form; OR is recorded automatically".to_string(),
                ))
            }
            Outcome::ScheduleFollowup => Some(
                schedule_at.ok_or_else(|| SyncError::Validation("Pick the next follow-up date and time".to_string()))?,
            ),
            _ => None,
        };
        let cmd = self.slot_command(ctx, outcome, remark, schedule_at);
        self.deliver(&cmd).await
    }

    /// The embedded form reported a punched order for the open slot
    pub async fn auto_mark_order_received(&self, ctx: &FollowupContext, remark: &str) -> SyncResult<Delivery> {
        let cmd = self.slot_command(ctx, Outcome::OrderReceived, remark, None);
        self.deliver(&cmd).await
    }

    /// An order was punched from the "New Order" flow for `dealer_name`
    pub async fn quick_order_punched(&self, dealer_name: &str) -> SyncResult<Delivery> {
        let dealer_name = dealer_name.trim();
        if dealer_name.is_empty() {
            return Err(SyncError::Validation("Dealer Name is required.".to_string()));
        }
        let (token, email) = self.session()?;
        if email.is_empty() {
            return Err(SyncError::Validation("Signed-in user email is missing.".to_string()));
        }

        let row = self.inner.api.row_by_dealer(&token, &email, dealer_name, false).await?;
        let date = self.date_of_record();
        let cmd = MarkCommand {
            row_index: row.row_index,
            date,
            outcome: Outcome::OrderReceived,
            remark: "Quick Order".to_string(),
            call_n: 0,
            planned_date: date,
            schedule_at: None,
        };
        self.deliver(&cmd).await
    }

    /// Submit the native order form from page `origin`. A new dealer is
    /// mapped with its color afterwards and the dealer's row gets the usual
    /// quick-order OR. Only the intake call itself can fail the submit.
    pub async fn submit_sales_order(&self, draft: &SalesOrderDraft, origin: &str) -> SyncResult<SalesOrderReceipt> {
        let (token, email) = self.session()?;
        let (name, dealers) = {
            let state = self.inner.state.borrow();
            let name = state.user.as_ref().map(|u| u.name.clone()).unwrap_or_default();
            (name, state.dealers.clone())
        };
        validation_error(&draft.validate(&email, &dealers))?;
        let is_new = draft.is_new_dealer(&dealers);
        let dealer_name = draft.dealer_name.trim().to_string();

        let response = self
            .inner
            .api
            .submit_sales_order(&draft.payload(&email, &name, &token), origin)
            .await
            .map_err(|e| {
                log::warn!("order for {} was not accepted: {}", dealer_name, e);
                e
            })?;
        let order_id = order_id_of(&response);
        log::info!("order {} submitted for {}", order_id, dealer_name);

        let mut dealer_warning = None;
        if is_new {
            let color = draft.new_dealer_color.unwrap_or(ClientColor::Unknown);
            if let Err(e) = self.add_dealer(&dealer_name, color).await {
                log::warn!("order went in but dealer {} was not mapped: {}", dealer_name, e);
                dealer_warning = Some(format!("Order submitted, but dealer list update failed for \"{}\".", dealer_name));
            }
        }

        let marked = self.quick_order_punched(&dealer_name).await;
        Ok(SalesOrderReceipt { dealer_name, order_id, response, dealer_warning, marked })
    }

    /// Create a follow-up for the dealer behind `order`, in the first free
    /// call slot, a fixed number of days out
    pub async fn schedule_followup(&self, order: &OrderSummaryEntry, dealer_name: &str) -> SyncResult<ScheduledFollowup> {
        let dealer_name = dealer_name.trim();
        if dealer_name.is_empty() {
            return Err(SyncError::Validation("Select a dealer".to_string()));
        }
        let (token, email) = self.session()?;

        let row = self.inner.api.row_by_dealer(&token, &email, dealer_name, true).await?;
        let call_n = row.first_free_slot();
        let today = self.inner.state.borrow().today;
        let target = auto_followup(today, &self.inner.runtime.now_local(), self.inner.config.followup_offset_days);

        let cmd = MarkCommand {
            row_index: row.row_index,
            date: self.date_of_record(),
            outcome: Outcome::ScheduleFollowup,
            remark: format!("Scheduled from OrderCycle (orderId={})", order.order_id),
            call_n,
            planned_date: target.planned_date,
            schedule_at: Some(target.schedule_at),
        };
        let delivery = self.deliver(&cmd).await?;
        Ok(ScheduledFollowup { row_index: row.row_index, call_n, target, delivery })
    }

    /// Map a new dealer to the signed-in user and list it locally
    pub async fn add_dealer(&self, dealer_name: &str, color: ClientColor) -> SyncResult<Value> {
        let dealer_name = dealer_name.trim();
        if dealer_name.is_empty() {
            return Err(SyncError::Validation("Dealer Name is required.".to_string()));
        }
        if color == ClientColor::Unknown {
            return Err(SyncError::Validation("Select a color for this new dealer.".to_string()));
        }
        let (token, email) = self.session()?;
        if email.is_empty() {
            return Err(SyncError::Validation("Signed-in user email is missing.".to_string()));
        }

        let ack = self.inner.api.add_dealer(&token, &email, dealer_name, color).await?;
        log::info!("added dealer {}", dealer_name);
        let name = dealer_name.to_string();
        self.update(|s| {
            if find_dealer(&s.dealers, &name).is_none() {
                s.dealers.push(name);
            }
        });
        Ok(ack)
    }
}
