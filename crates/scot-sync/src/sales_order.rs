//! Sales Order Intake
//!
//! The native "New Order" form: dealer pick (or a new dealer with its color),
//! marketing person, location and file attachments, posted to the order
//! intake endpoint as one JSON document.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::models::{find_dealer, ClientColor};
use crate::transport::Delivery;

/// Suggestions shown under the dealer search box
pub const DEALER_SUGGESTIONS: usize = 100;

/// A file as the intake endpoint expects it: base64 without a data-URL prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAttachment {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub data: String,
}

impl OrderAttachment {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }
}

/// What the user typed into the form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesOrderDraft {
    pub dealer_name: String,
    pub marketing_person_name: String,
    pub dealer_location: String,
    pub files: Vec<OrderAttachment>,
    /// Only consulted when the dealer is not in the user's list
    pub new_dealer_color: Option<ClientColor>,
}

/// Per-field problems, rendered next to each input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftErrors {
    pub auth: Option<String>,
    pub dealer_name: Option<String>,
    pub marketing_person_name: Option<String>,
    pub dealer_location: Option<String>,
    pub files: Option<String>,
    pub dealer_color: Option<String>,
}

impl DraftErrors {
    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// The first problem in form order
    pub fn first(&self) -> Option<&str> {
        [
            &self.auth,
            &self.dealer_name,
            &self.marketing_person_name,
            &self.dealer_location,
            &self.files,
            &self.dealer_color,
        ]
        .into_iter()
        .find_map(|e| e.as_deref())
    }
}

impl SalesOrderDraft {
    /// A dealer name that is not in `dealers`
    pub fn is_new_dealer(&self, dealers: &[String]) -> bool {
        !self.dealer_name.trim().is_empty() && find_dealer(dealers, &self.dealer_name).is_none()
    }

    pub fn validate(&self, email: &str, dealers: &[String]) -> DraftErrors {
        let required = |value: &str, message: &str| value.trim().is_empty().then(|| message.to_string());
        let picked_color = self.new_dealer_color.filter(|c| *c != ClientColor::Unknown);
        DraftErrors {
            auth: required(email, "Signed-in user email is missing."),
            dealer_name: required(&self.dealer_name, "Dealer Name is required."),
            marketing_person_name: required(&self.marketing_person_name, "Marketing Person Name is required."),
            dealer_location: required(&self.dealer_location, "Dealer Location is required."),
            files: self.files.is_empty().then(|| "At least one file is required.".to_string()),
            dealer_color: (self.is_new_dealer(dealers) && picked_color.is_none())
                .then(|| "Select a color for this new dealer.".to_string()),
        }
    }

    pub fn payload<'a>(&'a self, email: &str, name: &str, id_token: &'a str) -> SalesOrderPayload<'a> {
        SalesOrderPayload {
            dealer_name: self.dealer_name.trim(),
            marketing_person_name: self.marketing_person_name.trim(),
            dealer_location: self.dealer_location.trim(),
            files: &self.files,
            punched_by_email: email.trim().to_lowercase(),
            punched_by_name: name.trim().to_string(),
            id_token: id_token.trim(),
        }
    }
}

/// Body posted to the intake endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderPayload<'a> {
    pub dealer_name: &'a str,
    pub marketing_person_name: &'a str,
    pub dealer_location: &'a str,
    pub files: &'a [OrderAttachment],
    pub punched_by_email: String,
    pub punched_by_name: String,
    #[serde(rename = "id_token")]
    pub id_token: &'a str,
}

/// Sorted dealers whose name contains `needle`, case-insensitively
pub fn filter_dealers(dealers: &[String], needle: &str) -> Vec<String> {
    let needle = needle.trim().to_lowercase();
    let mut list: Vec<String> = dealers
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .filter(|d| needle.is_empty() || d.to_lowercase().contains(&needle))
        .map(str::to_string)
        .collect();
    list.sort_by_key(|d| d.to_lowercase());
    list.truncate(DEALER_SUGGESTIONS);
    list
}

/// Outcome of a submitted sales order
#[derive(Debug, Clone, PartialEq)]
pub struct SalesOrderReceipt {
    pub dealer_name: String,
    /// Intake's order id, blank when it returned none
    pub order_id: String,
    pub response: Value,
    /// The order went in but the new dealer could not be mapped
    pub dealer_warning: Option<String>,
    /// The automatic OR for the dealer's row
    pub marked: SyncResult<Delivery>,
}

pub(crate) fn order_id_of(response: &Value) -> String {
    response
        .get("orderId")
        .and_then(crate::wire::value_to_string)
        .unwrap_or_default()
}

pub(crate) fn validation_error(errors: &DraftErrors) -> SyncResult<()> {
    match errors.first() {
        Some(message) => Err(SyncError::Validation(message.to_string())),
        None => Ok(()),
    }
}
