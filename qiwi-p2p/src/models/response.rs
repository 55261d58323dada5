//! Records returned by the API and delivered by webhooks.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::bill::{Amount, Customer};

/// Error codes synthesized from HTTP status codes.
pub mod codes {
    /// HTTP 400, most often a malformed expiration time
    pub const BAD_REQUEST: &str = "bad_request";
    /// HTTP 401
    pub const BAD_TOKEN: &str = "bad_token";
    /// HTTP 404
    pub const BAD_ID: &str = "bad_id";

    /// Any other non-200 status.
    pub fn http_error(status: u16) -> String {
        format!("http_error_{status}")
    }
}

/// Lifecycle state of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillStatus {
    Waiting,
    Paid,
    Rejected,
    Expired,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Waiting => "WAITING",
            BillStatus::Paid => "PAID",
            BillStatus::Rejected => "REJECTED",
            BillStatus::Expired => "EXPIRED",
        }
    }

    /// Whether the bill can still change state.
    pub fn is_final(&self) -> bool {
        !matches!(self, BillStatus::Waiting)
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(BillStatus::Waiting),
            "PAID" => Ok(BillStatus::Paid),
            "REJECTED" => Ok(BillStatus::Rejected),
            "EXPIRED" => Ok(BillStatus::Expired),
            other => Err(format!("unknown bill status '{other}'")),
        }
    }
}

/// Status sub-record of a bill. `value` is kept verbatim since it is part of the webhook signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub value: String,
    #[serde(default)]
    pub changed_date_time: String,
}

impl Status {
    /// The parsed status, `None` if the API sent a value this crate does not know.
    pub fn kind(&self) -> Option<BillStatus> {
        self.value.parse().ok()
    }

    pub fn is_final(&self) -> bool {
        self.kind().is_some_and(|kind| kind.is_final())
    }

    pub fn changed_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.changed_date_time).ok()
    }
}

/// A bill as known to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    pub site_id: String,
    pub bill_id: String,
    pub amount: Amount,
    pub status: Status,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub creation_date_time: String,
    #[serde(default)]
    pub expiration_date_time: String,
    /// Payment form link to hand to the customer. Absent in webhook payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pay_url: Option<String>,
}

impl BillResponse {
    pub fn pay_url(&self) -> Option<&str> {
        self.pay_url.as_deref()
    }

    pub fn creation_date_time(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.creation_date_time).ok()
    }

    pub fn expiration_date_time(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.expiration_date_time).ok()
    }
}

/// Webhook notification envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub bill: BillResponse,
    #[serde(default)]
    pub version: String,
}

/// Error record returned by the API.
///
/// Also used for errors synthesized from HTTP status codes, in which case only `error_code`
/// and `description` are filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestError {
    pub service_name: String,
    pub error_code: String,
    pub description: String,
    pub user_message: String,
    pub date_time: String,
    pub trace_id: String,
}

impl RequestError {
    pub(crate) fn synthetic(error_code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            description: description.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.description)
    }
}
