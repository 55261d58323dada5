//! HMAC-SHA256 verification of payment notifications.
//!
//! The API signs a notification by joining five fields of the bill with `|`:
//!
//! ```text
//! {amount.currency}|{amount.value}|{billId}|{siteId}|{status.value}
//! ```
//!
//! keyed with the merchant's secret key, and sends the lowercase hex digest in the
//! `X-Api-Signature-SHA256` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::BillResponse;

type HmacSha256 = Hmac<Sha256>;

/// The string covered by the signature.
pub fn signed_content(bill: &BillResponse) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        bill.amount.currency, bill.amount.value, bill.bill_id, bill.site_id, bill.status.value
    )
}

/// Lowercase hex HMAC-SHA256 of `content` keyed by `secret_key`.
pub fn sign(content: &str, secret_key: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).ok()?;
    mac.update(content.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Expected signature header value for a notification about `bill`.
pub fn sign_bill(bill: &BillResponse, secret_key: &str) -> Option<String> {
    sign(&signed_content(bill), secret_key)
}

/// Check a signature header value against the bill.
pub fn verify_signature(bill: &BillResponse, signature: &str, secret_key: &str) -> bool {
    let Some(expected) = sign_bill(bill, secret_key) else {
        return false;
    };

    constant_time_eq(signature.as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
