//! Wire types for the bill API.
//!
//! - [`bill`]: the outbound [`Bill`] payload and its builder-style setters
//! - [`response`]: bills, statuses, webhook envelopes and error records returned by the API

pub mod bill;
pub mod response;

pub use bill::{Amount, Bill, Customer, PaySource};
pub use response::{BillResponse, BillStatus, PaymentUpdate, RequestError, Status, codes};
