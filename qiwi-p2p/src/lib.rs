//! # qiwi-p2p: client for the QIWI P2P bill API
//!
//! Issue, query and cancel bills against the bill API, and receive signed payment
//! notifications from it.
//!
//! ## Overview
//!
//! A merchant builds a [`Bill`] (amount, expiry, customer details and free-form custom fields),
//! hands it to [`Client::create_bill`] and gets back a [`BillResponse`] carrying the vendor's
//! site id, the generated bill id and a payment form URL. The bill can later be fetched with
//! [`Client::get_bill`] or cancelled with [`Client::reject_bill`].
//!
//! When a bill changes status the API POSTs a notification to the merchant. [`Client::start_webhook`]
//! runs a small axum listener that acknowledges every notification immediately, checks its
//! `X-Api-Signature-SHA256` HMAC against the client's secret key, and hands verified
//! [`PaymentUpdate`]s to the caller through a bounded queue ([`PaymentUpdates`]).
//!
//! ## Errors
//!
//! Every client operation returns [`errors::Result`]. Failures fall into three groups:
//!
//! - [`Error::Transport`]: no usable response, e.g. connection refused or a timeout
//! - [`Error::Parse`]: the body was neither an error record nor a bill
//! - [`Error::Vendor`]: an error record from the API, or one synthesized from the HTTP status
//!   (`bad_request`, `bad_token`, `bad_id`, `http_error_{status}`)
//!
//! Nothing is retried internally.
//!
//! ## Secret key rotation
//!
//! The secret key is shared between a [`Client`], its clones and any webhook listener started
//! from it. [`Client::set_secret_key`] swaps it atomically; requests and signature checks that
//! start afterwards use the new key.
//!
//! ## Example
//!
//! ```no_run
//! use qiwi_p2p::{Bill, Client, PaySource};
//!
//! # async fn run() -> qiwi_p2p::errors::Result<()> {
//! let client = Client::new("merchant-secret-key");
//!
//! let mut bill = Bill::new();
//! bill.set_currency("RUB")
//!     .set_value(rust_decimal::Decimal::new(19990, 2))
//!     .set_comment("Order #42")
//!     .set_expiration_duration(chrono::Duration::hours(1))
//!     .set_custom_field("orderId", "42")
//!     .set_pay_sources_filter([PaySource::Card]);
//!
//! let created = client.create_bill(bill).await?;
//! println!("pay at {:?}", created.pay_url());
//!
//! let mut updates = client.start_webhook("/qiwi/webhook", 8080).await?;
//! while let Some(update) = updates.recv().await {
//!     println!("{} -> {}", update.bill.bill_id, update.bill.status.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod secret;
pub mod telemetry;
pub mod webhook;

pub use client::{Client, generate_bill_id};
pub use config::Config;
pub use errors::Error;
pub use models::{Amount, Bill, BillResponse, BillStatus, Customer, PaySource, PaymentUpdate, RequestError, Status};
pub use webhook::PaymentUpdates;
