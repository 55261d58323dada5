//! Axum handler for inbound payment notifications.
//!
//! Every POST is acknowledged with `200 {"error":"0"}` so the API stops retransmitting.
//! Trust is decided afterwards: only notifications whose signature matches are published.
//!
//! Verification and publishing run on a spawned task, but at most `queue_capacity` such
//! tasks exist at once. When the queue is full and every publisher slot is taken, the
//! handler waits for a slot before acknowledging, so a slow consumer holds back the HTTP
//! layer instead of piling up tasks.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::post,
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tracing::{debug, info, warn};

use crate::models::PaymentUpdate;
use crate::secret::SecretKey;
use crate::webhook::signing;

/// Header carrying the notification signature.
pub const SIGNATURE_HEADER: &str = "X-Api-Signature-SHA256";

/// Body of every acknowledgment.
pub const ACK_BODY: &str = r#"{"error":"0"}"#;

#[derive(Debug, Clone)]
pub(crate) struct WebhookState {
    secret_key: SecretKey,
    updates: mpsc::Sender<PaymentUpdate>,
    publishers: Arc<Semaphore>,
}

impl WebhookState {
    /// `capacity` bounds both the queue and the publishers waiting to enter it.
    pub(crate) fn new(secret_key: SecretKey, capacity: usize) -> (Self, mpsc::Receiver<PaymentUpdate>) {
        let capacity = capacity.max(1);
        let (updates, rx) = mpsc::channel(capacity);
        let state = Self {
            secret_key,
            updates,
            publishers: Arc::new(Semaphore::new(capacity)),
        };
        (state, rx)
    }
}

pub(crate) fn router(path: &str, state: WebhookState) -> Router {
    Router::new().route(path, post(receive)).with_state(state)
}

fn acknowledge() -> impl IntoResponse {
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], ACK_BODY)
}

#[tracing::instrument(skip_all)]
async fn receive(State(state): State<WebhookState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let update = match serde_json::from_slice::<PaymentUpdate>(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, body = %String::from_utf8_lossy(&body), "Dropping malformed payment notification");
            return acknowledge();
        }
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    // The semaphore is never closed.
    let Ok(permit) = state.publishers.clone().acquire_owned().await else {
        return acknowledge();
    };
    tokio::spawn(verify_and_publish(state, update, signature, permit));

    acknowledge()
}

async fn verify_and_publish(
    state: WebhookState,
    update: PaymentUpdate,
    signature: Option<String>,
    _permit: OwnedSemaphorePermit,
) {
    let bill_id = update.bill.bill_id.clone();

    let Some(signature) = signature else {
        warn!(%bill_id, "Dropping payment notification without signature header");
        return;
    };

    let secret_key = state.secret_key.load();
    if !signing::verify_signature(&update.bill, &signature, &secret_key) {
        warn!(%bill_id, "Dropping payment notification with invalid signature");
        return;
    }

    info!(
        %bill_id,
        status = %update.bill.status.value,
        amount = %update.bill.amount.value,
        currency = %update.bill.amount.currency,
        "Accepted payment notification"
    );

    // Holds the publisher slot until the update is queued.
    if state.updates.send(update).await.is_err() {
        debug!(%bill_id, "Payment updates consumer is gone, discarding notification");
    }
}
