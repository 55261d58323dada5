//! Inbound payment notifications.
//!
//! [`Client::start_webhook`] binds an HTTP listener that accepts POSTed notifications,
//! acknowledges each one immediately, verifies its HMAC signature against the client's
//! current secret key and publishes verified updates on a bounded queue. The returned
//! [`PaymentUpdates`] handle is the consuming end of that queue; dropping it stops the
//! listener.
//!
//! ```no_run
//! # async fn run() -> qiwi_p2p::errors::Result<()> {
//! let client = qiwi_p2p::Client::new("secret");
//! let mut updates = client.start_webhook("/qiwi/webhook", 8080).await?;
//! while let Some(update) = updates.recv().await {
//!     println!("{} is now {}", update.bill.bill_id, update.bill.status.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod signing;

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{error, info};

use crate::client::Client;
use crate::config::WebhookConfig;
use crate::errors::{Error, Result};
use crate::models::PaymentUpdate;

pub use handler::{ACK_BODY, SIGNATURE_HEADER};

/// Number of verified updates buffered before publishers, and then the listener, wait for the consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Consuming end of a running webhook listener.
///
/// Yields verified notifications in the order they were published. Dropping the handle
/// cancels the listener; [`PaymentUpdates::shutdown`] also waits for it to finish.
pub struct PaymentUpdates {
    updates: mpsc::Receiver<PaymentUpdate>,
    local_addr: SocketAddr,
    server: JoinHandle<()>,
    shutdown_guard: DropGuard,
}

impl PaymentUpdates {
    /// Next verified update, or `None` once the listener has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<PaymentUpdate> {
        self.updates.recv().await
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting notifications and wait for in-flight requests to complete.
    pub async fn shutdown(self) {
        let PaymentUpdates {
            server, shutdown_guard, ..
        } = self;
        drop(shutdown_guard);
        let _ = server.await;
    }
}

impl Stream for PaymentUpdates {
    type Item = PaymentUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.updates.poll_recv(cx)
    }
}

impl std::fmt::Debug for PaymentUpdates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentUpdates").field("local_addr", &self.local_addr).finish_non_exhaustive()
    }
}

impl Client {
    /// Listen for notifications on `0.0.0.0:{port}` at `path`.
    pub async fn start_webhook(&self, path: &str, port: u16) -> Result<PaymentUpdates> {
        let listener = bind(&format!("0.0.0.0:{port}")).await?;
        self.start_webhook_on(listener, path, DEFAULT_QUEUE_CAPACITY)
    }

    /// Listen for notifications using the host, port, path and queue capacity from `config`.
    pub async fn start_webhook_with(&self, config: &WebhookConfig) -> Result<PaymentUpdates> {
        let listener = bind(&config.bind_address()).await?;
        self.start_webhook_on(listener, &config.path, config.queue_capacity)
    }

    /// Serve notifications on an already bound listener.
    pub fn start_webhook_on(&self, listener: TcpListener, path: &str, queue_capacity: usize) -> Result<PaymentUpdates> {
        validate_path(path)?;

        let local_addr = listener.local_addr().map_err(|source| Error::Bind {
            addr: "listener".to_string(),
            source,
        })?;

        let (state, rx) = handler::WebhookState::new(self.secret_key.clone(), queue_capacity);
        let router = handler::router(path, state);

        let token = CancellationToken::new();
        let shutdown = token.clone();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                error!(error = %e, "Webhook listener failed");
            }
            info!("Webhook listener stopped");
        });

        info!(%local_addr, path, "Listening for payment notifications");

        Ok(PaymentUpdates {
            updates: rx,
            local_addr,
            server,
            shutdown_guard: token.drop_guard(),
        })
    }
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| Error::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Paths are routed literally: absolute, with no `{param}`, `:param` or `*wildcard` segments.
pub(crate) fn validate_path(path: &str) -> Result<()> {
    let literal = path.starts_with('/')
        && !path.contains(['{', '}'])
        && path.split('/').all(|segment| !segment.starts_with([':', '*']));

    if literal {
        Ok(())
    } else {
        Err(Error::InvalidWebhookPath(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    fn signed_notification(secret_key: &str) -> (String, String) {
        let body = serde_json::json!({
            "bill": {
                "siteId": "123",
                "billId": "e2e",
                "amount": {"value": "1.00", "currency": "RUB"},
                "status": {"value": "PAID", "changedDateTime": "2030-02-18T13:48:04+03:00"},
                "customer": {},
                "customFields": {},
                "creationDateTime": "2030-02-18T13:47:21+03:00",
                "expirationDateTime": "2030-03-05T13:47:21+03:00"
            },
            "version": "1"
        });
        let signature = signing::sign("RUB|1.00|e2e|123|PAID", secret_key).unwrap();
        (body.to_string(), signature)
    }

    async fn local_listener() -> TcpListener {
        TcpListener::bind("127.0.0.1:0").await.unwrap()
    }

    #[test]
    fn test_validate_path() {
        for ok in ["/", "/qiwi/webhook", "/hooks/qiwi-p2p"] {
            assert!(validate_path(ok).is_ok(), "{ok}");
        }
        for bad in ["", "qiwi", "/hooks/{id}", "/hooks/:id", "/hooks/*rest"] {
            assert!(matches!(validate_path(bad), Err(Error::InvalidWebhookPath(_))), "{bad}");
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_end_to_end_delivery() {
        let client = Client::new("secret");
        let mut updates = client.start_webhook_on(local_listener().await, "/qiwi/webhook", 4).unwrap();
        let url = format!("http://{}/qiwi/webhook", updates.local_addr());

        let (body, signature) = signed_notification("secret");
        let response = crate::client::http_client()
            .post(&url)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), ACK_BODY);

        let update = timeout(Duration::from_secs(2), updates.next()).await.unwrap().unwrap();
        assert_eq!(update.bill.bill_id, "e2e");
        assert_eq!(update.bill.status.value, "PAID");

        updates.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_client_key_rotation_reaches_listener() {
        let client = Client::new("old");
        let mut updates = client.start_webhook_on(local_listener().await, "/hook", 4).unwrap();
        let url = format!("http://{}/hook", updates.local_addr());

        client.set_secret_key("new");

        let (body, signature) = signed_notification("new");
        crate::client::http_client()
            .post(&url)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .unwrap();

        let update = timeout(Duration::from_secs(2), updates.recv()).await.unwrap().unwrap();
        assert_eq!(update.bill.bill_id, "e2e");
    }

    #[test_log::test(tokio::test)]
    async fn test_unconsumed_updates_are_bounded() {
        let client = Client::new("secret");
        let mut updates = client.start_webhook_on(local_listener().await, "/hook", 1).unwrap();
        let url = format!("http://{}/hook", updates.local_addr());
        let http = crate::client::http_client();

        let (body, signature) = signed_notification("secret");
        let posts = (0..20).map(|_| {
            let request = http
                .post(&url)
                .header(SIGNATURE_HEADER, signature.clone())
                .body(body.clone())
                .send();
            timeout(Duration::from_millis(500), request)
        });
        let acked = futures::future::join_all(posts)
            .await
            .into_iter()
            .filter(|result| matches!(result, Ok(Ok(response)) if response.status() == reqwest::StatusCode::OK))
            .count();

        // One update in the queue and one publisher waiting for space.
        assert_eq!(acked, 2);

        let update = timeout(Duration::from_secs(1), updates.recv()).await.unwrap().unwrap();
        assert_eq!(update.bill.bill_id, "e2e");
    }

    #[test_log::test(tokio::test)]
    async fn test_shutdown_closes_listener() {
        let updates = Client::new("secret")
            .start_webhook_on(local_listener().await, "/hook", 4)
            .unwrap();
        let addr = updates.local_addr();
        updates.shutdown().await;

        let result = crate::client::http_client()
            .post(format!("http://{addr}/hook"))
            .body("{}")
            .timeout(Duration::from_secs(1))
            .send()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let taken = local_listener().await;
        let port = taken.local_addr().unwrap().port();

        let client = Client::new("secret");
        let config = WebhookConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };

        match client.start_webhook_with(&config).await {
            Err(Error::Bind { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected_before_serving() {
        let client = Client::new("secret");
        let result = client.start_webhook_on(local_listener().await, "qiwi", 4);
        assert!(matches!(result, Err(Error::InvalidWebhookPath(_))));
    }
}
