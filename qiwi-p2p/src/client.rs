//! HTTP client for the bill endpoints.
//!
//! Every call is authenticated with `Authorization: Bearer {secret key}` and sent as
//! `application/json`. Responses go through two steps:
//!
//! 1. [`check_status`] maps the HTTP status to a synthetic [`RequestError`] for anything but 200.
//! 2. [`interpret`] decodes the body, preferring an error record whenever `errorCode` is set.
//!
//! Transport failures are returned as [`Error::Transport`] and never retried here.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use rand::prelude::RngExt;
use rand::rng;
use tracing::{Span, debug, instrument};
use url::Url;

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::models::{Bill, BillResponse, RequestError, codes};
use crate::secret::SecretKey;

/// Production API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.qiwi.com/partner/bill/v1/";

/// Client for the bill API.
///
/// Cloning is cheap and clones share the secret key, see [`Client::set_secret_key`].
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    pub(crate) secret_key: SecretKey,
}

impl Client {
    /// Client against the production API.
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: http_client(),
            base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default API base URL is valid"),
            secret_key: SecretKey::new(secret_key),
        }
    }

    /// Client against another API root, e.g. a staging environment or a mock server.
    pub fn with_base_url(secret_key: impl Into<String>, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            http: http_client(),
            base_url,
            secret_key: SecretKey::new(secret_key),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let secret_key = config.secret_key.clone().filter(|key| !key.is_empty()).ok_or(Error::MissingSecretKey)?;
        Self::with_base_url(secret_key, config.api_base_url.clone())
    }

    /// Use a preconfigured HTTP client, e.g. one with a request timeout.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Replace the secret key. Takes effect for the next request and for webhook verification.
    pub fn set_secret_key(&self, secret_key: impl Into<String>) -> &Self {
        self.secret_key.rotate(secret_key);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a bill under a freshly generated id.
    #[instrument(skip_all, fields(bill_id = tracing::field::Empty))]
    pub async fn create_bill(&self, bill: Bill) -> Result<BillResponse> {
        let bill_id = generate_bill_id();
        Span::current().record("bill_id", bill_id.as_str());

        let body = bill.to_json().map_err(Error::Encode)?;
        self.execute(Method::PUT, &[&bill_id], Some(body)).await
    }

    #[instrument(skip(self))]
    pub async fn get_bill(&self, bill_id: &str) -> Result<BillResponse> {
        self.execute(Method::GET, &[bill_id], None).await
    }

    /// Cancel an unpaid bill.
    #[instrument(skip(self))]
    pub async fn reject_bill(&self, bill_id: &str) -> Result<BillResponse> {
        self.execute(Method::POST, &[bill_id, "reject"], Some(String::new())).await
    }

    async fn execute(&self, method: Method, segments: &[&str], body: Option<String>) -> Result<BillResponse> {
        let url = self.endpoint(segments)?;
        let secret_key = self.secret_key.load();

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", secret_key))
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            debug!(%body, "Request body");
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%method, %url, status = status.as_u16(), %body, "API response");

        check_status(status)?;
        interpret(&body)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("bills")
            .extend(segments);
        Ok(url)
    }
}

pub(crate) fn http_client() -> reqwest::Client {
    // Already installed by the binary or another client; either way a provider is in place.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    reqwest::Client::new()
}

/// Map a response status to the error reported to callers. Only 200 proceeds to body parsing.
pub fn check_status(status: StatusCode) -> Result<()> {
    let error = match status.as_u16() {
        200 => return Ok(()),
        400 => RequestError::synthetic(codes::BAD_REQUEST, "Bad request. Maybe you have bad expire time?"),
        401 => RequestError::synthetic(codes::BAD_TOKEN, "Bad token"),
        404 => RequestError::synthetic(codes::BAD_ID, "No such bill found"),
        code => RequestError::synthetic(codes::http_error(code), format!("HTTP Error {code}")),
    };
    Err(Error::Vendor(error))
}

/// Decode a response body as either an error record or a bill.
///
/// A body whose `errorCode` is non-empty is an error even if it also looks like a bill.
pub fn interpret(body: &str) -> Result<BillResponse> {
    if let Ok(error) = serde_json::from_str::<RequestError>(body)
        && !error.error_code.is_empty()
    {
        return Err(Error::Vendor(error));
    }

    serde_json::from_str(body).map_err(|source| Error::Parse {
        source,
        body: body.to_string(),
    })
}

/// Random bill id shaped like a UUID: 16 random bytes as uppercase hex in groups of
/// 4, 2, 2, 2 and 6 bytes. Version and variant bits are not set.
pub fn generate_bill_id() -> String {
    let mut bytes = [0u8; 16];
    rng().fill(&mut bytes);

    format!(
        "{}-{}-{}-{}-{}",
        hex::encode_upper(&bytes[0..4]),
        hex::encode_upper(&bytes[4..6]),
        hex::encode_upper(&bytes[6..8]),
        hex::encode_upper(&bytes[8..10]),
        hex::encode_upper(&bytes[10..16]),
    )
}
