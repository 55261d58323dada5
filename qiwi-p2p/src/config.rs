//! Configuration for the `qiwi-p2p` binary.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be changed with the `-f` flag or the `QIWI_CONFIG`
//! environment variable.
//!
//! Sources are merged in order, later ones overriding earlier ones:
//!
//! 1. **YAML config file** (default: `config.yaml`)
//! 2. **Environment variables** prefixed with `QIWI_`
//!
//! Nested values use double underscores, e.g. `QIWI_WEBHOOK__PORT=9000` sets `webhook.port`.
//!
//! ```bash
//! QIWI_SECRET_KEY=eyJ2ZXJzaW9uIjoi...
//! QIWI_API_BASE_URL=https://api.qiwi.com/partner/bill/v1/
//! QIWI_WEBHOOK__PATH=/payments/qiwi
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::DEFAULT_API_BASE_URL;
use crate::models::{Bill, PaySource};
use crate::webhook::{self, DEFAULT_QUEUE_CAPACITY};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "QIWI_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without running a command.
    #[arg(long)]
    pub validate: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Receive payment notifications and log every verified update
    Webhook,

    /// Issue a new bill and print the API response
    Create(CreateArgs),

    /// Print the current state of a bill
    Get { bill_id: String },

    /// Cancel an unpaid bill and print the API response
    Reject { bill_id: String },
}

#[derive(clap::Args, Debug, Clone)]
pub struct CreateArgs {
    /// Amount to charge, rounded to two decimal places
    #[arg(long)]
    pub value: Decimal,

    #[arg(long, default_value = "RUB")]
    pub currency: String,

    #[arg(long)]
    pub comment: Option<String>,

    /// How long the bill stays payable, e.g. `30m` or `2days`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub expires_in: Option<Duration>,

    #[arg(long)]
    pub theme_code: Option<String>,

    /// Allowed payment methods, e.g. `qw,card`
    #[arg(long, value_delimiter = ',')]
    pub pay_sources: Vec<PaySource>,

    #[arg(long)]
    pub customer_phone: Option<String>,

    #[arg(long)]
    pub customer_email: Option<String>,

    #[arg(long)]
    pub customer_account: Option<String>,

    /// Extra custom field, repeatable
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub fields: Vec<(String, String)>,
}

impl CreateArgs {
    /// Bill described by these arguments. Fails only for an expiry too large to represent.
    pub fn to_bill(&self) -> Result<Bill, chrono::OutOfRangeError> {
        let mut bill = Bill::new();
        bill.set_currency(&self.currency).set_value(self.value);

        if let Some(comment) = &self.comment {
            bill.set_comment(comment);
        }
        if let Some(expires_in) = self.expires_in {
            bill.set_expiration_duration(chrono::Duration::from_std(expires_in)?);
        }
        if let Some(phone) = &self.customer_phone {
            bill.set_customer_phone(phone);
        }
        if let Some(email) = &self.customer_email {
            bill.set_customer_email(email);
        }
        if let Some(account) = &self.customer_account {
            bill.set_customer_account(account);
        }
        for (key, value) in &self.fields {
            bill.set_custom_field(key, value);
        }
        if let Some(theme_code) = &self.theme_code {
            bill.set_theme_code(theme_code);
        }
        if !self.pay_sources.is_empty() {
            bill.set_pay_sources_filter(self.pay_sources.iter().copied());
        }
        Ok(bill)
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Merchant secret key, used as the bearer token and as the webhook HMAC key
    pub secret_key: Option<String>,
    /// API root that `bills/{id}` is resolved against
    pub api_base_url: Url,
    pub webhook: WebhookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default API base URL is valid"),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Webhook listener settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
    /// Route notifications are POSTed to
    pub path: String,
    /// Verified updates buffered before the listener waits for the consumer
    pub queue_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/qiwi/webhook".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl WebhookConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reasons a loaded configuration is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("secret_key is not configured. Set QIWI_SECRET_KEY or add secret_key to the config file")]
    MissingSecretKey,
    #[error("api_base_url {0} cannot be used as a base for bill endpoints")]
    InvalidBaseUrl(String),
    #[error("webhook.path {0:?} must be an absolute path without route parameters")]
    InvalidWebhookPath(String),
    #[error("webhook.queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingSecretKey);
        }
        if self.api_base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl(self.api_base_url.to_string()));
        }
        if webhook::validate_path(&self.webhook.path).is_err() {
            return Err(ConfigError::InvalidWebhookPath(self.webhook.path.clone()));
        }
        if self.webhook.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("QIWI_").ignore(&["config"]).split("__"))
    }
}
