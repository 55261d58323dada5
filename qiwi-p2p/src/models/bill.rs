//! Outbound bill payload.
//!
//! A [`Bill`] is built with fluent setters and consumed by
//! [`Client::create_bill`](crate::Client::create_bill). No validation happens locally: negative
//! values or unknown currency codes are sent as-is and rejected by the API.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize, Serializer};

/// Timestamp layout accepted by the API: second precision with an explicit UTC offset.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

/// Lifetime of a freshly created bill.
pub const DEFAULT_EXPIRATION_HOURS: i64 = 3;

/// Custom field key holding the payment form theme.
pub const THEME_CODE_FIELD: &str = "themeCode";

/// Custom field key holding the allowed payment sources.
pub const PAY_SOURCES_FILTER_FIELD: &str = "paySourcesFilter";

/// A money amount. `value` always carries exactly two fraction digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub currency: String,
    pub value: String,
}

impl Amount {
    pub fn new(currency: impl Into<String>, value: impl Into<Decimal>) -> Self {
        Self {
            currency: currency.into(),
            value: format_value(value.into()),
        }
    }

    /// The value as a decimal, if it parses.
    pub fn decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.value).ok()
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self {
            currency: String::new(),
            value: format_value(Decimal::ZERO),
        }
    }
}

/// Render a value with two fraction digits, rounding half away from zero.
pub(crate) fn format_value(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Informational customer details. The API stores them but does not act on them.
///
/// Unset fields are left out of the JSON rather than sent as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// A payment method that can be offered on the payment form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaySource {
    QiwiWallet,
    Card,
}

impl PaySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaySource::QiwiWallet => "qw",
            PaySource::Card => "card",
        }
    }
}

impl fmt::Display for PaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "qw" => Ok(PaySource::QiwiWallet),
            "card" => Ok(PaySource::Card),
            other => Err(format!("unknown pay source '{other}', expected 'qw' or 'card'")),
        }
    }
}

/// A bill to be issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    amount: Amount,
    comment: String,
    #[serde(serialize_with = "serialize_date_time")]
    expiration_date_time: DateTime<Utc>,
    customer: Customer,
    custom_fields: BTreeMap<String, String>,
}

fn serialize_date_time<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(DATE_TIME_FORMAT))
}

impl Default for Bill {
    fn default() -> Self {
        Self {
            amount: Amount::default(),
            comment: String::new(),
            expiration_date_time: expires_in(Duration::hours(DEFAULT_EXPIRATION_HOURS)),
            customer: Customer::default(),
            custom_fields: BTreeMap::new(),
        }
    }
}

fn expires_in(duration: Duration) -> DateTime<Utc> {
    Utc::now().checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Bill {
    /// A zero-valued bill with no currency that expires three hours from now.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_currency(&mut self, currency: impl Into<String>) -> &mut Self {
        self.amount.currency = currency.into();
        self
    }

    pub fn set_value(&mut self, value: impl Into<Decimal>) -> &mut Self {
        self.amount.value = format_value(value.into());
        self
    }

    /// Comment shown to the customer on the payment form.
    pub fn set_comment(&mut self, comment: impl Into<String>) -> &mut Self {
        self.comment = comment.into();
        self
    }

    /// Moment after which the bill is rejected automatically.
    pub fn set_expiration_datetime(&mut self, expiration: DateTime<Utc>) -> &mut Self {
        self.expiration_date_time = expiration;
        self
    }

    /// Same field as [`Bill::set_expiration_datetime`], relative to now.
    pub fn set_expiration_duration(&mut self, duration: Duration) -> &mut Self {
        self.expiration_date_time = expires_in(duration);
        self
    }

    pub fn set_customer_phone(&mut self, phone: impl Into<String>) -> &mut Self {
        self.customer.phone = Some(phone.into());
        self
    }

    pub fn set_customer_email(&mut self, email: impl Into<String>) -> &mut Self {
        self.customer.email = Some(email.into());
        self
    }

    pub fn set_customer_account(&mut self, account: impl Into<String>) -> &mut Self {
        self.customer.account = Some(account.into());
        self
    }

    /// Free-form application data, e.g. an order id. Returned verbatim in responses and webhooks.
    pub fn set_custom_field(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.custom_fields.insert(field.into(), value.into());
        self
    }

    /// Payment form theme, configured in the merchant dashboard.
    pub fn set_theme_code(&mut self, theme: impl Into<String>) -> &mut Self {
        self.set_custom_field(THEME_CODE_FIELD, theme)
    }

    /// Restrict the payment methods offered. Order is kept, duplicates are dropped.
    pub fn set_pay_sources_filter(&mut self, sources: impl IntoIterator<Item = PaySource>) -> &mut Self {
        let mut seen = Vec::new();
        for source in sources {
            if !seen.contains(&source) {
                seen.push(source);
            }
        }
        let filter = seen.iter().map(PaySource::as_str).collect::<Vec<_>>().join(",");
        self.set_pay_sources_filter_raw(filter)
    }

    /// Set the filter string directly, e.g. `"qw,card"`.
    pub fn set_pay_sources_filter_raw(&mut self, filter: impl Into<String>) -> &mut Self {
        self.set_custom_field(PAY_SOURCES_FILTER_FIELD, filter)
    }

    pub fn amount(&self) -> &Amount {
        &self.amount
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn expiration_date_time(&self) -> DateTime<Utc> {
        self.expiration_date_time
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn custom_fields(&self) -> &BTreeMap<String, String> {
        &self.custom_fields
    }

    /// JSON body accepted by the create-bill endpoint.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Value;

    /// Matches `-?\d+\.\d{2}`
    fn is_two_digit_value(value: &str) -> bool {
        let unsigned = value.strip_prefix('-').unwrap_or(value);
        let Some((whole, fraction)) = unsigned.split_once('.') else {
            return false;
        };
        !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) && fraction.len() == 2 && fraction.chars().all(|c| c.is_ascii_digit())
    }

    fn json_of(bill: &Bill) -> Value {
        serde_json::from_str(&bill.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_new_bill_defaults() {
        let bill = Bill::new();
        let json = json_of(&bill);

        assert_eq!(json["amount"]["value"], "0.00");
        assert_eq!(json["amount"]["currency"], "");
        assert_eq!(json["comment"], "");
        assert_eq!(json["customFields"], serde_json::json!({}));
        assert_eq!(json["customer"], serde_json::json!({}));

        let expected = Utc::now() + Duration::hours(3);
        let drift = (bill.expiration_date_time() - expected).num_seconds().abs();
        assert!(drift <= 2, "default expiry should be three hours out, drift was {drift}s");
    }

    #[test]
    fn test_serialized_field_set() {
        let mut bill = Bill::new();
        bill.set_currency("RUB").set_value(100).set_comment("Order 42");

        let json = json_of(&bill);
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();

        assert_eq!(keys, vec!["amount", "comment", "customFields", "customer", "expirationDateTime"]);
    }

    #[test]
    fn test_value_always_has_two_fraction_digits() {
        let cases = [
            (Decimal::from(100), "100.00"),
            (Decimal::new(105, 1), "10.50"),
            (Decimal::new(10005, 3), "10.01"),
            (Decimal::new(12345678, 4), "1234.57"),
            (Decimal::new(-15, 1), "-1.50"),
            (Decimal::new(1, 3), "0.00"),
            (Decimal::ZERO, "0.00"),
        ];

        for (input, expected) in cases {
            let mut bill = Bill::new();
            bill.set_value(input);
            assert_eq!(bill.amount().value, expected, "input {input}");

            let json = json_of(&bill);
            let rendered = json["amount"]["value"].as_str().unwrap();
            assert!(is_two_digit_value(rendered), "{rendered} does not have two fraction digits");
        }
    }

    #[test]
    fn test_expiration_datetime_format() {
        let moment = Utc.with_ymd_and_hms(2030, 1, 2, 15, 4, 5).unwrap();
        let mut bill = Bill::new();
        bill.set_expiration_datetime(moment);

        let json = json_of(&bill);
        assert_eq!(json["expirationDateTime"], "2030-01-02T15:04:05+00:00");
    }

    #[test]
    fn test_expiration_duration_is_relative_to_now() {
        let mut bill = Bill::new();
        bill.set_expiration_duration(Duration::minutes(45));

        let json = json_of(&bill);
        let stored = DateTime::parse_from_rfc3339(json["expirationDateTime"].as_str().unwrap()).unwrap();

        let expected = Utc::now() + Duration::minutes(45);
        let drift = (stored.with_timezone(&Utc) - expected).num_seconds().abs();
        assert!(drift <= 2, "expiry drifted by {drift}s");
    }

    #[test]
    fn test_expiration_setters_overwrite_each_other() {
        let moment = Utc.with_ymd_and_hms(2031, 6, 1, 0, 0, 0).unwrap();
        let mut bill = Bill::new();
        bill.set_expiration_duration(Duration::days(2)).set_expiration_datetime(moment);
        assert_eq!(bill.expiration_date_time(), moment);
    }

    #[test]
    fn test_customer_fields() {
        let mut bill = Bill::new();
        bill.set_customer_phone("79001234567")
            .set_customer_email("buyer@example.com")
            .set_customer_account("user-7");

        let json = json_of(&bill);
        assert_eq!(
            json["customer"],
            serde_json::json!({"phone": "79001234567", "email": "buyer@example.com", "account": "user-7"})
        );
    }

    #[test]
    fn test_unset_customer_fields_are_omitted() {
        let mut bill = Bill::new();
        assert_eq!(json_of(&bill)["customer"], serde_json::json!({}));

        bill.set_customer_email("buyer@example.com");
        assert_eq!(json_of(&bill)["customer"], serde_json::json!({"email": "buyer@example.com"}));
    }

    #[test]
    fn test_theme_and_pay_sources_are_custom_fields() {
        let mut bill = Bill::new();
        bill.set_theme_code("Yvan-YKaSh")
            .set_pay_sources_filter([PaySource::QiwiWallet, PaySource::Card, PaySource::QiwiWallet])
            .set_custom_field("orderId", "42");

        let json = json_of(&bill);
        assert_eq!(
            json["customFields"],
            serde_json::json!({"themeCode": "Yvan-YKaSh", "paySourcesFilter": "qw,card", "orderId": "42"})
        );
        assert!(json.get("themeCode").is_none());
        assert!(json.get("paySourcesFilter").is_none());
    }

    #[test]
    fn test_raw_pay_sources_filter() {
        let mut bill = Bill::new();
        bill.set_pay_sources_filter_raw("card");
        assert_eq!(bill.custom_fields().get(PAY_SOURCES_FILTER_FIELD).map(String::as_str), Some("card"));
    }

    #[test]
    fn test_no_local_validation() {
        let mut bill = Bill::new();
        bill.set_currency("not-a-currency").set_value(-500);

        let json = json_of(&bill);
        assert_eq!(json["amount"], serde_json::json!({"currency": "not-a-currency", "value": "-500.00"}));
    }

    #[test]
    fn test_pay_source_parsing() {
        assert_eq!("qw".parse::<PaySource>(), Ok(PaySource::QiwiWallet));
        assert_eq!(" card ".parse::<PaySource>(), Ok(PaySource::Card));
        assert!("cash".parse::<PaySource>().is_err());
        assert_eq!(PaySource::Card.to_string(), "card");
    }

    #[test]
    fn test_amount_decimal() {
        let amount = Amount::new("KZT", Decimal::new(25, 1));
        assert_eq!(amount.value, "2.50");
        assert_eq!(amount.decimal(), Some(Decimal::new(250, 2)));
    }
}
