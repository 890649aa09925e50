//! # M-Pesa Daraja Client
//!
//! Starts Lipa Na M-Pesa Online (STK push) payments. The result arrives
//! later on the callback route and is applied by the payment reconciler.
//!
//! ```text
//! initiate ──► GET  /oauth/v1/generate            (basic auth) ──► access_token
//!          └─► POST /mpesa/stkpush/v1/processrequest (bearer)  ──► CheckoutRequestID
//! ```
//!
//! A fresh OAuth token is requested for every push; there is no retry.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const TRANSACTION_DESC: &str = "Payment for Smart Retail System";

/// Gateway credentials, built by `ApiConfig::mpesa`.
#[derive(Debug, Clone)]
pub struct MpesaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MpesaError {
    #[error("M-Pesa request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("M-Pesa returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("M-Pesa rejected the request ({code}): {description}")]
    Rejected { code: String, description: String },

    #[error("M-Pesa response missing {0}")]
    MissingField(&'static str),
}

/// One STK push request.
#[derive(Debug, Clone)]
pub struct StkPush {
    /// Normalised `2547XXXXXXXX` number.
    pub phone: String,
    /// Whole currency units.
    pub amount: i64,
    pub account_reference: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: String,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'static str,
}

/// Gateway answer to an accepted push.
#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// `%Y%m%d%H%M%S`, the only timestamp format the gateway accepts.
pub fn gateway_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// `base64(shortcode + passkey + timestamp)`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

pub struct MpesaClient {
    http: reqwest::Client,
    config: MpesaConfig,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Result<Self, MpesaError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(MpesaClient { http, config })
    }

    async fn access_token(&self) -> Result<String, MpesaError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let resp = self
            .http
            .get(url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MpesaError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = resp.json().await?;
        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(MpesaError::MissingField("access_token"))
    }

    /// Sends the push prompt to the customer's phone.
    pub async fn stk_push(&self, push: &StkPush) -> Result<StkPushResponse, MpesaError> {
        let token = self.access_token().await?;
        let timestamp = gateway_timestamp(Utc::now());

        let body = StkPushBody {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: push.amount.to_string(),
            party_a: &push.phone,
            party_b: &self.config.shortcode,
            phone_number: &push.phone,
            callback_url: &self.config.callback_url,
            account_reference: &push.account_reference,
            transaction_desc: TRANSACTION_DESC,
        };

        debug!(
            account_reference = %push.account_reference,
            amount = push.amount,
            "Sending STK push"
        );

        let resp = self
            .http
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MpesaError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let parsed: StkPushResponse = resp.json().await?;
        if !parsed.response_code.is_empty() && parsed.response_code != "0" {
            return Err(MpesaError::Rejected {
                code: parsed.response_code,
                description: parsed.response_description,
            });
        }
        if parsed.checkout_request_id.is_empty() {
            return Err(MpesaError::MissingField("CheckoutRequestID"));
        }

        info!(
            checkout_request_id = %parsed.checkout_request_id,
            account_reference = %push.account_reference,
            "STK push accepted"
        );

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(gateway_timestamp(at), "20240307090501");
    }

    #[test]
    fn test_password() {
        let password = stk_password("174379", "passkey", "20240307090501");
        let decoded = STANDARD.decode(password).unwrap();
        assert_eq!(decoded, b"174379passkey20240307090501");
    }

    #[test]
    fn test_push_body_field_names() {
        let body = StkPushBody {
            business_short_code: "174379",
            password: "cGFzcw==".to_string(),
            timestamp: "20240307090501".to_string(),
            transaction_type: "CustomerPayBillOnline",
            amount: "130".to_string(),
            party_a: "254712345678",
            party_b: "174379",
            phone_number: "254712345678",
            callback_url: "https://example.com/api/v1/payments/mpesa/callback",
            account_reference: "ORDER_1",
            transaction_desc: TRANSACTION_DESC,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["PartyA"], "254712345678");
        assert_eq!(json["CallBackURL"], "https://example.com/api/v1/payments/mpesa/callback");
        assert_eq!(json["Amount"], "130");
        assert_eq!(json["TransactionDesc"], TRANSACTION_DESC);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResponseCode": "0",
            "ResponseDescription": "Success. Request accepted for processing",
            "CustomerMessage": "Success. Request accepted for processing"
        }"#;
        let parsed: StkPushResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(parsed.response_code, "0");
    }
}
