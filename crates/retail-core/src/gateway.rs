//! # Mobile-Money Callback Payload
//!
//! Shapes of the asynchronous STK-push result the gateway POSTs back, and the
//! normalised [`PaymentNotification`] the reconciliation processor consumes.
//!
//! ## Payload
//! ```text
//! {
//!   "Body": {
//!     "stkCallback": {
//!       "MerchantRequestID": "29115-34620561-1",
//!       "CheckoutRequestID": "ws_CO_191220191020363925",
//!       "ResultCode": 0,
//!       "ResultDesc": "The service request is processed successfully.",
//!       "CallbackMetadata": {
//!         "Item": [
//!           { "Name": "Amount", "Value": 1.00 },
//!           { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
//!           { "Name": "PhoneNumber", "Value": 254708374149 }
//!         ]
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! `CallbackMetadata` is absent on failures, and `Value` may be a string or
//! a number depending on the item.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "int_or_string")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

/// Acknowledgement body returned to the gateway for every callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        CallbackAck {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

/// Some gateway builds send `"ResultCode": "0"`.
fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("ResultCode is not an integer")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom("ResultCode is not an integer")),
        _ => Err(serde::de::Error::custom("ResultCode must be a number or string")),
    }
}

impl StkCallback {
    /// Looks up a metadata item by name.
    pub fn metadata_value(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)
            .and_then(|item| item.value.as_ref())
    }
}

/// Renders a metadata value as text. Numbers are written without a
/// fractional part, so a receipt delivered as `1234567890.0` becomes
/// `"1234567890"`.
pub fn metadata_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64().map(|f| format!("{:.0}", f))
            }
        }
        _ => None,
    }
}

// =============================================================================
// Normalised Notification
// =============================================================================

/// A payment result stripped down to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    /// Idempotency key matching `Payment.checkout_request_id`.
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    /// Gateway receipt, present on success.
    pub receipt_number: Option<String>,
    /// Raw JSON as delivered, stored for audit.
    pub raw: String,
}

impl PaymentNotification {
    pub fn from_callback(envelope: &StkCallbackEnvelope, raw: impl Into<String>) -> Self {
        let cb = &envelope.body.stk_callback;
        PaymentNotification {
            checkout_request_id: cb.checkout_request_id.clone(),
            merchant_request_id: cb.merchant_request_id.clone(),
            result_code: cb.result_code,
            result_desc: cb.result_desc.clone(),
            receipt_number: cb.metadata_value("MpesaReceiptNumber").and_then(metadata_text),
            raw: raw.into(),
        }
    }

    /// Result code 0 is the gateway's only success code.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS: &str = r#"{
        "Body": {"stkCallback": {
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": {"Item": [
                {"Name": "Amount", "Value": 1.00},
                {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                {"Name": "Balance"},
                {"Name": "PhoneNumber", "Value": 254708374149}
            ]}
        }}
    }"#;

    #[test]
    fn test_success_callback_extracts_receipt() {
        let envelope: StkCallbackEnvelope = serde_json::from_str(SUCCESS).unwrap();
        let n = PaymentNotification::from_callback(&envelope, SUCCESS);

        assert!(n.is_success());
        assert_eq!(n.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(n.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(n.raw, SUCCESS);
    }

    #[test]
    fn test_numeric_receipt_is_formatted_without_fraction() {
        let body = r#"{"Body":{"stkCallback":{
            "CheckoutRequestID":"ws_1","ResultCode":"0","ResultDesc":"ok",
            "CallbackMetadata":{"Item":[{"Name":"MpesaReceiptNumber","Value":1234567890.0}]}
        }}}"#;
        let envelope: StkCallbackEnvelope = serde_json::from_str(body).unwrap();
        let n = PaymentNotification::from_callback(&envelope, body);

        assert_eq!(n.result_code, 0);
        assert_eq!(n.receipt_number.as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_failure_callback_has_no_metadata() {
        let body = r#"{"Body":{"stkCallback":{
            "MerchantRequestID":"m","CheckoutRequestID":"ws_2",
            "ResultCode":1032,"ResultDesc":"Request cancelled by user"
        }}}"#;
        let envelope: StkCallbackEnvelope = serde_json::from_str(body).unwrap();
        let n = PaymentNotification::from_callback(&envelope, body);

        assert!(!n.is_success());
        assert_eq!(n.receipt_number, None);
    }

    #[test]
    fn test_ack_shape() {
        let json = serde_json::to_value(CallbackAck::accepted()).unwrap();
        assert_eq!(json, serde_json::json!({"ResultCode": 0, "ResultDesc": "Accepted"}));
    }
}
