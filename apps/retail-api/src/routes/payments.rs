//! M-Pesa payment routes.
//!
//! ```text
//! POST /payments/mpesa/initiate  ──► STK push ──► payment.checkoutRequestId
//!                                                       │
//!          customer enters PIN on phone                 │
//!                                                       ▼
//! POST /payments/mpesa/callback  ──► PaymentReconciler (keyed by checkout id)
//! ```

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use retail_core::gateway::{CallbackAck, PaymentNotification, StkCallbackEnvelope};
use retail_core::validation::normalize_phone;
use retail_core::{Money, OrderStatus, Payment, PaymentStatus};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::mpesa::StkPush;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/mpesa/initiate", post(initiate))
        .route("/payments/{order_id}/status", get(status))
}

/// Called by the gateway; carries no user token.
pub fn callback_router() -> Router<AppState> {
    Router::new().route("/payments/mpesa/callback", post(callback))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub order_id: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub order_id: String,
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
    pub payment: Payment,
}

/// POST /payments/mpesa/initiate - owner only.
async fn initiate(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<InitiateRequest>,
) -> ApiResult<Json<InitiateResponse>> {
    let order = state
        .db
        .orders()
        .get_by_id(&req.order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", &req.order_id))?;
    if order.user_id != user.id {
        return Err(ApiError::forbidden());
    }

    let payment = state
        .db
        .payments()
        .get_by_order(&order.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment", &order.id))?;
    match payment.status {
        PaymentStatus::Completed => {
            return Err(ApiError::conflict("Payment already completed"));
        }
        PaymentStatus::Failed => {
            return Err(ApiError::conflict("Payment already failed"));
        }
        PaymentStatus::Pending => {}
    }
    if order.order_status != OrderStatus::Processing {
        return Err(ApiError::conflict(format!("Order is already {}", order.order_status)));
    }

    let phone = normalize_phone(&req.phone)?;
    let Some(client) = state.mpesa.as_ref() else {
        return Err(ApiError::new(
            ErrorCode::PaymentGatewayError,
            "M-Pesa is not configured",
        ));
    };

    let accepted = client
        .stk_push(&StkPush {
            phone: phone.clone(),
            amount: Money::from_cents(order.total_cents).major_rounded_up(),
            account_reference: format!("ORDER_{}", order.id),
        })
        .await?;

    let payment = state
        .db
        .payments()
        .attach_checkout(&order.id, &phone, &accepted.checkout_request_id)
        .await?;

    info!(
        order_id = %order.id,
        checkout_request_id = %accepted.checkout_request_id,
        "Payment initiated"
    );

    Ok(Json(InitiateResponse {
        order_id: order.id,
        checkout_request_id: accepted.checkout_request_id,
        merchant_request_id: accepted.merchant_request_id,
        customer_message: accepted.customer_message,
        payment,
    }))
}

/// POST /payments/mpesa/callback - always acknowledged.
///
/// Takes raw bytes: a `String` or `Json` extractor would answer 400/415 on
/// its own before the acknowledgement could be sent.
async fn callback(State(state): State<AppState>, body: Bytes) -> Json<CallbackAck> {
    let envelope: StkCallbackEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Unreadable M-Pesa callback");
            return Json(CallbackAck::accepted());
        }
    };

    let raw = String::from_utf8_lossy(&body).into_owned();
    let notification = PaymentNotification::from_callback(&envelope, raw);
    match state.db.payment_reconciler().reconcile(&notification).await {
        Ok(outcome) => {
            info!(
                checkout_request_id = %notification.checkout_request_id,
                outcome = ?outcome,
                "M-Pesa callback handled"
            );
        }
        Err(e) => {
            error!(
                checkout_request_id = %notification.checkout_request_id,
                error = %e,
                "M-Pesa callback could not be applied"
            );
        }
    }

    Json(CallbackAck::accepted())
}

/// GET /payments/{orderId}/status - owner or admin.
async fn status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Payment>> {
    let order = state
        .db
        .orders()
        .get_by_id(&order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order", &order_id))?;
    if !user.can_access(&order.user_id) {
        return Err(ApiError::forbidden());
    }

    let payment = state
        .db
        .payments()
        .get_by_order(&order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment", &order_id))?;
    Ok(Json(payment))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::routes::test_support::TestApp;

    async fn placed_order(app: &TestApp) -> String {
        app.stock(&app.branch.id, &app.coke.id, 10).await;
        let (_, order) = app
            .post(
                "/api/v1/orders",
                Some(&app.customer_token),
                json!({
                    "branchId": app.branch.id,
                    "phone": "0712345678",
                    "items": [{ "productId": app.coke.id, "quantity": 2 }]
                }),
            )
            .await;
        order["id"].as_str().unwrap().to_string()
    }

    fn callback_body(checkout: &str, result_code: i64) -> Value {
        let mut callback = json!({
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": checkout,
            "ResultCode": result_code,
            "ResultDesc": "The service request is processed successfully."
        });
        if result_code == 0 {
            callback["CallbackMetadata"] = json!({
                "Item": [
                    { "Name": "Amount", "Value": 130.0 },
                    { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                    { "Name": "PhoneNumber", "Value": 254712345678u64 }
                ]
            });
        }
        json!({ "Body": { "stkCallback": callback } })
    }

    #[tokio::test]
    async fn test_initiate_without_gateway_config() {
        let app = TestApp::new().await;
        let order_id = placed_order(&app).await;

        let (status, body) = app
            .post(
                "/api/v1/payments/mpesa/initiate",
                Some(&app.customer_token),
                json!({ "orderId": order_id, "phone": "0712345678" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "PAYMENT_GATEWAY_ERROR");
    }

    #[tokio::test]
    async fn test_initiate_requires_owner() {
        let app = TestApp::new().await;
        let order_id = placed_order(&app).await;

        let (status, _) = app
            .post(
                "/api/v1/payments/mpesa/initiate",
                Some(&app.admin_token),
                json!({ "orderId": order_id, "phone": "0712345678" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_successful_callback_completes_order() {
        let app = TestApp::new().await;
        let order_id = placed_order(&app).await;
        app.state
            .db
            .payments()
            .attach_checkout(&order_id, "254712345678", "ws_CO_100")
            .await
            .unwrap();

        let (status, ack) = app
            .post("/api/v1/payments/mpesa/callback", None, callback_body("ws_CO_100", 0))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({ "ResultCode": 0, "ResultDesc": "Accepted" }));

        let (status, payment) = app
            .get(
                &format!("/api/v1/payments/{}/status", order_id),
                Some(&app.customer_token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payment["status"], "completed");
        assert_eq!(payment["transactionId"], "NLJ7RT61SV");

        let (_, order) = app
            .get(&format!("/api/v1/orders/{}", order_id), Some(&app.customer_token))
            .await;
        assert_eq!(order["orderStatus"], "completed");
        assert_eq!(order["mpesaTransactionId"], "NLJ7RT61SV");
    }

    #[tokio::test]
    async fn test_failed_callback_releases_stock() {
        let app = TestApp::new().await;
        let order_id = placed_order(&app).await;
        app.state
            .db
            .payments()
            .attach_checkout(&order_id, "254712345678", "ws_CO_200")
            .await
            .unwrap();
        assert_eq!(app.quantity(&app.branch.id, &app.coke.id).await, 8);

        let (status, _) = app
            .post("/api/v1/payments/mpesa/callback", None, callback_body("ws_CO_200", 1032))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, order) = app
            .get(&format!("/api/v1/orders/{}", order_id), Some(&app.customer_token))
            .await;
        assert_eq!(order["orderStatus"], "cancelled");
        assert_eq!(order["paymentStatus"], "failed");
        assert_eq!(app.quantity(&app.branch.id, &app.coke.id).await, 10);
    }

    #[tokio::test]
    async fn test_malformed_callback_is_acknowledged() {
        let app = TestApp::new().await;

        let (status, ack) = app
            .post("/api/v1/payments/mpesa/callback", None, json!({ "unexpected": true }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["ResultCode"], 0);
    }

    #[tokio::test]
    async fn test_undecodable_callback_bodies_are_acknowledged() {
        let app = TestApp::new().await;

        let mut invalid_utf8 = br#"{"Body":{"stkCallback":{"CheckoutRequestID":""#.to_vec();
        invalid_utf8.push(0xFF);
        invalid_utf8.extend_from_slice(br#""}}}"#);

        let bodies: Vec<(Option<&str>, Vec<u8>)> = vec![
            (Some("application/json"), b"not json at all".to_vec()),
            (Some("application/json"), invalid_utf8),
            (Some("text/plain"), Vec::new()),
            (None, b"{".to_vec()),
        ];

        for (content_type, body) in bodies {
            let (status, ack) = app
                .send_raw(Method::POST, "/api/v1/payments/mpesa/callback", content_type, body)
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ack["ResultCode"], 0);
        }
    }
}
