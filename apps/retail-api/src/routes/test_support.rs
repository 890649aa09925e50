//! In-process router harness for handler tests.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use retail_core::{Branch, Product, Role, User};
use retail_db::repository::branch::NewBranch;
use retail_db::repository::product::NewProduct;
use retail_db::repository::stock::StockAdjustment;
use retail_db::{Database, DbConfig};
use serde_json::Value;
use tower::ServiceExt;

use crate::config::ApiConfig;
use crate::state::AppState;

/// Router over a fresh in-memory database with an HQ, one branch, one
/// product, an admin and a customer. Tokens are minted directly.
pub(crate) struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub hq: Branch,
    pub branch: Branch,
    pub coke: Product,
    pub admin: User,
    pub customer: User,
    pub admin_token: String,
    pub customer_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let state = AppState::new(db, ApiConfig::default()).unwrap();

        let hq = state
            .db
            .branches()
            .create(&NewBranch {
                name: "Nairobi HQ".to_string(),
                location: "Nairobi CBD".to_string(),
                is_headquarters: true,
            })
            .await
            .unwrap();
        let branch = state
            .db
            .branches()
            .create(&NewBranch {
                name: "Mombasa".to_string(),
                location: "Moi Avenue".to_string(),
                is_headquarters: false,
            })
            .await
            .unwrap();
        let coke = state
            .db
            .products()
            .create(&NewProduct {
                name: "Coke 500ml".to_string(),
                brand: "Coke".to_string(),
                description: None,
                price_cents: 6_500,
            })
            .await
            .unwrap();

        let admin = state
            .db
            .users()
            .create("Admin", "admin@example.com", "$argon2id$placeholder", Role::Admin)
            .await
            .unwrap();
        let customer = state
            .db
            .users()
            .create("Akinyi", "akinyi@example.com", "$argon2id$placeholder", Role::Customer)
            .await
            .unwrap();

        let admin_token = state.jwt.generate(&admin).unwrap();
        let customer_token = state.jwt.generate(&customer).unwrap();
        let router = crate::build_router(state.clone());

        TestApp {
            router,
            state,
            hq,
            branch,
            coke,
            admin,
            customer,
            admin_token,
            customer_token,
        }
    }

    pub async fn stock(&self, branch_id: &str, product_id: &str, quantity: i64) {
        self.state
            .db
            .stock()
            .adjust(
                &StockAdjustment {
                    branch_id: branch_id.to_string(),
                    product_id: product_id.to_string(),
                    quantity,
                    reason: "test setup".to_string(),
                },
                &self.admin.id,
            )
            .await
            .unwrap();
    }

    pub async fn quantity(&self, branch_id: &str, product_id: &str) -> i64 {
        self.state
            .db
            .stock()
            .get(branch_id, product_id)
            .await
            .unwrap()
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    /// Sends bytes as-is, for bodies that are not valid JSON.
    pub async fn send_raw(
        &self,
        method: Method,
        path: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        self.dispatch(builder.body(Body::from(body)).unwrap()).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, token, None).await
    }
}
