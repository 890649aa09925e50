//! Shared handler state.

use std::sync::Arc;

use retail_db::Database;

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use crate::mpesa::{MpesaClient, MpesaError};

/// Cloned into every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
    /// `None` when gateway credentials are not configured.
    pub mpesa: Option<Arc<MpesaClient>>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Result<Self, MpesaError> {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_expiry_hours);
        let mpesa = match config.mpesa() {
            Some(settings) => Some(Arc::new(MpesaClient::new(settings)?)),
            None => None,
        };

        Ok(AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            mpesa,
        })
    }
}
