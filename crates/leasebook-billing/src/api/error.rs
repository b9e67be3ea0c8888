use crate::error::BillingError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error returned by HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Body could not be read as the expected JSON document
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest {
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Billing(BillingError::ValidationError { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Billing(BillingError::ContractNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Billing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Billing(BillingError::ContractNotFound { .. }) => {
                "contract not found".to_string()
            }
            ApiError::Billing(BillingError::ValidationError { message, .. }) => message.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}
