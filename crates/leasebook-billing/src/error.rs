use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Validation error on {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Contract not found: {id}")]
    ContractNotFound { id: String },

    #[error("Store error during {operation}: {source}")]
    StoreError {
        operation: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Contract {contract_id} already has an auto-generated receivable for {payment_month}")]
    DuplicateReceivable {
        contract_id: String,
        payment_month: String,
    },

    #[error("Recalculation of contract {contract_id} exceeded its deadline after {elapsed_ms} ms")]
    DeadlineExceeded { contract_id: String, elapsed_ms: u64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BillingError {
    pub fn store(operation: &str, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        BillingError::StoreError {
            operation: operation.to_string(),
            source: source.into(),
        }
    }

    /// Errors caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BillingError::ValidationError { .. } | BillingError::ContractNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
