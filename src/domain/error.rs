use {super::money::Currency, thiserror::Error, uuid::Uuid};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("account not found: {0}")]
    OwnerNotFound(Uuid),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("reference already credited: {0}")]
    AlreadyCredited(String),

    #[error("currency mismatch: account holds {account}, credit is in {credit}")]
    CurrencyMismatch { account: Currency, credit: Currency },

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Failure talking to the fulfillment provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("server error: HTTP {0}")]
    Server(u16),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Only transport-level failures and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout(_) | Self::Server(_)
        )
    }
}
