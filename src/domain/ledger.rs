use {
    super::error::PipelineError,
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Charge,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Charge => "charge",
            Self::Refund => "refund",
        }
    }

    /// Sign this kind contributes to the derived balance.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Deposit | Self::Refund => 1,
            Self::Charge => -1,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "charge" => Ok(Self::Charge),
            "refund" => Ok(Self::Refund),
            other => Err(PipelineError::Validation(format!(
                "unknown transaction kind: {other}"
            ))),
        }
    }
}

/// Append-only record of a balance movement.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub money: Money,
    pub description: String,
    pub order_id: Option<Uuid>,
    pub reference_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to credit an account once.
#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    pub money: Money,
    pub description: String,
    pub order_id: Option<Uuid>,
    /// Unique per kind; a second credit with the same reference is refused.
    pub reference_id: Option<String>,
}

impl CreditRequest {
    pub fn deposit(
        owner_id: Uuid,
        money: Money,
        description: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            kind: TransactionKind::Deposit,
            money,
            description: description.into(),
            order_id: None,
            reference_id: Some(reference_id.into()),
        }
    }

    pub fn refund(owner_id: Uuid, money: Money, order_id: Uuid, description: impl Into<String>) -> Self {
        Self {
            owner_id,
            kind: TransactionKind::Refund,
            money,
            description: description.into(),
            order_id: Some(order_id),
            reference_id: Some(order_id.to_string()),
        }
    }
}

/// Cached balance disagreeing with the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub owner_id: Uuid,
    pub cached: i64,
    pub derived: i64,
}
