use {
    super::id::PaymentReference,
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::Serialize,
    uuid::Uuid,
};

/// Short-lived link between an issued payment reference and who started it.
#[derive(Debug, Clone, Serialize)]
pub struct PendingPayment {
    pub reference: PaymentReference,
    pub owner_id: Uuid,
    pub money: Money,
    pub gateway: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: i64,
}

/// A verified gateway notification reduced to what crediting needs.
#[derive(Debug, Clone)]
pub struct DepositEvent {
    pub gateway: String,
    pub event_type: String,
    pub reference: Option<PaymentReference>,
    /// Signed minor units as reported by the gateway.
    pub amount: i64,
    pub currency: Option<String>,
    pub raw_payload: String,
    pub payload_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    NoPendingPayment,
    MissingReference,
    OwnerNotFound,
    MalformedAmount,
    CurrencyMismatch,
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPendingPayment => "no_pending_payment",
            Self::MissingReference => "missing_reference",
            Self::OwnerNotFound => "owner_not_found",
            Self::MalformedAmount => "malformed_amount",
            Self::CurrencyMismatch => "currency_mismatch",
        }
    }
}

/// Money-bearing event parked for manual review.
#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedDeposit {
    pub id: Uuid,
    pub gateway: String,
    pub event_type: String,
    pub reference: Option<String>,
    pub amount: i64,
    pub currency: Option<String>,
    pub reason: String,
    pub payload_hash: String,
    pub raw_payload: String,
    pub received_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub transaction_id: Option<Uuid>,
}

#[derive(Debug)]
pub enum IngestOutcome {
    /// Balance credited.
    Accepted { transaction_id: Uuid },
    /// Not a deposit event, or a non-positive amount.
    Ignored,
    /// Redelivery of a reference that was already consumed.
    Duplicate,
    /// Parked for manual reconciliation.
    Unmatched { unmatched_id: Option<Uuid> },
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Ignored => "ignored",
            Self::Duplicate => "duplicate",
            Self::Unmatched { .. } => "unmatched",
        }
    }
}
