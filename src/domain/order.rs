use {
    super::error::PipelineError,
    super::id::ExternalOrderId,
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Lifecycle rank. Higher means further along.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Cancelled => 2,
            Self::Refunded => 3,
        }
    }

    /// Orders in these states are still owed a reconciliation pass.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Transitions the provider may drive. `Cancelled → Refunded` belongs to
    /// refund approval and is checked there.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(PipelineError::Validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// What reconciliation should do after comparing stored and observed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    Unchanged,
    Advance { from: OrderStatus, to: OrderStatus },
    /// Provider reports a state behind the stored one; never persisted.
    Regression { stored: OrderStatus, observed: OrderStatus },
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub external_id: Option<ExternalOrderId>,
    pub owner_id: Uuid,
    pub status: OrderStatus,
    pub charge: Money,
    pub quantity: i64,
    pub service: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn decide(&self, observed: OrderStatus) -> StatusDecision {
        if observed == self.status {
            StatusDecision::Unchanged
        } else if self.status.can_transition_to(&observed) {
            StatusDecision::Advance {
                from: self.status,
                to: observed,
            }
        } else {
            StatusDecision::Regression {
                stored: self.status,
                observed,
            }
        }
    }
}
