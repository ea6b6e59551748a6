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
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for RefundStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(PipelineError::Validation(format!(
                "unknown refund status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    pub id: Uuid,
    pub order_id: Uuid,
    pub owner_id: Uuid,
    pub money: Money,
    pub status: RefundStatus,
    pub notes: String,
    pub approver: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum CompensationResult {
    Created(RefundRequest),
    /// A refund request for this order already existed.
    NoOp,
}

impl CompensationResult {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}
