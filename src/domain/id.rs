use {
    super::error::PipelineError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
};

/// Identifier the fulfillment provider assigned once it accepted an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalOrderId(String);

impl ExternalOrderId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation(
                "ExternalOrderId cannot be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Caller-generated reference tying a gateway notification back to a pending payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentReference(String);

impl PaymentReference {
    pub fn new(reference: impl Into<String>) -> Result<Self, PipelineError> {
        let reference = reference.into();
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation(
                "PaymentReference cannot be empty".into(),
            ));
        }
        if trimmed.len() > 128 {
            return Err(PipelineError::Validation(format!(
                "PaymentReference too long ({} chars)",
                trimmed.len()
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_trimmed_and_non_empty() {
        assert_eq!(ExternalOrderId::new(" 9912 ").unwrap().as_str(), "9912");
        assert!(ExternalOrderId::new("   ").is_err());
        assert!(PaymentReference::new("").is_err());
        assert!(PaymentReference::new("x".repeat(129)).is_err());
        assert_eq!(PaymentReference::new("PAY-1").unwrap().to_string(), "PAY-1");
    }
}
