//! Inbound payment-gateway notifications: per-rail configuration, signature
//! verification and payload normalization.

pub mod payload;
pub mod signature;

use {crate::config::Secret, std::collections::HashMap, std::sync::Arc};

pub const DEFAULT_SIGNATURE_HEADER: &str = "x-signature";

pub const DEFAULT_DEPOSIT_EVENTS: &[&str] = &[
    "deposit.success",
    "charge.success",
    "payment.completed",
    "payment.success",
];

/// One payment rail (card gateway, bank transfer, crypto processor, ...).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub name: String,
    /// `None` disables signature checks. Refused in production by config loading.
    pub secret: Option<Secret<String>>,
    pub signature_header: String,
    pub deposit_events: Vec<String>,
}

impl GatewayConfig {
    pub fn new(name: impl Into<String>, secret: Option<Secret<String>>) -> Self {
        Self {
            name: name.into(),
            secret,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            deposit_events: DEFAULT_DEPOSIT_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn accepts(&self, event_type: &str) -> bool {
        self.deposit_events
            .iter()
            .any(|e| e.eq_ignore_ascii_case(event_type.trim()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<String, Arc<GatewayConfig>>,
}

impl GatewayRegistry {
    pub fn new(gateways: impl IntoIterator<Item = GatewayConfig>) -> Self {
        Self {
            gateways: gateways
                .into_iter()
                .map(|g| (g.name.to_ascii_lowercase(), Arc::new(g)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<GatewayConfig>> {
        self.gateways.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }
}
