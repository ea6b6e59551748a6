use {
    crate::gateway::{DEFAULT_SIGNATURE_HEADER, GatewayConfig, GatewayRegistry},
    std::{
        fmt::{self, Debug, Display},
        time::Duration,
    },
    thiserror::Error,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DATABASE_URL: &str = "sqlite://panel_ledger.db";
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 12;
const DEFAULT_PROVIDER_MAX_RETRIES: u32 = 2;
const DEFAULT_PROVIDER_BACKOFF_MS: u64 = 500;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;
const DEFAULT_RECONCILE_CONCURRENCY: usize = 8;
const MAX_RECONCILE_CONCURRENCY: usize = 32;
const DEFAULT_PENDING_PAYMENT_TTL_HOURS: u64 = 72;
/// Pending payment lifetime when `PENDING_PAYMENT_TTL_HOURS` is unset.
pub const DEFAULT_PENDING_PAYMENT_TTL: Duration =
    Duration::from_secs(DEFAULT_PENDING_PAYMENT_TTL_HOURS * 3600);
const DEFAULT_CONSUMED_REFERENCE_TTL_DAYS: u64 = 30;

/// Value that never shows up in logs or `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret<T>
where
    T: Clone + Default,
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: String, reason: String },

    #[error("gateway {0} has no signing secret; unsigned webhooks are not allowed in production")]
    UnsignedGatewayInProduction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl TryFrom<&str> for Environment {
    type Error = ConfigError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "staging" | "test" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Invalid {
                key: "APP_ENV".into(),
                reason: format!("unknown environment {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub bind_addr: String,
    pub database_url: String,
    pub provider: ProviderConfig,
    pub reconcile_interval: Duration,
    pub reconcile_concurrency: usize,
    pub pending_payment_ttl: Duration,
    pub consumed_reference_ttl: Duration,
    pub gateways: GatewayRegistry,
    pub notify_webhook_url: Option<String>,
    pub admin_token: Option<Secret<String>>,
}

impl Config {
    /// Reads the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match get("APP_ENV") {
            Some(v) => Environment::try_from(v.as_str())?,
            None => Environment::Development,
        };

        let provider = ProviderConfig {
            api_url: get("PROVIDER_API_URL").ok_or(ConfigError::Missing("PROVIDER_API_URL"))?,
            api_key: Secret::new(
                get("PROVIDER_API_KEY").ok_or(ConfigError::Missing("PROVIDER_API_KEY"))?,
            ),
            timeout: Duration::from_secs(parse_or(
                &get,
                "PROVIDER_TIMEOUT_SECS",
                DEFAULT_PROVIDER_TIMEOUT_SECS,
            )?),
            max_retries: parse_or(&get, "PROVIDER_MAX_RETRIES", DEFAULT_PROVIDER_MAX_RETRIES)?,
            backoff: Duration::from_millis(parse_or(
                &get,
                "PROVIDER_BACKOFF_MS",
                DEFAULT_PROVIDER_BACKOFF_MS,
            )?),
        };

        let gateways = match get("GATEWAYS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| gateway_from_lookup(&get, name))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        for gateway in &gateways {
            if gateway.secret.is_none() {
                if environment == Environment::Production {
                    return Err(ConfigError::UnsignedGatewayInProduction(gateway.name.clone()));
                }
                tracing::warn!(
                    gateway = %gateway.name,
                    "gateway has no signing secret; webhook signatures will NOT be checked"
                );
            }
        }

        Ok(Self {
            environment,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            provider,
            reconcile_interval: Duration::from_secs(parse_or(
                &get,
                "RECONCILE_INTERVAL_SECS",
                DEFAULT_RECONCILE_INTERVAL_SECS,
            )?),
            reconcile_concurrency: parse_or(
                &get,
                "RECONCILE_CONCURRENCY",
                DEFAULT_RECONCILE_CONCURRENCY,
            )?
            .clamp(1, MAX_RECONCILE_CONCURRENCY),
            pending_payment_ttl: parse_duration(
                &get,
                "PENDING_PAYMENT_TTL_HOURS",
                DEFAULT_PENDING_PAYMENT_TTL_HOURS,
                3600,
            )?,
            consumed_reference_ttl: parse_duration(
                &get,
                "CONSUMED_REFERENCE_TTL_DAYS",
                DEFAULT_CONSUMED_REFERENCE_TTL_DAYS,
                86_400,
            )?,
            gateways: GatewayRegistry::new(gateways),
            notify_webhook_url: get("NOTIFY_WEBHOOK_URL"),
            admin_token: get("ADMIN_TOKEN").map(Secret::new),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Reads a count of `unit_secs`-long units as a `Duration`.
fn parse_duration(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    unit_secs: u64,
) -> Result<Duration, ConfigError> {
    parse_or(get, key, default)?
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            key: key.to_string(),
            reason: "value is too large".to_string(),
        })
}

fn gateway_from_lookup(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<GatewayConfig, ConfigError> {
    let prefix = format!("GATEWAY_{}", name.to_ascii_uppercase().replace('-', "_"));
    let mut gateway = GatewayConfig::new(
        name.to_ascii_lowercase(),
        get(&format!("{prefix}_SECRET")).map(Secret::new),
    );
    gateway.signature_header = get(&format!("{prefix}_SIGNATURE_HEADER"))
        .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string())
        .to_ascii_lowercase();
    if let Some(events) = get(&format!("{prefix}_EVENTS")) {
        gateway.deposit_events = events
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
        if gateway.deposit_events.is_empty() {
            return Err(ConfigError::Invalid {
                key: format!("{prefix}_EVENTS"),
                reason: "no event types listed".into(),
            });
        }
    }
    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("PROVIDER_API_URL", "https://provider.example/api/v2"),
        ("PROVIDER_API_KEY", "k"),
    ];

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.provider.timeout, Duration::from_secs(12));
        assert_eq!(config.provider.max_retries, 2);
        assert_eq!(config.reconcile_concurrency, 8);
        assert!(config.admin_token.is_none());
        assert_eq!(config.gateways.names().count(), 0);
        assert_eq!(config.pending_payment_ttl, DEFAULT_PENDING_PAYMENT_TTL);
        assert_eq!(config.pending_payment_ttl, Duration::from_secs(72 * 3600));
    }

    #[test]
    fn missing_provider_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[("PROVIDER_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PROVIDER_API_URL")));
    }

    #[test]
    fn gateways_are_read_per_name() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("GATEWAYS", "card, crypto"),
            ("GATEWAY_CARD_SECRET", "s3cret"),
            ("GATEWAY_CARD_SIGNATURE_HEADER", "X-Card-Signature"),
            ("GATEWAY_CRYPTO_EVENTS", "invoice.paid"),
            ("RECONCILE_CONCURRENCY", "500"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        let card = config.gateways.get("card").unwrap();
        assert_eq!(card.secret.as_ref().unwrap().reveal(), "s3cret");
        assert_eq!(card.signature_header, "x-card-signature");

        let crypto = config.gateways.get("crypto").unwrap();
        assert!(crypto.secret.is_none());
        assert!(crypto.accepts("invoice.paid"));
        assert!(!crypto.accepts("deposit.success"));

        assert_eq!(config.reconcile_concurrency, 32);
    }

    #[test]
    fn unsigned_gateway_refused_in_production() {
        let mut pairs = BASE.to_vec();
        pairs.extend([("APP_ENV", "production"), ("GATEWAYS", "bank")]);
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::UnsignedGatewayInProduction(name) if name == "bank"));
    }

    #[test]
    fn invalid_number_names_the_key() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PROVIDER_MAX_RETRIES", "lots"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("PROVIDER_MAX_RETRIES"));
    }

    #[test]
    fn oversized_ttl_is_rejected_not_overflowed() {
        let mut pairs = BASE.to_vec();
        pairs.push(("CONSUMED_REFERENCE_TTL_DAYS", "18446744073709551615"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Invalid { key, .. } if key == "CONSUMED_REFERENCE_TTL_DAYS")
        );

        let mut pairs = BASE.to_vec();
        pairs.push(("PENDING_PAYMENT_TTL_HOURS", "2"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.pending_payment_ttl, Duration::from_secs(7200));
    }

    #[test]
    fn secrets_are_redacted() {
        let secret = Secret::new("hunter2".to_string());
        assert_eq!(format!("{secret:?}"), "****");
        assert_eq!(secret.to_string(), "****");
    }
}
