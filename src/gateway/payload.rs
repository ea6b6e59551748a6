use {
    crate::domain::{
        deposit::DepositEvent,
        error::PipelineError,
        id::PaymentReference,
        money::minor_units_from_json,
    },
    serde_json::Value,
    sha2::{Digest, Sha256},
};

const EVENT_TYPE_KEYS: &[&str] = &["event", "type", "event_type"];
const REFERENCE_KEYS: &[&str] = &[
    "reference",
    "data.reference",
    "tx_ref",
    "data.tx_ref",
    "order_id",
    "data.order_id",
];
const AMOUNT_KEYS: &[&str] = &["amount", "data.amount"];
const CURRENCY_KEYS: &[&str] = &["currency", "data.currency"];

/// SHA-256 of the raw body, hex encoded. Used to correlate logs with parked records.
pub fn payload_hash(raw_body: &[u8]) -> String {
    hex::encode(Sha256::digest(raw_body))
}

/// First non-null value among dotted `paths`.
fn lookup<'a>(payload: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        path.split('.')
            .try_fold(payload, |node, key| node.get(key))
            .filter(|v| !v.is_null())
    })
}

fn lookup_str<'a>(payload: &'a Value, paths: &[&str]) -> Option<&'a str> {
    lookup(payload, paths)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub fn event_type(payload: &Value) -> Option<&str> {
    lookup_str(payload, EVENT_TYPE_KEYS)
}

/// Amount as reported, or the reason it could not be read.
pub fn amount(payload: &Value) -> Result<i64, PipelineError> {
    let value = lookup(payload, AMOUNT_KEYS)
        .ok_or_else(|| PipelineError::Validation("payload carries no amount".into()))?;
    minor_units_from_json(value)
}

/// Normalizes a parsed payload. An unreadable amount is reported through the
/// `Err` branch so the caller can still park the raw event.
pub fn extract_deposit(
    gateway: &str,
    payload: &Value,
    raw_body: &[u8],
) -> (DepositEvent, Result<(), PipelineError>) {
    let reference = lookup(payload, REFERENCE_KEYS)
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .and_then(|r| PaymentReference::new(r).ok());

    let (amount, amount_result) = match amount(payload) {
        Ok(a) => (a, Ok(())),
        Err(e) => (0, Err(e)),
    };

    let event = DepositEvent {
        gateway: gateway.to_string(),
        event_type: event_type(payload).unwrap_or_default().to_string(),
        reference,
        amount,
        currency: lookup_str(payload, CURRENCY_KEYS).map(|c| c.to_ascii_lowercase()),
        raw_payload: String::from_utf8_lossy(raw_body).into_owned(),
        payload_hash: payload_hash(raw_body),
    };
    (event, amount_result)
}
