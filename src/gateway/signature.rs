use {
    crate::{config::Secret, domain::error::PipelineError},
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of the raw body, hex encoded.
pub fn sign(raw_body: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `signature_header` (bare hex or `sha256=<hex>`) against the HMAC of
/// the exact raw bytes. The comparison is constant-time.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    let provided = signature_header.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&provided).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// Gateway has no secret configured.
    Skipped,
}

/// Gateway-level policy: no secret means skip, otherwise the header is
/// mandatory and must match.
pub fn check(
    secret: Option<&Secret<String>>,
    raw_body: &[u8],
    signature_header: Option<&str>,
) -> Result<Verification, PipelineError> {
    let Some(secret) = secret else {
        return Ok(Verification::Skipped);
    };
    let header = signature_header
        .ok_or_else(|| PipelineError::WebhookSignature("missing signature header".into()))?;
    if verify(raw_body, header, secret.reveal()) {
        Ok(Verification::Verified)
    } else {
        Err(PipelineError::WebhookSignature("signature mismatch".into()))
    }
}
