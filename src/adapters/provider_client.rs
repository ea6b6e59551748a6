use {
    crate::{
        config::ProviderConfig,
        domain::{
            error::ProviderError, id::ExternalOrderId, order::OrderStatus,
            provider::StatusProvider,
        },
    },
    reqwest::Client,
    serde_json::Value,
    std::{future::Future, pin::Pin, time::Duration},
};

/// Status client for SMM-panel style provider APIs
/// (`POST key=..&action=status&order=..`).
pub struct SmmProviderClient {
    client: Client,
    config: ProviderConfig,
}

impl SmmProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn fetch_with_retry(&self, id: &ExternalOrderId) -> Result<OrderStatus, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(id).await {
                Ok(status) => return Ok(status),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = backoff_delay(self.config.backoff, attempt);
                    tracing::debug!(
                        external_id = %id,
                        attempt = attempt + 1,
                        error = %e,
                        delay = ?delay,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, id: &ExternalOrderId) -> Result<OrderStatus, ProviderError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .form(&[
                ("key", self.config.api_key.reveal().as_str()),
                ("action", "status"),
                ("order", id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.sanitize(e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Server(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.sanitize(e))?;
        if status.is_client_error() {
            return Err(ProviderError::Rejected(format!("HTTP {}: {}", status.as_u16(), truncate(&body))));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Malformed(format!("{e}: {}", truncate(&body))))?;

        if let Some(error) = parsed.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(ProviderError::Rejected(message));
        }

        let raw_status = parsed
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("response has no status field".into()))?;

        Ok(map_provider_status(raw_status))
    }

    /// reqwest errors can echo the request URL; keep only the failure class.
    fn sanitize(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            return ProviderError::Timeout(self.config.timeout);
        }
        if error.is_connect() {
            return ProviderError::Transport("connection failed".into());
        }
        if error.is_decode() || error.is_body() {
            return ProviderError::Transport("failed to read response body".into());
        }
        ProviderError::Transport("request failed".into())
    }
}

impl StatusProvider for SmmProviderClient {
    fn fetch_status(
        &self,
        id: &ExternalOrderId,
    ) -> Pin<Box<dyn Future<Output = Result<OrderStatus, ProviderError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.fetch_with_retry(&id).await })
    }
}

/// Provider vocabulary to local status. Unknown words are treated as still pending.
pub fn map_provider_status(raw: &str) -> OrderStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pending" => OrderStatus::Pending,
        "in progress" | "inprogress" | "in_progress" | "processing" => OrderStatus::Processing,
        "completed" | "partial" => OrderStatus::Completed,
        "canceled" | "cancelled" => OrderStatus::Cancelled,
        other => {
            tracing::warn!("unknown provider status {other:?}, treating as pending");
            OrderStatus::Pending
        }
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        return body.to_string();
    }
    let mut short: String = body.chars().take(LIMIT).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_words_map_to_local_statuses() {
        assert_eq!(map_provider_status("Pending"), OrderStatus::Pending);
        assert_eq!(map_provider_status("In progress"), OrderStatus::Processing);
        assert_eq!(map_provider_status("Processing"), OrderStatus::Processing);
        assert_eq!(map_provider_status("Completed"), OrderStatus::Completed);
        assert_eq!(map_provider_status("Partial"), OrderStatus::Completed);
        assert_eq!(map_provider_status("Canceled"), OrderStatus::Cancelled);
        assert_eq!(map_provider_status(" cancelled "), OrderStatus::Cancelled);
        assert_eq!(map_provider_status("Refunded"), OrderStatus::Pending);
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        assert_eq!(truncate(&body).len(), 203);
        assert_eq!(truncate("short"), "short");
    }
}
