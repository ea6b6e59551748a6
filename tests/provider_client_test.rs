use axum::{Form, Router, extract::State, http::StatusCode, routing::post};
use panel_ledger::adapters::provider_client::SmmProviderClient;
use panel_ledger::config::{ProviderConfig, Secret};
use panel_ledger::domain::error::ProviderError;
use panel_ledger::domain::id::ExternalOrderId;
use panel_ledger::domain::order::OrderStatus;
use panel_ledger::domain::provider::StatusProvider;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned responses served in order; the last one repeats.
#[derive(Clone, Default)]
struct FakeProvider {
    responses: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    delay: Option<Duration>,
}

impl FakeProvider {
    fn serving(responses: &[(StatusCode, &str)]) -> Self {
        Self {
            responses: Arc::new(Mutex::new(
                responses.iter().map(|(s, b)| (*s, b.to_string())).collect(),
            )),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn api(State(fake): State<FakeProvider>, Form(form): Form<HashMap<String, String>>) -> (StatusCode, String) {
    fake.requests.lock().unwrap().push(form);
    if let Some(delay) = fake.delay {
        tokio::time::sleep(delay).await;
    }
    let mut responses = fake.responses.lock().unwrap();
    if responses.len() > 1 {
        responses.pop_front().unwrap()
    } else {
        responses.front().cloned().unwrap()
    }
}

/// Serves `fake` on an ephemeral port and returns a client pointed at it.
async fn client_for(fake: FakeProvider, timeout: Duration, max_retries: u32) -> SmmProviderClient {
    let app = Router::new().route("/api/v2", post(api)).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    SmmProviderClient::new(ProviderConfig {
        api_url: format!("http://{addr}/api/v2"),
        api_key: Secret::new("test-key".to_string()),
        timeout,
        max_retries,
        backoff: Duration::from_millis(10),
    })
    .unwrap()
}

fn ext(id: &str) -> ExternalOrderId {
    ExternalOrderId::new(id).unwrap()
}

#[tokio::test]
async fn status_request_is_a_form_post() {
    let fake = FakeProvider::serving(&[(
        StatusCode::OK,
        r#"{"charge":"0.27819","start_count":"3572","status":"In progress","remains":"157","currency":"USD"}"#,
    )]);
    let client = client_for(fake.clone(), Duration::from_secs(2), 2).await;

    let status = client.fetch_status(&ext("ext-9")).await.unwrap();

    assert_eq!(status, OrderStatus::Processing);
    let requests = fake.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["key"], "test-key");
    assert_eq!(requests[0]["action"], "status");
    assert_eq!(requests[0]["order"], "ext-9");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let fake = FakeProvider::serving(&[
        (StatusCode::BAD_GATEWAY, "upstream down"),
        (StatusCode::INTERNAL_SERVER_ERROR, "oops"),
        (StatusCode::OK, r#"{"status":"Canceled"}"#),
    ]);
    let client = client_for(fake.clone(), Duration::from_secs(2), 2).await;

    let status = client.fetch_status(&ext("ext-1")).await.unwrap();

    assert_eq!(status, OrderStatus::Cancelled);
    assert_eq!(fake.calls(), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let fake = FakeProvider::serving(&[(StatusCode::SERVICE_UNAVAILABLE, "busy")]);
    let client = client_for(fake.clone(), Duration::from_secs(2), 2).await;

    let err = client.fetch_status(&ext("ext-1")).await.unwrap_err();

    assert_eq!(err, ProviderError::Server(503));
    assert_eq!(fake.calls(), 3);
}

#[tokio::test]
async fn error_body_is_terminal() {
    let fake = FakeProvider::serving(&[(StatusCode::OK, r#"{"error":"Incorrect order ID"}"#)]);
    let client = client_for(fake.clone(), Duration::from_secs(2), 2).await;

    let err = client.fetch_status(&ext("ext-1")).await.unwrap_err();

    assert_eq!(err, ProviderError::Rejected("Incorrect order ID".into()));
    assert!(!err.is_retryable());
    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let fake = FakeProvider::serving(&[(StatusCode::FORBIDDEN, "bad key")]);
    let client = client_for(fake.clone(), Duration::from_secs(2), 2).await;

    let err = client.fetch_status(&ext("ext-1")).await.unwrap_err();

    assert!(matches!(err, ProviderError::Rejected(_)));
    assert_eq!(fake.calls(), 1);
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let fake = FakeProvider::serving(&[(StatusCode::OK, "<html>maintenance</html>")]);
    let client = client_for(fake, Duration::from_secs(2), 2).await;

    let err = client.fetch_status(&ext("ext-1")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Malformed(_)));
}

#[tokio::test]
async fn unknown_vocabulary_reads_as_pending() {
    let fake = FakeProvider::serving(&[(StatusCode::OK, r#"{"status":"Awaiting"}"#)]);
    let client = client_for(fake, Duration::from_secs(2), 2).await;

    assert_eq!(client.fetch_status(&ext("ext-1")).await.unwrap(), OrderStatus::Pending);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let mut fake = FakeProvider::serving(&[(StatusCode::OK, r#"{"status":"Completed"}"#)]);
    fake.delay = Some(Duration::from_secs(3));
    let client = client_for(fake.clone(), Duration::from_millis(200), 0).await;

    let err = client.fetch_status(&ext("ext-1")).await.unwrap_err();

    assert_eq!(err, ProviderError::Timeout(Duration::from_millis(200)));
    assert_eq!(fake.calls(), 1);
}
