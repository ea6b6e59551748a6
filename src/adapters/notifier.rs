use {
    crate::domain::notify::{NotificationKind, Notifier},
    chrono::{DateTime, Utc},
    reqwest::Client,
    serde::Serialize,
    serde_json::Value,
    std::{future::Future, pin::Pin, time::Duration},
    thiserror::Error,
    tokio::{sync::mpsc, task::JoinHandle},
};

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request timed out")]
    Timeout,

    #[error("notification endpoint unreachable")]
    Connect,

    #[error("notification endpoint returned HTTP {0}")]
    Status(u16),

    #[error("notification request failed")]
    Request,
}

/// Destination for notifications drained off the queue.
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    fn deliver<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;
}

pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(
                kind = %notification.kind,
                payload = %notification.payload,
                "notification"
            );
            Ok(())
        })
    }
}

/// Posts each notification as JSON to an operator webhook.
pub struct HttpSink {
    url: String,
    client: Client,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|_| NotifyError::Request)?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl NotificationSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn deliver<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(notification)
                .send()
                .await
                .map_err(sanitize_reqwest_error)?;

            if response.status().is_success() {
                return Ok(());
            }
            Err(NotifyError::Status(response.status().as_u16()))
        })
    }
}

fn sanitize_reqwest_error(error: reqwest::Error) -> NotifyError {
    if error.is_timeout() {
        return NotifyError::Timeout;
    }
    if error.is_connect() {
        return NotifyError::Connect;
    }
    NotifyError::Request
}

/// Queues notifications for a background task, so callers never wait on
/// delivery. A full queue drops the notification with a warning.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Notification>,
}

impl ChannelNotifier {
    /// Starts the drain task. It ends once every `ChannelNotifier` clone is dropped.
    pub fn spawn(sinks: Vec<Box<dyn NotificationSink>>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(drain(rx, sinks));
        (Self { tx }, handle)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, kind: NotificationKind, payload: Value) {
        let notification = Notification {
            kind,
            payload,
            created_at: Utc::now(),
        };
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(kind = %n.kind, "notification queue full, dropping notification");
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::warn!(kind = %n.kind, "notification queue closed, dropping notification");
            }
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<Notification>, sinks: Vec<Box<dyn NotificationSink>>) {
    while let Some(notification) = rx.recv().await {
        for sink in &sinks {
            if let Err(e) = sink.deliver(&notification).await {
                tracing::warn!(
                    sink = sink.name(),
                    kind = %notification.kind,
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    }
    tracing::debug!("notification queue drained");
}
