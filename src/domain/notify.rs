use {serde::Serialize, std::fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Deposit,
    CancellationRefund,
    AdminAction,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::CancellationRefund => "cancellation-refund",
            Self::AdminAction => "admin-action",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fire-and-forget. Implementations must not block and must swallow their
/// own delivery failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, payload: serde_json::Value);
}

/// Discards everything.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _kind: NotificationKind, _payload: serde_json::Value) {}
}
