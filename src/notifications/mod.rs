use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How long a single dispatch attempt may take before it is abandoned.
pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

const QUEUE_CAPACITY: usize = 100;

/// A push message bound for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub device_token: String,
    pub title: String,
    pub body: String,
}

/// Push-provider seam. `send` reports delivery acceptance only; there is no
/// stronger guarantee to surface.
#[async_trait]
pub trait PushSender: Send + Sync + 'static {
    async fn send(&self, notification: &PushNotification) -> bool;
}

/// Sender that only logs. The real provider integration lives outside the
/// engine core; this keeps the demo and tests free of network calls.
pub struct LogSender;

#[async_trait]
impl PushSender for LogSender {
    async fn send(&self, notification: &PushNotification) -> bool {
        info!(
            token = %notification.device_token,
            title = %notification.title,
            "push notification"
        );
        true
    }
}

/// Fire-and-forget push dispatch, decoupled from the request path.
///
/// Notifications go through a bounded queue drained by one worker task. Each
/// is attempted once under a timeout; failures, timeouts, and overflow are
/// logged and dropped, never surfaced to the caller, because the moderation
/// decision has already committed by the time a notification is enqueued.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<PushNotification>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn PushSender>) -> Self {
        Self::with_timeout(sender, DISPATCH_TIMEOUT)
    }

    fn with_timeout(sender: Arc<dyn PushSender>, timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<PushNotification>(QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                match tokio::time::timeout(timeout, sender.send(&notification)).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(token = %notification.device_token, "push provider rejected notification")
                    }
                    Err(_) => {
                        warn!(token = %notification.device_token, "push dispatch timed out")
                    }
                }
            }
        });
        Self { tx }
    }

    /// Enqueues a notification for one best-effort attempt. A full queue
    /// drops it.
    pub fn dispatch(&self, notification: PushNotification) {
        if self.tx.try_send(notification).is_err() {
            warn!("dropping push notification, queue full or worker gone");
        }
    }
}
