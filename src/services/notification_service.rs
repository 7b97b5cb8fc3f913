use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    SignedUp,
    Removed,
    Waitlisted,
    Promoted,
}

#[derive(Debug, Serialize)]
struct NotificationPayload {
    event: NotificationEvent,
    user_id: i64,
    scheduled_activity_id: i64,
}

/// Fire-and-forget hand-off to the portal's notification service. Delivery is
/// someone else's job; failures here are only logged.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl Notifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Call only after the change has committed.
    pub fn notify(&self, event: NotificationEvent, user_id: i64, scheduled_activity_id: i64) {
        let Some(url) = self.url.clone() else {
            debug!(?event, user_id, scheduled_activity_id, "notifications disabled");
            return;
        };
        let client = self.client.clone();
        let payload = NotificationPayload {
            event,
            user_id,
            scheduled_activity_id,
        };
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!(status = %resp.status(), ?payload, "notification rejected");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, url = %url, "notification failed"),
            }
        });
    }
}
