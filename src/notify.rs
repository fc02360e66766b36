use async_trait::async_trait;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Fire-and-forget "new data available" message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, body: &str) -> Result<()>;
    fn endpoint(&self) -> &str;
}

/// Posts a `SendMessage` action to a queue's HTTP endpoint.
pub struct QueueNotifier {
    client: reqwest::Client,
    queue_url: String,
}

impl QueueNotifier {
    pub fn new(queue_url: impl Into<String>) -> Self {
        QueueNotifier {
            client: reqwest::Client::new(),
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for QueueNotifier {
    async fn send(&self, body: &str) -> Result<()> {
        let fail = |reason: String| PipelineError::Notify {
            queue: self.queue_url.clone(),
            reason,
        };
        self.client
            .post(&self.queue_url)
            .form(&[("Action", "SendMessage"), ("MessageBody", body)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(e.to_string()))?;
        info!("Sent {:?} to {}", body, self.queue_url);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.queue_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_queue_is_notify_error() {
        let notifier = QueueNotifier::new("http://127.0.0.1:9/queue/ota");
        assert_eq!(notifier.endpoint(), "http://127.0.0.1:9/queue/ota");
        let err = notifier.send("ota").await.unwrap_err();
        assert_eq!(err.kind(), "notify");
    }
}
