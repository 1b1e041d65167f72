//! Fan-out of newly archived mail.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::webhook::WebhookSender;
use crate::archive::{MailRecord, format_short_date};
use crate::host::{HostError, Identity};
use crate::lang::{Catalog, MessageKey};

/// How a webhook delivery ended. Observed only for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookStatus {
    /// Endpoint answered 200 or 204.
    Delivered(u16),
    /// Endpoint answered with any other status.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The request never got a response.
    Failed(String),
}

/// Counts from one local fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Recipients a delivery was attempted for.
    pub attempted: usize,
    /// Deliveries that succeeded.
    pub delivered: usize,
    /// Deliveries that failed.
    pub failed: usize,
}

/// Webhook outcomes collected by [`Dispatcher::drain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookDrain {
    /// Posts that finished during the drain, in completion order.
    pub completed: Vec<WebhookStatus>,
    /// Posts aborted because they were still running at the deadline.
    pub abandoned: usize,
}

/// Sends new-mail notifications.
#[derive(Debug)]
pub struct Dispatcher<W> {
    sender: Arc<W>,
    in_flight: JoinSet<WebhookStatus>,
}

impl<W> Dispatcher<W> {
    /// Number of webhook posts not yet collected.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

impl<W: WebhookSender> Dispatcher<W> {
    /// Creates a dispatcher posting webhooks through `sender`.
    #[must_use]
    pub fn new(sender: W) -> Self {
        Self {
            sender: Arc::new(sender),
            in_flight: JoinSet::new(),
        }
    }

    /// Alerts every recipient that `record` arrived.
    ///
    /// `deliver` is called once per recipient; a failure is logged and the
    /// remaining recipients are still attempted.
    pub fn fan_out_local<F>(
        &self,
        record: &MailRecord,
        recipients: &[Identity],
        catalog: &Catalog,
        browse_command: &str,
        mut deliver: F,
    ) -> FanOutReport
    where
        F: FnMut(&Identity, &str) -> Result<(), HostError>,
    {
        let alert = catalog.render(
            MessageKey::NewMailAlert,
            &[&record.sender_name, &browse_command],
        );

        let mut report = FanOutReport::default();
        for recipient in recipients {
            report.attempted += 1;
            match deliver(recipient, &alert) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        "Failed to alert {} ({}) about new mail: {}",
                        recipient.display_name, recipient.id, e
                    );
                }
            }
        }

        debug!(
            "New mail alert delivered to {}/{} admin(s)",
            report.delivered, report.attempted
        );
        report
    }

    /// Posts `record` to `url` in the background.
    ///
    /// Returns false when called outside a tokio runtime (the post is skipped
    /// and a warning logged). The outcome is only logged; it is never retried
    /// and never touches the archive. Posts that already finished are reaped
    /// here; anything still running is waited for by [`Self::drain`].
    pub fn fan_out_webhook(
        &mut self,
        record: &MailRecord,
        url: &str,
        catalog: &Catalog,
    ) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, skipping webhook for new mail");
            return false;
        };
        self.reap();

        let date = format_short_date(record.timestamp, &Local);
        let message = catalog.render(
            MessageKey::WebhookMailAlert,
            &[&record.sender_name, &record.sender_id, &date, &record.content()],
        );
        let body = webhook_body(&message);

        let sender = Arc::clone(&self.sender);
        let url = url.to_string();
        self.in_flight.spawn_on(
            async move {
                let status = match sender.post_json(&url, body).await {
                    Ok(response) if matches!(response.status, 200 | 204) => {
                        WebhookStatus::Delivered(response.status)
                    }
                    Ok(response) => WebhookStatus::Rejected {
                        status: response.status,
                        body: response.body,
                    },
                    Err(e) => WebhookStatus::Failed(e.to_string()),
                };
                log_webhook_status(&status);
                status
            },
            &runtime,
        );
        true
    }

    /// Waits up to `timeout` for outstanding webhook posts.
    ///
    /// Posts still running at the deadline are aborted and counted in
    /// [`WebhookDrain::abandoned`] with a warning.
    pub async fn drain(&mut self, timeout: Duration) -> WebhookDrain {
        let deadline = Instant::now() + timeout;
        let mut drain = WebhookDrain::default();

        while let Ok(Some(joined)) = time::timeout_at(deadline, self.in_flight.join_next()).await
        {
            drain.completed.push(joined.unwrap_or_else(|e| {
                warn!("Webhook task ended abnormally: {}", e);
                WebhookStatus::Failed(e.to_string())
            }));
        }

        drain.abandoned = self.in_flight.len();
        if drain.abandoned > 0 {
            warn!(
                "Abandoning {} webhook post(s) still in flight after {:?}",
                drain.abandoned, timeout
            );
            self.in_flight.shutdown().await;
        }
        drain
    }

    fn reap(&mut self) {
        while let Some(joined) = self.in_flight.try_join_next() {
            if let Err(e) = joined {
                warn!("Webhook task ended abnormally: {}", e);
            }
        }
    }
}

fn log_webhook_status(status: &WebhookStatus) {
    match status {
        WebhookStatus::Delivered(code) => debug!("Webhook accepted new mail ({})", code),
        WebhookStatus::Rejected { status, body } => {
            warn!("Webhook returned code {}. Response: {}", status, body);
        }
        WebhookStatus::Failed(reason) => warn!("Webhook request failed: {}", reason),
    }
}

/// JSON body posted to the webhook: `{"content": "<message>"}`.
#[must_use]
pub fn webhook_body(message: &str) -> String {
    serde_json::json!({ "content": message }).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::{WebhookError, WebhookResponse};
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records every post and answers with a fixed result.
    #[derive(Default)]
    struct StubWebhook {
        posts: Mutex<Vec<(String, String)>>,
        status: u16,
        fail: bool,
        delay: Duration,
    }

    impl WebhookSender for StubWebhook {
        async fn post_json(
            &self,
            url: &str,
            body: String,
        ) -> Result<WebhookResponse, WebhookError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.posts.lock().unwrap().push((url.to_string(), body));
            if self.fail {
                return Err(WebhookError::Transport("connection refused".to_string()));
            }
            Ok(WebhookResponse {
                status: self.status,
                body: "nope".to_string(),
            })
        }
    }

    fn record() -> MailRecord {
        MailRecord::new(&Identity::new(9, "Carol"), "base raided", Utc::now()).unwrap()
    }

    fn stub(status: u16, fail: bool) -> Dispatcher<StubWebhook> {
        Dispatcher::new(StubWebhook {
            status,
            fail,
            ..StubWebhook::default()
        })
    }

    fn slow(delay: Duration) -> Dispatcher<StubWebhook> {
        Dispatcher::new(StubWebhook {
            status: 204,
            delay,
            ..StubWebhook::default()
        })
    }

    #[test]
    fn test_local_failure_does_not_stop_others() {
        let dispatcher = stub(204, false);
        let admins = [
            Identity::new(1, "a"),
            Identity::new(2, "b"),
            Identity::new(3, "c"),
        ];

        let mut seen = Vec::new();
        let report = dispatcher.fan_out_local(
            &record(),
            &admins,
            &Catalog::english(),
            "openmail",
            |to, text| {
                seen.push((to.id.0, text.to_string()));
                if to.id.0 == 2 {
                    Err(HostError::NotConnected(to.id))
                } else {
                    Ok(())
                }
            },
        );

        assert_eq!(
            report,
            FanOutReport {
                attempted: 3,
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[0].1,
            "New mail received from Carol. Use /openmail to view the archive."
        );
    }

    #[test]
    fn test_body_is_json_content() {
        let body = webhook_body("line \"one\"\n```x```");
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["content"], "line \"one\"\n```x```");
        assert_eq!(value.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_delivered() {
        let mut dispatcher = stub(204, false);
        assert!(dispatcher.fan_out_webhook(&record(), "https://hook.test/x", &Catalog::english()));
        assert_eq!(dispatcher.pending(), 1);

        let drain = dispatcher.drain(Duration::from_secs(5)).await;
        assert_eq!(drain.completed, [WebhookStatus::Delivered(204)]);
        assert_eq!(drain.abandoned, 0);
        assert_eq!(dispatcher.pending(), 0);

        let posts = dispatcher.sender.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, "https://hook.test/x");
        let value: serde_json::Value = serde_json::from_str(&posts[0].1).unwrap();
        let content = value["content"].as_str().unwrap();
        assert!(content.starts_with("From: Carol (9)\nTime: "));
        assert!(content.ends_with("```base raided```"));
    }

    #[tokio::test]
    async fn test_webhook_rejected_status() {
        let mut dispatcher = stub(500, false);
        assert!(dispatcher.fan_out_webhook(&record(), "https://hook.test/x", &Catalog::english()));
        let drain = dispatcher.drain(Duration::from_secs(5)).await;
        assert_eq!(
            drain.completed,
            [WebhookStatus::Rejected {
                status: 500,
                body: "nope".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_webhook_transport_failure() {
        let mut dispatcher = stub(200, true);
        assert!(dispatcher.fan_out_webhook(&record(), "https://hook.test/x", &Catalog::english()));
        let drain = dispatcher.drain(Duration::from_secs(5)).await;
        assert!(matches!(drain.completed[..], [WebhookStatus::Failed(_)]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_slow_post() {
        let mut dispatcher = slow(Duration::from_millis(200));
        assert!(dispatcher.fan_out_webhook(&record(), "https://hook.test/x", &Catalog::english()));

        let drain = dispatcher.drain(Duration::from_secs(1)).await;
        assert_eq!(drain.completed, [WebhookStatus::Delivered(204)]);
        assert_eq!(drain.abandoned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_reports_abandoned_posts() {
        let mut dispatcher = slow(Duration::from_secs(30));
        for _ in 0..2 {
            assert!(dispatcher.fan_out_webhook(
                &record(),
                "https://hook.test/x",
                &Catalog::english()
            ));
        }

        let drain = dispatcher.drain(Duration::from_millis(100)).await;
        assert!(drain.completed.is_empty());
        assert_eq!(drain.abandoned, 2);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn test_webhook_without_runtime_is_skipped() {
        let mut dispatcher = stub(200, false);
        assert!(!dispatcher.fan_out_webhook(&record(), "https://hook.test/x", &Catalog::english()));
        assert_eq!(dispatcher.pending(), 0);
        assert!(dispatcher.sender.posts.lock().unwrap().is_empty());
    }
}
