//! New-mail notifications.
//!
//! Two independent paths: an in-app alert to every connected admin, and an
//! optional fire-and-forget webhook POST. Neither affects the archive, and a
//! failure on one path never stops the other.

mod dispatcher;
mod webhook;

pub use dispatcher::{Dispatcher, FanOutReport, WebhookDrain, WebhookStatus, webhook_body};
pub use webhook::{ReqwestWebhook, WebhookError, WebhookResponse, WebhookSender};
