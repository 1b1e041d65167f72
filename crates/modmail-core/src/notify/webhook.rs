//! Outbound webhook transport.

use std::future::Future;

use reqwest::header::CONTENT_TYPE;

/// Errors that can occur while posting to a webhook.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Status and body returned by the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, empty if it could not be read.
    pub body: String,
}

/// Posts a JSON body to a URL.
pub trait WebhookSender: Send + Sync + 'static {
    /// Sends `body` as `application/json` to `url`.
    fn post_json(
        &self,
        url: &str,
        body: String,
    ) -> impl Future<Output = Result<WebhookResponse, WebhookError>> + Send;
}

/// [`WebhookSender`] backed by a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestWebhook {
    client: reqwest::Client,
}

impl ReqwestWebhook {
    /// Creates a sender with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WebhookSender for ReqwestWebhook {
    async fn post_json(&self, url: &str, body: String) -> Result<WebhookResponse, WebhookError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_http_error() {
        let sender = ReqwestWebhook::new();
        let result = tokio_test::block_on(sender.post_json("not a url", "{}".to_string()));
        assert!(matches!(result, Err(WebhookError::Http(_))));
    }

    #[test]
    fn test_refused_connection_is_http_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let sender = ReqwestWebhook::new();
        let url = format!("http://127.0.0.1:{port}/hook");
        let result = tokio_test::block_on(sender.post_json(&url, "{}".to_string()));
        assert!(matches!(result, Err(WebhookError::Http(_))));
    }
}
