// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use tracing::{debug, error};

use crate::error::{ConfigError, DeliveryError};
use crate::payload::Payload;

/// Delivers one payload to the chat service.
///
/// A single attempt is made per payload. Implementations must be cheap to
/// share between the dispatch worker and the inline path.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError>;
}

/// Incoming-webhook client.
#[derive(Clone, Debug)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: Url,
}

impl WebhookClient {
    pub fn new(webhook_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = parse_webhook_url(webhook_url)?;
        Ok(Self {
            client: get_client(timeout),
            url,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Deliver for WebhookClient {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        let body = serde_json::to_vec(payload)?;
        let time = std::time::Instant::now();
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let elapsed = time.elapsed();

        let status = response.status();
        // Incoming webhooks answer 200 "ok"; anything else means the message was not posted.
        if status == StatusCode::OK {
            debug!("Posted message to webhook in {} ms", elapsed.as_millis());
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Parses and checks a webhook URL.
pub fn parse_webhook_url(webhook_url: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidWebhookUrl {
        url: webhook_url.to_string(),
        reason,
    };
    let url = Url::parse(webhook_url.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

fn get_client(timeout: Duration) -> reqwest::Client {
    match build_client(timeout) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to build HTTP client: {}, using reqwest defaults",
                e
            );
            reqwest::Client::new()
        }
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadBuilder;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_parse_webhook_url() {
        assert!(parse_webhook_url("https://hooks.slack.com/services/T0/B0/XYZ").is_ok());
        assert!(parse_webhook_url("http://localhost:8080/hook").is_ok());
        assert!(matches!(
            parse_webhook_url("ftp://example.com/hook"),
            Err(ConfigError::InvalidWebhookUrl { .. })
        ));
        assert!(parse_webhook_url("not a url").is_err());
        assert!(parse_webhook_url("").is_err());
    }

    #[tokio::test]
    async fn test_deliver_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "channel": "#ops",
                "text": "disk full"
            })))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let client =
            WebhookClient::new(&format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        let payload = PayloadBuilder::new(None, None, Some("#ops".to_string())).text("disk full");
        client.deliver(&payload).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_200_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let client =
            WebhookClient::new(&format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        let err = client
            .deliver(&PayloadBuilder::default().text("hi"))
            .await
            .unwrap_err();
        match err {
            DeliveryError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("unexpected error {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_other_success_codes_are_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(204)
            .create_async()
            .await;

        let client =
            WebhookClient::new(&format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        let err = client
            .deliver(&PayloadBuilder::default().text("hi"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(204));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = WebhookClient::new(
            &format!("http://127.0.0.1:{port}/hook"),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client
            .deliver(&PayloadBuilder::default().text("hi"))
            .await
            .unwrap_err();
        assert!(err.is_unreachable(), "{err:?}");
    }
}
