use crate::config::Settings;
use crate::domain::notification::Notification;
use crate::notify::error::NotificationApiError;
use crate::notify::frame::EventStreamDecoder;
use crate::notify::{NotificationService, PushStream};
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct HttpNotificationService {
    http: reqwest::Client,
    // No overall timeout: the push response body stays open for the session.
    stream_http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    success: bool,
    // Decoded entry by entry so one bad record does not hide the rest.
    #[serde(default)]
    data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpNotificationService {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_api_base_url()?;
        Self::new(base_url, settings.http_timeout()?)
    }

    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!base_url.trim().is_empty(), "notification base url must be non-empty");

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("failed to build notification http client")?;

        let stream_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("failed to build notification stream client")?;

        Ok(Self {
            http,
            stream_http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .context("session token is not a valid header value")?,
        );
        Ok(headers)
    }

    async fn expect_success(stage: &'static str, res: reqwest::Response) -> Result<String> {
        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read notification response ({stage})"))?;
        if !status.is_success() {
            return Err(NotificationApiError {
                stage,
                status: Some(status),
                detail: text,
            }
            .into());
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl NotificationService for HttpNotificationService {
    fn service_name(&self) -> &'static str {
        "http"
    }

    async fn fetch_all(&self, token: &str) -> Result<Vec<Notification>> {
        let res = self
            .http
            .get(self.url("/notifications"))
            .headers(Self::headers(token)?)
            .send()
            .await
            .context("notification list request failed")?;

        let text = Self::expect_success("list", res).await?;
        let envelope = serde_json::from_str::<ListEnvelope>(&text)
            .with_context(|| format!("notification list response is not valid JSON: {text}"))?;

        if !envelope.success {
            return Err(NotificationApiError {
                stage: "list",
                status: None,
                detail: envelope
                    .message
                    .unwrap_or_else(|| "success=false".to_string()),
            }
            .into());
        }

        let entries = envelope.data.unwrap_or_default();
        let total = entries.len();
        let notifications: Vec<Notification> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Notification>(entry) {
                Ok(n) => Some(n),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed notification in list response");
                    None
                }
            })
            .collect();
        if notifications.len() < total {
            tracing::warn!(
                kept = notifications.len(),
                skipped = total - notifications.len(),
                "notification list contained malformed entries"
            );
        }
        Ok(notifications)
    }

    async fn mark_read(&self, token: &str, id: &str) -> Result<()> {
        let res = self
            .http
            .put(self.url(&format!("/notifications/{id}/read")))
            .headers(Self::headers(token)?)
            .send()
            .await
            .with_context(|| format!("mark-read request failed (id={id})"))?;

        Self::expect_success("mark_read", res).await?;
        Ok(())
    }

    async fn delete(&self, token: &str, id: &str) -> Result<()> {
        let res = self
            .http
            .delete(self.url(&format!("/notifications/{id}")))
            .headers(Self::headers(token)?)
            .send()
            .await
            .with_context(|| format!("delete request failed (id={id})"))?;

        Self::expect_success("delete", res).await?;
        Ok(())
    }

    async fn subscribe(&self, token: &str) -> Result<PushStream> {
        let res = self
            .stream_http
            .get(self.url("/notifications/subscribe"))
            .query(&[("token", token)])
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .context("notification subscribe request failed")?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(NotificationApiError {
                stage: "subscribe",
                status: Some(status),
                detail,
            }
            .into());
        }

        let mut decoder = EventStreamDecoder::default();
        let frames = res
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<String>> {
                match chunk {
                    Ok(bytes) => match decoder.push(&bytes) {
                        Ok(payloads) => payloads.into_iter().map(Ok).collect(),
                        Err(err) => vec![Err(err.context("push stream framing error"))],
                    },
                    Err(err) => vec![Err(anyhow::Error::new(err).context("push stream transport error"))],
                }
            })
            .flat_map(futures::stream::iter);

        Ok(frames.boxed())
    }
}
