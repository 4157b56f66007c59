//! Chat Transport
//!
//! Sends one chat request and hands back the response body as an
//! [`EventStream`]. The trait exists so the session driver can be exercised
//! against canned streams; [`HttpTransport`] is the real thing.
//!
//! Only a connect timeout is set. A backend that accepts the connection and
//! then stalls will hang the turn until the user starts a new one.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WidgetSettings;
use crate::reader::EventStream;

/// Boxed response body, chunk by chunk
pub type BoxByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>;

/// Outbound chat request body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Pages the backend should crawl for context
    pub urls: Vec<String>,
    /// The user's message
    pub query: String,
    /// Per-session identifier
    pub session_id: String,
    /// Company the assistant speaks for
    pub company_name: String,
}

/// Errors opening a chat stream
#[derive(Debug, Error)]
pub enum ClientError {
    /// Backend answered with a non-success status
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// Request could not be sent
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Opens a response stream for a chat request
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request` and return its event stream
    async fn open(&self, request: &ChatRequest) -> Result<EventStream<BoxByteStream>, ClientError>;
}

/// reqwest-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport for the configured endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &WidgetSettings) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .build()?;
        Ok(Self {
            endpoint: settings.endpoint().to_string(),
            http_client,
        })
    }

    /// Where requests go
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<EventStream<BoxByteStream>, ClientError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            session_id = %request.session_id,
            "Opening chat stream"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Chat backend rejected request");
            return Err(ClientError::Status(status.as_u16()));
        }

        let body: BoxByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string())),
        );
        Ok(EventStream::new(body))
    }
}

/// Boxes an in-memory body; handy for canned transports
pub fn byte_stream_from<I>(chunks: I) -> BoxByteStream
where
    I: IntoIterator<Item = Result<Vec<u8>, String>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEvent;

    #[test]
    fn test_request_serializes_to_wire_shape() {
        let request = ChatRequest {
            urls: vec!["https://docs.test".to_string()],
            query: "What is it?".to_string(),
            session_id: "session_abc123xyz_1700000000000".to_string(),
            company_name: "Acme".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "urls": ["https://docs.test"],
                "query": "What is it?",
                "session_id": "session_abc123xyz_1700000000000",
                "company_name": "Acme",
            })
        );
    }

    #[test]
    fn test_transport_uses_proxy_when_configured() {
        let mut settings = WidgetSettings::default();
        let direct = HttpTransport::new(&settings).unwrap();
        assert_eq!(direct.endpoint(), "http://localhost:8000/chat");

        settings.proxy_url = Some("http://127.0.0.1:3000/chat".to_string());
        let proxied = HttpTransport::new(&settings).unwrap();
        assert_eq!(proxied.endpoint(), "http://127.0.0.1:3000/chat");
    }

    #[tokio::test]
    async fn test_canned_body_decodes() {
        let body = byte_stream_from(vec![Ok(b"data: {\"type\":\"crawling\"}\n".to_vec())]);
        let mut events = EventStream::new(body);
        assert_eq!(events.next_event().await, Some(Ok(StreamEvent::Crawling)));
        assert_eq!(events.next_event().await, None);
    }

    #[test]
    fn test_client_error_display() {
        assert_eq!(
            ClientError::Status(502).to_string(),
            "backend returned HTTP 502"
        );
    }
}
