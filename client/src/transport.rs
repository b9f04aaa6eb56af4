//! Generation Transport
//!
//! Separates "open a generation stream" from "read it": the session
//! controller only sees a stream of byte chunks, so tests can script the
//! bytes directly and the HTTP details stay here.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use quill_core::GenerationRequest;

use crate::error::ClientError;

/// Response body as it arrives
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// Opens generation streams
#[async_trait]
pub trait GenerationTransport: Send + Sync + 'static {
    /// Submit a request and return its response body
    ///
    /// A refusal before the stream opens is an error here, never an empty
    /// stream.
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, ClientError>;
}

/// JSON body of a pre-stream refusal
#[derive(Debug, Default, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Transport over HTTP to a quill daemon
#[derive(Clone, Debug)]
pub struct HttpTransport {
    /// Service base URL
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Generation endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}/api/generate-content",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl GenerationTransport for HttpTransport {
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, ClientError> {
        let url = self.endpoint();
        debug!(url = %url, mode = %request.mode, "Opening generation stream");

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: RejectionBody = response.json().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                error = body.error.as_deref().unwrap_or_default(),
                "Service refused request"
            );
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message: body
                    .message
                    .or(body.error)
                    .unwrap_or_else(|| ClientError::GENERIC_REJECTION.to_string()),
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::Read(e.to_string())))
            .boxed())
    }
}
