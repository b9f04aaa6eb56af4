//! Daemon Server Implementation
//!
//! The HTTP face of the generation pipeline:
//! - `POST /api/generate-content` validates a request and streams pipeline
//!   events back as `data:` frames
//! - `GET /health` reports liveness and the configured provider
//!
//! # Request Lifecycle
//!
//! ```text
//!   request ─► validate ─► spawn Pipeline::run ─► ChannelSink
//!                                                     │
//!   response body ◄── ReceiverStream ◄────────────────┘
//!        │
//!        └─ dropped (client gone) ─► DropGuard ─► CancellationToken
//! ```
//!
//! Every request gets its own task, token and sink; nothing mutable is
//! shared between requests.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use quill_core::{
    encode_payload, ChannelSink, GeminiProvider, GenerationRequest, Pacer, Pipeline,
    QuillConfig, RequestLimits, StreamEvent, TextProvider,
};

/// Events buffered between a pipeline and its response body
const EVENT_BUFFER: usize = 64;

/// Interval between SSE keep-alive comments
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Shared, read-only handler state
#[derive(Clone)]
pub struct AppState {
    /// Configured provider; `None` when no credential was found
    provider: Option<Arc<dyn TextProvider>>,
    /// Output pacing for every run
    pacer: Arc<dyn Pacer>,
    /// Request size limits
    limits: RequestLimits,
    /// Environment variable the credential is read from
    credential_env: String,
}

impl AppState {
    /// Assemble handler state
    pub fn new(
        provider: Option<Arc<dyn TextProvider>>,
        pacer: Arc<dyn Pacer>,
        limits: RequestLimits,
        credential_env: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            pacer,
            limits,
            credential_env: credential_env.into(),
        }
    }

    /// Build state from configuration, resolving the provider credential
    ///
    /// A missing credential is not fatal: the service starts and answers
    /// generation requests with an error until it is configured.
    pub fn from_config(config: &QuillConfig) -> Result<Self> {
        let provider: Option<Arc<dyn TextProvider>> = match config.credential() {
            Ok(credential) => {
                let provider = GeminiProvider::new(config.provider.clone(), credential)
                    .context("Failed to initialise provider HTTP client")?;
                Some(Arc::new(provider))
            }
            Err(e) => {
                warn!(error = %e, "Generation requests will be refused");
                None
            }
        };

        Ok(Self::new(
            provider,
            config.pacing.pacer(),
            config.limits,
            config.provider.credential_env.clone(),
        ))
    }
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/generate-content", post(generate_content))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// HTTP daemon
pub struct DaemonServer {
    /// Listen address
    bind: String,
    /// Handler state
    state: AppState,
}

impl DaemonServer {
    /// Create a new server from configuration
    pub fn new(config: &QuillConfig) -> Result<Self> {
        Ok(Self {
            bind: config.server.bind.clone(),
            state: AppState::from_config(config)?,
        })
    }

    /// Serve until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind)
            .await
            .with_context(|| format!("Failed to bind {}", self.bind))?;
        let local_addr: SocketAddr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            provider = self.state.provider.as_ref().map(|p| p.name()),
            "Listening"
        );

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        info!("Server stopped");
        Ok(())
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": state.provider.as_ref().map(|p| p.name()),
    }))
}

async fn generate_content(
    State(state): State<AppState>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;
    request
        .validate(&state.limits)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let provider = state
        .provider
        .clone()
        .ok_or_else(|| ApiError::missing_credential(&state.credential_env))?;

    let request_id = Uuid::new_v4();
    let span = info_span!("generate", %request_id, mode = %request.mode);
    span.in_scope(|| {
        info!(
            prompt_bytes = request.prompt.len(),
            context_bytes = request.context().map_or(0, str::len),
            "Generation started"
        );
    });

    let cancel = CancellationToken::new();
    // Dropping the response body (client disconnect) cancels the run
    let guard = cancel.clone().drop_guard();

    let (mut sink, rx) = ChannelSink::channel(EVENT_BUFFER);
    let pipeline = Pipeline::new(provider).with_pacer(Arc::clone(&state.pacer));
    tokio::spawn(
        async move {
            pipeline.run(&request, &mut sink, &cancel).await;
        }
        .instrument(span),
    );

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _cancel_on_drop = &guard;
        Ok::<Event, Infallible>(to_sse(&event))
    });

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response())
}

fn to_sse(event: &StreamEvent) -> Event {
    match encode_payload(event) {
        Ok(payload) => Event::default().data(payload),
        Err(e) => {
            debug!(error = %e, "Dropping unencodable event");
            Event::default().comment("dropped")
        }
    }
}

/// Error answered before any stream is opened
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid request",
            message: message.into(),
        }
    }

    fn from_rejection(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }

    fn missing_credential(env: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "API key not configured",
            message: format!("Please set your Google Gemini API key in the {env} environment variable"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = self.status.as_u16(), message = %self.message, "Request refused");
        let body = Json(json!({
            "error": self.error,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use quill_core::{NoPacing, ProviderError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;
    use tower::ServiceExt;

    struct FixedProvider(Result<&'static str, ProviderError>);

    #[async_trait]
    impl TextProvider for FixedProvider {
        fn name(&self) -> &str {
            "Fixed"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.0.clone().map(str::to_string)
        }
    }

    /// Provider whose call never finishes; records when the call is dropped
    #[derive(Default)]
    struct HangingProvider {
        entered: Notify,
        dropped: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TextProvider for HangingProvider {
        fn name(&self) -> &str {
            "Hanging"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            let _flag = SetOnDrop(Arc::clone(&self.dropped));
            self.entered.notify_one();
            std::future::pending().await
        }
    }

    fn app_with(provider: Option<Arc<dyn TextProvider>>) -> Router {
        router(AppState::new(
            provider,
            Arc::new(NoPacing),
            RequestLimits::default(),
            "GEMINI_API_KEY",
        ))
    }

    fn app(provider: Option<FixedProvider>) -> Router {
        app_with(provider.map(|p| Arc::new(p) as Arc<dyn TextProvider>))
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-content")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_provider() {
        let response = app(Some(FixedProvider(Ok("x"))))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "ok", "provider": "Fixed" })
        );

        let response = app(None)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!({ "status": "ok", "provider": null })
        );
    }

    #[tokio::test]
    async fn test_missing_credential_is_json_500() {
        let response = app(None)
            .oneshot(post(r#"{"prompt":"hi","mode":"chat"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["error"], "API key not configured");
        assert!(body["message"].as_str().unwrap().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_unknown_mode_is_rejected() {
        let response = app(Some(FixedProvider(Ok("x"))))
            .oneshot(post(r#"{"prompt":"hi","mode":"poem"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid request");
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() {
        let response = app(Some(FixedProvider(Ok("x"))))
            .oneshot(post(r#"{"prompt":"   ","mode":"chat"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "Prompt must not be empty"
        );
    }

    #[tokio::test]
    async fn test_chat_streams_word_frames() {
        let response = app(Some(FixedProvider(Ok("Hello world"))))
            .oneshot(post(r#"{"prompt":"hi","mode":"chat"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(
            body_text(response).await,
            "data: {\"content\":\"Hello \"}\n\ndata: {\"content\":\"world \"}\n\n"
        );
    }

    #[tokio::test]
    async fn test_provider_failure_ends_with_error_frame() {
        let response = app(Some(FixedProvider(Err(ProviderError::RateLimited))))
            .oneshot(post(r#"{"prompt":"hi","mode":"draft"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        let frames: Vec<_> = body.split("\n\n").filter(|f| !f.is_empty()).collect();

        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with("data: {\"step\":\"init\""));
        assert_eq!(
            frames[1],
            "data: {\"error\":true,\"content\":\"❌ Rate limit reached. Please wait a moment and try again.\"}"
        );
    }

    #[tokio::test]
    async fn test_client_disconnect_aborts_provider_call() {
        let provider = Arc::new(HangingProvider::default());
        let dropped = Arc::clone(&provider.dropped);

        let response = app_with(Some(Arc::clone(&provider) as Arc<dyn TextProvider>))
            .oneshot(post(r#"{"prompt":"hi","mode":"chat"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        provider.entered.notified().await;
        assert!(!dropped.load(Ordering::SeqCst));

        drop(response);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("provider call survived the disconnect");
    }
}
