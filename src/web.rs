use crate::{
    config::Config,
    engine::{Engine, EngineError, ErrorKind},
    messages::{RelatedCandidate, ScoredCandidate, TextUnit},
    sanitize::{self, MessageDraft, SanitizedMessage},
};
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    engine: Engine,
    operation_timeout: Duration,
}

pub fn router(engine: Engine, operation_timeout: Duration) -> Router {
    let shared_state = Arc::new(SharedState {
        engine,
        operation_timeout,
    });

    Router::new()
        .route("/api/health", get(health))
        .route("/api/duplicates", post(duplicates))
        .route("/api/related", post(related))
        .route("/api/tags", post(tags))
        .route("/api/render", post(render))
        .route("/api/messages/sanitize", post(sanitize_message))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => log::error!("failed to install signal handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::warn!("received Ctrl+C, shutting down"),
        _ = terminate => log::warn!("received SIGTERM, shutting down"),
    }
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let engine = Engine::from_config(&config.classifier)?;
    let app = router(
        engine,
        Duration::from_secs(config.server.operation_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen))?;
    log::info!("listening on {}", config.server.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(config).await })
}

#[derive(Debug)]
struct HttpError(EngineError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Parse | ErrorKind::Transport => {
                log::error!("{self:?}");
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::Timeout => {
                log::error!("{self:?}");
                StatusCode::GATEWAY_TIMEOUT
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<EngineError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Run an engine operation under the daemon's deadline.
async fn bounded<T, F>(limit: Duration, op: F) -> Result<T, HttpError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(EngineError::Timeout(limit).into()),
    }
}

#[derive(Debug, Deserialize)]
struct CompareRequest {
    content: String,
    #[serde(default)]
    candidates: Vec<TextUnit>,
}

#[derive(Debug, Deserialize)]
struct ContentRequest {
    content: String,
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RenderResponse {
    html: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn duplicates(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CompareRequest>,
) -> Result<Json<Vec<ScoredCandidate>>, HttpError> {
    log::debug!("duplicates: {} candidates", payload.candidates.len());

    let found = bounded(
        state.operation_timeout,
        state
            .engine
            .find_duplicates(&payload.content, &payload.candidates),
    )
    .await?;

    Ok(Json(found))
}

async fn related(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CompareRequest>,
) -> Result<Json<Vec<RelatedCandidate>>, HttpError> {
    log::debug!("related: {} candidates", payload.candidates.len());

    let found = bounded(
        state.operation_timeout,
        state
            .engine
            .find_related(&payload.content, &payload.candidates),
    )
    .await?;

    Ok(Json(found))
}

async fn tags(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ContentRequest>,
) -> Result<Json<TagsResponse>, HttpError> {
    let tags = bounded(
        state.operation_timeout,
        state.engine.suggest_tags(&payload.content),
    )
    .await?;

    Ok(Json(TagsResponse { tags }))
}

async fn render(Json(payload): Json<ContentRequest>) -> Json<RenderResponse> {
    Json(RenderResponse {
        html: sanitize::render(&payload.content),
    })
}

async fn sanitize_message(
    Json(draft): Json<MessageDraft>,
) -> Result<Json<SanitizedMessage>, HttpError> {
    Ok(Json(sanitize::validate_and_sanitize_message(&draft)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FanOut, PromptKind};
    use crate::tests::support::{engine_with, ScriptedGenerator};
    use axum::body::Body;
    use axum::http::Request;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn call(app: Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app_with(gen: ScriptedGenerator, timeout: Duration) -> Router {
        router(engine_with(&Arc::new(gen), FanOut::default()), timeout)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_with(ScriptedGenerator::new(vec![]), TIMEOUT);
        let req = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicates_endpoint() {
        let app = app_with(ScriptedGenerator::new(vec!["90"]), TIMEOUT);

        let (status, body) = call(
            app,
            "/api/duplicates",
            json!({
                "content": "Team meeting moved to Thursday",
                "candidates": [
                    {"id": 7, "title": "meeting", "content": "Team meeting moved to Thursday"},
                    {"id": "x", "title": "other", "content": "Lunch menu"}
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{"id": "7", "title": "meeting", "similarity": 95.0}])
        );
    }

    #[tokio::test]
    async fn test_related_endpoint() {
        let source = "Async runtimes in Rust";
        let topic_prompt = PromptKind::TopicExtraction { text: source }.prompt();
        let relevance = |text: &str| {
            PromptKind::TopicRelevance {
                topics: "rust, async",
                text,
            }
            .prompt()
        };
        let gen = ScriptedGenerator::by_prompt(HashMap::from([
            (topic_prompt, "rust\nasync".to_string()),
            (relevance("tokio scheduler notes"), "85".to_string()),
            (relevance("gardening tips"), "12".to_string()),
            (relevance("axum middleware"), "92".to_string()),
        ]));
        let app = app_with(gen, TIMEOUT);

        let (status, body) = call(
            app,
            "/api/related",
            json!({
                "content": source,
                "candidates": [
                    {"id": 1, "title": "tokio", "content": "tokio scheduler notes"},
                    {"id": 2, "title": "garden", "content": "gardening tips"},
                    {"id": 3, "title": "axum", "content": "axum middleware"}
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"id": "3", "title": "axum", "relevance": 92},
                {"id": "1", "title": "tokio", "relevance": 85}
            ])
        );
    }

    #[tokio::test]
    async fn test_tags_endpoint() {
        let app = app_with(ScriptedGenerator::new(vec!["tag1\ntag1\n\ntag2"]), TIMEOUT);

        let (status, body) = call(app, "/api/tags", json!({"content": "hello"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"tags": ["tag1", "tag2"]}));
    }

    #[tokio::test]
    async fn test_blank_content_is_bad_request() {
        let app = app_with(ScriptedGenerator::new(vec![]), TIMEOUT);

        let (status, body) = call(app, "/api/tags", json!({"content": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("content"));
    }

    #[tokio::test]
    async fn test_unparsable_reply_is_bad_gateway() {
        let app = app_with(ScriptedGenerator::new(vec!["abc"]), TIMEOUT);

        let (status, _) = call(
            app,
            "/api/duplicates",
            json!({
                "content": "same text here",
                "candidates": [{"id": 1, "title": "t", "content": "same text here"}]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        let gen = ScriptedGenerator::new(vec!["tag"]).with_delay(Duration::from_millis(500));
        let app = app_with(gen, Duration::from_millis(20));

        let (status, body) = call(app, "/api/tags", json!({"content": "hello"})).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(body["error"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_render_endpoint() {
        let app = app_with(ScriptedGenerator::new(vec![]), TIMEOUT);

        let (status, body) = call(
            app,
            "/api/render",
            json!({"content": "**hi** <script>alert(1)</script>"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let html = body["html"].as_str().unwrap();
        assert!(html.contains("<strong>hi</strong>"));
        assert!(!html.contains("script"));
        assert!(!html.contains("alert"));
    }

    #[tokio::test]
    async fn test_sanitize_endpoint() {
        let app = app_with(ScriptedGenerator::new(vec![]), TIMEOUT);

        let (status, body) = call(
            app,
            "/api/messages/sanitize",
            json!({"title": "<b>Hello</b>", "content": "text", "tags": ["A", "a"]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Hello");
        assert_eq!(body["tags"], json!(["a"]));

        let app = app_with(ScriptedGenerator::new(vec![]), TIMEOUT);
        let (status, _) = call(app, "/api/messages/sanitize", json!({"content": "x"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
