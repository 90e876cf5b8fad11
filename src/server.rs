//! The chat service surface: request state machine, axum routes, and
//! fail-fast startup wiring.
//!
//! A chat request moves through `RECEIVED → EMBEDDING_QUERY → RETRIEVING
//! → COMPOSING → GENERATING → RESPONDED`; any collaborator failure drops
//! it into the terminal `FAILED` state, which yields a uniform
//! user-facing error and keeps only the user's own message in the
//! session history.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::composer::AnswerComposer;
use crate::config::AppConfig;
use crate::embeddings::{
    EmbeddingProvider, HttpEmbeddingProvider, MockEmbeddingProvider, ProviderEmbeddingModel,
};
use crate::generation::GroqCompletionProvider;
use crate::prompt::PersonaPolicy;
use crate::retrieval::Retriever;
use crate::retry::RetryPolicy;
use crate::session::{ConversationRegistry, Turn};
use crate::stores::{Backend, SqliteChunkStore};
use crate::types::SolaceError;

/// Everything a request handler needs, constructed once at startup and
/// passed explicitly rather than through ambient globals.
pub struct ChatService {
    pub retriever: Retriever,
    pub composer: AnswerComposer,
    pub registry: ConversationRegistry,
}

pub type SharedChatService = Arc<ChatService>;

/// The fallible phases of a chat request; composing itself is local
/// string assembly and cannot fail. Logged with failures, never exposed
/// to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    EmbeddingQuery,
    Retrieving,
    Generating,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::EmbeddingQuery => "embedding_query",
            Phase::Retrieving => "retrieving",
            Phase::Generating => "generating",
        }
    }
}

fn default_session_id() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub context_sources: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Uniform apology for any serving-time failure; causes stay in the logs.
const DEGRADED_MESSAGE: &str =
    "An error occurred while processing your request. Please try again.";

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn chat_post(
    State(service): State<SharedChatService>,
    Json(request): Json<ChatRequest>,
) -> Response {
    // Boundary decision: empty or whitespace-only messages are rejected
    // before any external call and leave history untouched.
    if request.message.trim().is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "message must not be empty",
        );
    }

    let session = service.registry.session(&request.session_id);
    // Holding the session lock across the whole turn serializes
    // same-session requests; other sessions proceed concurrently.
    let mut history_guard = session.lock().await;
    let history = history_guard.snapshot();
    // A failed turn still records that the user asked.
    history_guard.append(Turn::user(request.message.clone()));

    let result: Result<_, (Phase, SolaceError)> = async {
        let query_vector = service
            .retriever
            .embed_query(&request.message)
            .await
            .map_err(|err| (Phase::EmbeddingQuery, err))?;

        let retrieved = service
            .retriever
            .lookup(&query_vector)
            .await
            .map_err(|err| (Phase::Retrieving, err))?;

        service
            .composer
            .compose(&request.message, &retrieved, &history)
            .await
            .map_err(|err| (Phase::Generating, err))
    }
    .await;

    match result {
        Ok(composed) => {
            history_guard.append(Turn::assistant(composed.answer.clone()));
            tracing::info!(
                session_id = %request.session_id,
                sources = composed.sources.len(),
                "chat turn responded"
            );
            Json(ChatResponse {
                response: composed.answer,
                context_sources: composed.sources,
            })
            .into_response()
        }
        Err((phase, err)) => {
            // No fabricated assistant turn for a failed exchange.
            tracing::error!(
                session_id = %request.session_id,
                phase = phase.label(),
                error = %err,
                "chat turn failed"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, DEGRADED_MESSAGE)
        }
    }
}

/// Method guidance only; the functional path is POST.
async fn chat_get() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Please use POST to interact with this endpoint."
    }))
}

async fn health() -> &'static str {
    "ok"
}

/// Builds the application router around a constructed service.
pub fn build_router(service: SharedChatService, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/chat", get(chat_get).post(chat_post))
        .route("/health", get(health))
        .layer(cors)
        .with_state(service)
}

/// Starts the chat server, failing fast before binding when the index or
/// credentials are missing.
pub async fn run(config: AppConfig) -> Result<(), SolaceError> {
    let api_key = config.require_credentials()?.to_string();

    let client = reqwest::Client::builder()
        .user_agent(concat!("solace-rag/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .use_rustls_tls()
        .build()?;
    let retry = RetryPolicy::new(config.retry_attempts, config.retry_base_delay);

    let embedder: Arc<dyn EmbeddingProvider> = match &config.embeddings_url {
        Some(url) => Arc::new(HttpEmbeddingProvider::new(
            client.clone(),
            url.clone(),
            config.embeddings_model.clone(),
            config.embeddings_dimensions,
            retry,
        )),
        None => Arc::new(MockEmbeddingProvider::new()),
    };

    let model = ProviderEmbeddingModel::new(embedder.clone());
    let db_path = config.index_db_path();
    let store = SqliteChunkStore::open_existing(&db_path, &model).await?;
    let entries = store.count().await?;
    tracing::info!(path = %db_path.display(), entries, "index loaded");
    let store: Arc<dyn Backend> = Arc::new(store);

    let completions = Arc::new(GroqCompletionProvider::new(
        client,
        config.groq_url.clone(),
        api_key,
        config.groq_model.clone(),
        retry,
    ));

    let service = Arc::new(ChatService {
        retriever: Retriever::new(embedder, store, config.retrieval_k),
        composer: AnswerComposer::new(PersonaPolicy::default(), completions),
        registry: ConversationRegistry::new(),
    });

    let router = build_router(service, &config.allowed_origins);
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "serving chat endpoint");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
    }
}
