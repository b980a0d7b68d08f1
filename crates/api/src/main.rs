mod config;
mod metrics;

use axum::{
    Json, Router,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use config::AppConfig;
use metrics::{Metrics, MetricsSnapshot};

use extract::CohereClient;
use index::{BookIndexer, BookInfo, CharacterStats, EmbedClient, GraphLinker, IndexReport};
use ingest::TextExtractor;
use query::{ChatEngine, RetrievalMode};

const CONNECT_ATTEMPTS: usize = 3;

/// Everything that needs a live store connection. Absent when startup could
/// not reach Neo4j; requests then short-circuit with the same error instead
/// of retrying per-request.
struct System {
    graph: neo4rs::Graph,
    linker: GraphLinker,
    indexer: BookIndexer<CohereClient, EmbedClient>,
    engine: ChatEngine<CohereClient, EmbedClient>,
}

#[derive(Clone)]
struct AppState {
    system: Option<Arc<System>>,
    metrics: Arc<Metrics>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    let state = build_state(&config).await;

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/characters", get(list_characters))
        .route("/api/character/:name", get(character_info))
        .route("/api/book", get(book_info))
        .route("/api/chat", post(chat))
        .route("/api/index", post(index_book))
        .route("/api/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str())
        .await
        .expect("Failed to bind server address");

    info!(addr = %config.bind_addr, "Server listening");

    axum::serve(listener, app).await.expect("Server error");
}

async fn build_state(config: &AppConfig) -> AppState {
    let metrics = Metrics::new();

    let Some(graph) = connect_neo4j(config).await else {
        error!("Could not reach Neo4j; all data endpoints will report the system unavailable");
        return AppState {
            system: None,
            metrics,
        };
    };

    let oracle = CohereClient::new(
        config.cohere_base_url.clone(),
        config.cohere_api_key.clone(),
        config.chat_model.clone(),
    );
    let embedder = EmbedClient::new(
        config.cohere_base_url.clone(),
        config.cohere_api_key.clone(),
        config.embed_model.clone(),
    );

    let indexer = BookIndexer::new(graph.clone(), oracle.clone(), embedder.clone());
    if let Err(e) = indexer.init().await {
        error!(error = %e, "Failed to initialize store schema");
        return AppState {
            system: None,
            metrics,
        };
    }

    let engine = ChatEngine::new(graph.clone(), oracle, embedder);
    let linker = GraphLinker::new(graph.clone());

    info!("System initialized");

    AppState {
        system: Some(Arc::new(System {
            graph,
            linker,
            indexer,
            engine,
        })),
        metrics,
    }
}

/// Store connection with exponential backoff. Connection failure is fatal for
/// data endpoints but the server still comes up to report it.
async fn connect_neo4j(config: &AppConfig) -> Option<neo4rs::Graph> {
    let mut backoff = Duration::from_secs(1);

    for attempt in 1..=CONNECT_ATTEMPTS {
        match neo4rs::Graph::new(
            config.neo4j_uri.as_str(),
            config.neo4j_user.as_str(),
            config.neo4j_password.as_str(),
        )
        .await
        {
            Ok(graph) => return Some(graph),
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = CONNECT_ATTEMPTS,
                    backoff_ms = backoff.as_millis(),
                    error = %e,
                    "Neo4j connection failed"
                );
                if attempt < CONNECT_ATTEMPTS {
                    sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    None
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn system(state: &AppState) -> Result<&Arc<System>, ApiError> {
    state.system.as_ref().ok_or_else(|| {
        api_error(StatusCode::SERVICE_UNAVAILABLE, "System not initialized")
    })
}

#[derive(Serialize)]
struct HealthResponse {
    neo4j: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let neo4j = match &state.system {
        Some(system) => match system.graph.run(neo4rs::query("RETURN 1")).await {
            Ok(_) => "ok".to_string(),
            Err(e) => format!("error: {}", e),
        },
        None => "uninitialized".to_string(),
    };

    Json(HealthResponse { neo4j })
}

#[derive(Serialize)]
struct CharactersResponse {
    characters: Vec<String>,
    total: usize,
}

async fn list_characters(
    State(state): State<AppState>,
) -> Result<Json<CharactersResponse>, ApiError> {
    let system = system(&state)?;

    let characters = system.linker.list_characters().await.map_err(|e| {
        error!(error = %e, "Failed to list characters");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let total = characters.len();
    Ok(Json(CharactersResponse { characters, total }))
}

async fn character_info(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<extract::CharacterProfile>, ApiError> {
    let system = system(&state)?;

    let profile = system.linker.get_character(&name).await.map_err(|e| {
        error!(character = %name, error = %e, "Failed to load character");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    match profile {
        Some(profile) => Ok(Json(profile)),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown character: {}", name),
        )),
    }
}

async fn book_info(State(state): State<AppState>) -> Result<Json<BookInfo>, ApiError> {
    let system = system(&state)?;

    let info = system.linker.book_info().await.map_err(|e| {
        error!(error = %e, "Failed to load book info");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    match info {
        Some(info) => Ok(Json(info)),
        None => Err(api_error(StatusCode::NOT_FOUND, "No book indexed yet")),
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    character: Option<String>,
    message: Option<String>,
    #[serde(default)]
    mode: RetrievalMode,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    character: String,
    mode: &'static str,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let system = match system(&state) {
        Ok(system) => system,
        Err(e) => {
            state.metrics.record_request(false);
            return Err(e);
        }
    };

    let (Some(character), Some(message)) = (req.character, req.message) else {
        state.metrics.record_request(false);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Character and message required",
        ));
    };

    if character.trim().is_empty() || message.trim().is_empty() {
        state.metrics.record_request(false);
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Character and message required",
        ));
    }

    let started = Instant::now();
    let response = system.engine.chat(&character, &message, req.mode).await;

    state.metrics.record_request(true);
    state.metrics.record_chat(started.elapsed());

    Ok(Json(ChatResponse {
        response,
        character,
        mode: req.mode.as_str(),
    }))
}

#[derive(Deserialize)]
struct IndexRequest {
    path: String,
    title: String,
    author: Option<String>,
}

async fn index_book(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexReport>, ApiError> {
    let system = system(&state)?;

    let path = Path::new(&req.path);
    if !path.exists() {
        return Err(api_error(StatusCode::NOT_FOUND, "Book file not found"));
    }

    let text = ingest::PlainTextExtractor
        .extract(path)
        .await
        .map_err(|e| {
            error!(path = %req.path, error = %e, "Failed to read book file");
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        })?;

    let author = req.author.as_deref().unwrap_or("Unknown");

    let started = Instant::now();
    let report = system
        .indexer
        .index_book(&text, &req.title, author)
        .await
        .map_err(|e| {
            error!(book = %req.title, error = %e, "Indexing failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    state.metrics.record_index(started.elapsed(), &report);

    Ok(Json(report))
}

#[derive(Serialize)]
struct StatsResponse {
    metrics: MetricsSnapshot,
    characters: CharacterStats,
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let system = system(&state)?;

    let characters = system.linker.character_statistics().await.map_err(|e| {
        error!(error = %e, "Failed to load character statistics");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(StatsResponse {
        metrics: state.metrics.snapshot(),
        characters,
    }))
}
