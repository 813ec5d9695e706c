//! Process wiring for the query engine: tracing, config, client/store
//! construction, and the HTTP server that exposes §6's `query` entry point.
//! The graph store, embeddings, and knowledge graph itself are populated by
//! an out-of-scope ingestion subsystem (§1); this process only ever reads.

use std::sync::Arc;

use api::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::config::get_config;
use dispatcher::Dispatcher;
use embedding_client::{cache::CachedEmbeddingClient, OpenAiEmbeddingClient};
use graph_adapter::SurrealGraphStore;
use llm_client::OpenAiLlmClient;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Bounded LRU size for the query-embedding cache (§8: repeating a cached
/// query text must not re-call the embedding client). Not exposed as a
/// tunable — it only affects cache hit rate, never query semantics.
const QUERY_EMBEDDING_CACHE_CAPACITY: usize = 512;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let store = SurrealGraphStore::connect(
        &config.surrealdb_address,
        &config.surrealdb_username,
        &config.surrealdb_password,
        &config.surrealdb_namespace,
        &config.surrealdb_database,
    )
    .await?;

    let embedder = OpenAiEmbeddingClient::new(
        &config.openai_api_key,
        &config.openai_base_url,
        config.embedding_model.clone(),
        config.embedding_dim,
    );
    let cached_embedder = CachedEmbeddingClient::new(embedder, QUERY_EMBEDDING_CACHE_CAPACITY);

    let llm = OpenAiLlmClient::new(&config.openai_api_key, &config.openai_base_url, config.llm_model.clone());

    let dispatcher = Arc::new(Dispatcher::new(
        Box::new(store),
        cached_embedder,
        Box::new(llm),
        config.clone(),
    ));
    let api_state = ApiState::new(dispatcher);

    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(AppState { api: api_state });

    let serve_address = format!("0.0.0.0:{}", config.http_port);
    info!(address = %serve_address, "starting query engine");
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api: ApiState<OpenAiEmbeddingClient>,
}
