use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

mod app;
mod auth;
mod error;
mod http;
mod mapping_trigger;
mod state;

use labtrace_core::config::{LabtraceConfig, VisionProviderConfig};
use labtrace_core::db::Store;
use labtrace_ingest::ContentStore;
use labtrace_jobs::JobManager;
use labtrace_llm::AnthropicProvider;
use labtrace_schema::SchemaCache;
use labtrace_sessions::SessionManager;
use labtrace_stream::SseRegistry;
use labtrace_vision::{AnthropicVision, FallbackProvider, OpenAiVision, VisionProvider};

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "labtrace_gateway=info,tower_http=debug".into()))
        .init();

    let config_path = std::env::var("LABTRACE_CONFIG").ok();
    let config = LabtraceConfig::load(config_path.as_deref())?;

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(build_state(config).await?);

    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("labtrace gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn build_state(config: LabtraceConfig) -> anyhow::Result<AppState> {
    let store = Store::connect(&config.database).await?;

    let sse = Arc::new(SseRegistry::new());
    let sessions = SessionManager::new(config.session.ttl_secs);
    let sse_for_hook = sse.clone();
    sessions.on_expire(Arc::new(move |session_id| {
        let sse = sse_for_hook.clone();
        tokio::spawn(async move {
            sse.close(session_id, "session ttl expired").await;
        });
    }));
    sessions.clone().spawn_reaper();

    let jobs = JobManager::new(config.jobs.ttl_secs);
    jobs.clone().spawn_reaper();

    let schema_cache = SchemaCache::new();
    let tools = labtrace_agent::default_tools();

    let vision = Arc::new(FallbackProvider::new(
        build_vision_provider(&config.providers.vision_primary),
        build_vision_provider(&config.providers.vision_secondary),
    ));

    let llm = Arc::new(AnthropicProvider::new(config.providers.anthropic_api_key.clone(), None));

    let content_store = Arc::new(ContentStore::new(config.storage.content_root.clone()));

    Ok(AppState {
        config,
        store,
        sse,
        sessions,
        jobs,
        schema_cache,
        tools,
        vision,
        llm,
        content_store,
    })
}

fn build_vision_provider(cfg: &VisionProviderConfig) -> Arc<dyn VisionProvider> {
    match cfg.kind.as_str() {
        "openai" => Arc::new(OpenAiVision::new(cfg.api_key.clone(), cfg.model.clone(), cfg.max_payload_bytes)),
        _ => Arc::new(AnthropicVision::new(cfg.api_key.clone(), cfg.model.clone(), cfg.max_payload_bytes)),
    }
}
