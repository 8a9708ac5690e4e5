//! Central shared state, passed as `Arc<AppState>` to every handler —
//! mirroring the reference architecture's `AppState` shape, minus the
//! channel/WS/terminal subsystems this deployment has no counterpart for.

use std::sync::Arc;

use sqlx::PgPool;

use labtrace_agent::Tool;
use labtrace_core::config::LabtraceConfig;
use labtrace_core::db::Store;
use labtrace_ingest::ContentStore;
use labtrace_jobs::JobManager;
use labtrace_llm::AnthropicProvider;
use labtrace_schema::SchemaCache;
use labtrace_sessions::SessionManager;
use labtrace_stream::SseRegistry;
use labtrace_vision::FallbackProvider;

pub struct AppState {
    pub config: LabtraceConfig,
    pub store: Store,
    pub sse: Arc<SseRegistry>,
    pub sessions: Arc<SessionManager>,
    pub jobs: Arc<JobManager>,
    pub schema_cache: SchemaCache,
    pub tools: Vec<Box<dyn Tool>>,
    pub vision: Arc<FallbackProvider>,
    pub llm: Arc<AnthropicProvider>,
    pub content_store: Arc<ContentStore>,
}

impl AppState {
    /// `pool` is `store.user_scoped` — handlers that need the admin pool
    /// reach for `self.store.admin` directly.
    pub fn pool(&self) -> &PgPool {
        &self.store.user_scoped
    }
}
