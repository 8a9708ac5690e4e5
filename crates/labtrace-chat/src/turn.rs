//! Per-turn state machine (§4.10): `idle -> counting -> initialized? ->
//! running -> {tool_loop*} -> ended`. One async function per turn,
//! generalizing the reference architecture's `process_message_non_streaming`
//! pipeline (load context -> build prompt -> tool loop -> persist ->
//! finalize) into a streaming variant driven by `labtrace-stream` SSE
//! emission at each step.

use sqlx::PgPool;
use tracing::{info, instrument, warn};

use labtrace_agent::{Tool, ToolContext};
use labtrace_core::config::ChatConfig;
use labtrace_core::types::SessionId;
use labtrace_llm::{ChatRequest, LlmProvider, StreamEvent, ToolCall, ToolDefinition};
use labtrace_protocol::ChatEvent;
use labtrace_schema::SchemaCache;
use labtrace_sessions::{ChatMessage, ChatRole, Session, SessionManager, ToolCallRequest};
use labtrace_stream::SseRegistry;

use crate::error::{ChatError, Result};
use crate::{patients, prompt, pruner, wire};

pub struct ChatDeps<'a> {
    pub pool: &'a PgPool,
    pub provider: &'a dyn LlmProvider,
    pub sse: &'a SseRegistry,
    pub sessions: &'a SessionManager,
    pub schema_cache: &'a SchemaCache,
    pub tools: &'a [Box<dyn Tool>],
    pub model: &'a str,
    pub config: &'a ChatConfig,
}

/// Outcome of one in-flight iteration of the tool loop.
enum StepOutcome {
    /// The LLM yielded a turn with zero tool calls — the message is done.
    Done,
    /// At least one tool call was executed; recurse with the same message id.
    Continue,
    /// The session vanished mid-turn (deleted, or patient no longer exists).
    SessionGone,
}

/// Run one full user-message turn. Never returns an `Err` that leaves the
/// SSE stream without a `message_end` for the message it started — every
/// exit path finalizes first, per step 7.
#[instrument(skip(deps, user_content), fields(session_id = %session_id))]
pub async fn run_turn(deps: &ChatDeps<'_>, session_id: SessionId, user_content: String) -> Result<()> {
    let session = deps.sessions.get(session_id).ok_or(ChatError::SessionNotFound)?;

    // Step 1: recount patients, never cached.
    let owner_patient_count = patients::owned_patient_count(deps.pool, session.user_id).await? as usize;
    if let Some(patient_id) = session.selected_patient_id() {
        if !patients::patient_exists(deps.pool, session.user_id, patient_id).await? {
            deps.sse
                .emit(
                    session_id,
                    ChatEvent::PatientUnavailable {
                        session_id,
                        selected_patient_id: patient_id,
                        message: "the selected patient is no longer available".to_string(),
                    },
                )
                .await;
            let _ = deps.sessions.delete(session_id);
            deps.sse.close(session_id, "patient unavailable").await;
            return Err(ChatError::PatientUnavailable);
        }
    }

    let schema = deps.schema_cache.get_snapshot(deps.pool).await?;

    // Step 2: initialize once.
    if session.mark_initialized() {
        let onboarding = session.take_onboarding_context();
        let system_prompt = prompt::build_system_prompt(&schema, session.selected_patient_id(), onboarding.as_ref());
        session.append_message(ChatMessage::system(system_prompt));
    }

    session.append_message(ChatMessage::user(user_content));
    session.reset_iteration();

    // Step 3: mint a fresh message id.
    let message_id = uuid::Uuid::now_v7().to_string();
    session.set_current_message_id(Some(message_id.clone()));
    deps.sse.set_current_message_id(session_id, Some(message_id.clone()));
    deps.sse.emit(session_id, ChatEvent::MessageStart { message_id: message_id.clone() }).await;

    let tool_defs = labtrace_agent::to_definitions(deps.tools);
    let scoped_patient_count = if deps.config.enforce_patient_scope { owner_patient_count } else { 0 };
    let result = run_tool_loop(deps, &session, session_id, &message_id, &tool_defs, &schema, scoped_patient_count).await;

    // Step 7: finalize unconditionally, before any session/stream teardown —
    // every message_start must see its message_end land while the sink is
    // still attached.
    deps.sse.emit(session_id, ChatEvent::MessageEnd { message_id: message_id.clone() }).await;
    if deps.sessions.peek(session_id).is_some() {
        session.set_current_message_id(None);
    }
    deps.sse.set_current_message_id(session_id, None);

    if matches!(result, Err(ChatError::IterationLimitExceeded)) {
        let _ = deps.sessions.delete(session_id);
        deps.sse.close(session_id, "iteration limit exceeded").await;
    }

    result
}

#[allow(clippy::too_many_arguments)]
async fn run_tool_loop(
    deps: &ChatDeps<'_>,
    session: &Session,
    session_id: SessionId,
    message_id: &str,
    tool_defs: &[ToolDefinition],
    schema: &labtrace_schema::SchemaSnapshot,
    owner_patient_count: usize,
) -> Result<()> {
    loop {
        match run_step(deps, session, session_id, message_id, tool_defs, schema, owner_patient_count).await? {
            StepOutcome::Done => return Ok(()),
            StepOutcome::Continue => continue,
            StepOutcome::SessionGone => return Ok(()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_step(
    deps: &ChatDeps<'_>,
    session: &Session,
    session_id: SessionId,
    message_id: &str,
    tool_defs: &[ToolDefinition],
    schema: &labtrace_schema::SchemaSnapshot,
    owner_patient_count: usize,
) -> Result<StepOutcome> {
    if deps.sessions.peek(session_id).is_none() {
        return Ok(StepOutcome::SessionGone);
    }

    let iteration = session.increment_iteration();
    if iteration > deps.config.max_iterations {
        warn!(session_id = %session_id, iteration, "chat: max iterations exceeded");
        deps.sse
            .emit(
                session_id,
                ChatEvent::Error {
                    message_id: Some(message_id.to_string()),
                    code: "ITERATION_LIMIT_EXCEEDED".to_string(),
                    message: "the conversation exceeded the maximum number of tool-loop iterations".to_string(),
                    debug: None,
                },
            )
            .await;
        return Err(ChatError::IterationLimitExceeded);
    }

    let pruned = pruner::prune(&session.messages(), deps.config.token_budget, deps.config.retained_messages);
    let system = pruned.first().map(|m| m.content.clone()).unwrap_or_default();
    let raw_messages = wire::to_raw_messages(&pruned);

    let request = ChatRequest {
        model: deps.model.to_string(),
        system,
        messages: Vec::new(),
        raw_messages: Some(raw_messages),
        max_tokens: 4096,
        tools: tool_defs.to_vec(),
    };

    let (tx, rx) = tokio::sync::mpsc::channel(128);
    let send_fut = deps.provider.send_stream(&request, tx);
    let read_fut = consume_stream(deps, session_id, message_id, rx);

    let (send_result, (assistant_text, tool_calls)) = tokio::join!(send_fut, read_fut);
    send_result.map_err(ChatError::from)?;

    session.append_message(ChatMessage {
        role: ChatRole::Assistant,
        content: assistant_text,
        tool_calls: tool_calls
            .iter()
            .map(|c| ToolCallRequest { id: c.id.clone(), name: c.name.clone(), arguments: c.input.clone() })
            .collect(),
        tool_call_id: None,
    });

    if tool_calls.is_empty() {
        return Ok(StepOutcome::Done);
    }

    for call in &tool_calls {
        if deps.sessions.peek(session_id).is_none() {
            return Ok(StepOutcome::SessionGone);
        }

        deps.sse
            .emit(
                session_id,
                ChatEvent::ToolStart {
                    message_id: message_id.to_string(),
                    tool: call.name.clone(),
                    params: call.input.clone(),
                },
            )
            .await;

        let ctx = ToolContext {
            pool: deps.pool,
            user_id: session.user_id,
            schema,
            session,
            owner_patient_count,
            sse: deps.sse,
            session_id,
            message_id: message_id.to_string(),
        };

        let started = std::time::Instant::now();
        let result = labtrace_agent::dispatch(deps.tools, &call.name, call.input.clone(), &ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        deps.sse
            .emit(
                session_id,
                ChatEvent::ToolComplete {
                    message_id: message_id.to_string(),
                    tool: call.name.clone(),
                    duration_ms,
                    error: result.is_error.then(|| result.content.clone()),
                },
            )
            .await;

        session.append_message(ChatMessage {
            role: ChatRole::Tool,
            content: result.content,
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
        });
    }

    Ok(StepOutcome::Continue)
}

async fn consume_stream(
    deps: &ChatDeps<'_>,
    session_id: SessionId,
    message_id: &str,
    mut rx: tokio::sync::mpsc::Receiver<StreamEvent>,
) -> (String, Vec<ToolCall>) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::TextDelta { text: delta } => {
                text.push_str(&delta);
                deps.sse
                    .emit(session_id, ChatEvent::Text { message_id: message_id.to_string(), content: delta })
                    .await;
            }
            StreamEvent::ToolUse { id, name, input } => tool_calls.push(ToolCall { id, name, input }),
            StreamEvent::Done { model, tokens_in, tokens_out, .. } => {
                info!(%model, tokens_in, tokens_out, "chat: stream done");
            }
            StreamEvent::Error { message } => {
                warn!(error = %message, "chat: stream error event");
            }
        }
    }

    (text, tool_calls)
}
