//! Axum route handlers for the streaming generation and chat endpoints.
//!
//! Failures after the response has committed to `text/event-stream` (key
//! resolution, upstream rejection) are reported as a single SSE error event,
//! never as an HTTP error status — matching what a browser EventSource can
//! actually observe.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::api_keys::resolve_api_key;
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::generation::prompts::{build_instruction, TestCaseFormat};
use crate::generation::relay::{sse_error, sse_response, HistoryDraft, HistoryKind};
use crate::llm_client::{LlmClient, CHAT_MAX_TOKENS, GENERATION_MAX_TOKENS};
use crate::projects::find_project_for_member;
use crate::requirements::fetch_requirement;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

fn default_format() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct GenerateStreamRequest {
    #[serde(default)]
    pub requirements: String,
    #[serde(default = "default_format")]
    pub format_type: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub example_case: String,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateForRequirementRequest {
    pub requirement_id: Uuid,
    #[serde(default = "default_format")]
    pub format_type: String,
    #[serde(default)]
    pub example_case: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub test_cases: String,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub requirement_id: Option<Uuid>,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /generate_test_cases_stream
///
/// Builds the instruction from free-form requirement text and relays the
/// model stream. No terminal sentinel on this endpoint.
pub async fn generate_test_cases_stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<GenerateStreamRequest>,
) -> Result<Response, AppError> {
    if request.requirements.trim().is_empty() {
        return Err(AppError::Validation("No requirements provided".to_string()));
    }

    let instruction = build_instruction(
        &request.requirements,
        TestCaseFormat::from(request.format_type.as_str()),
        &request.context,
        &request.example_case,
    );

    let mut draft = HistoryDraft::new(user.username.clone(), HistoryKind::Generation);
    draft.requirements = Some(request.requirements);
    draft.context = Some(request.context);
    draft.project_id = request.project_id;

    Ok(open_relay(
        &state,
        &user.username,
        request.project_id,
        &instruction,
        GENERATION_MAX_TOKENS,
        draft,
        false,
    )
    .await)
}

/// POST /generate_test_cases_for_requirement
///
/// Like the free-form endpoint, but the prompt comes from a stored
/// requirement (description as the requirement, title as context).
pub async fn generate_test_cases_for_requirement(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<GenerateForRequirementRequest>,
) -> Result<Response, AppError> {
    let requirement = fetch_requirement(&state.db, request.requirement_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Requirement not found".to_string()))?;

    find_project_for_member(&state.db, requirement.project_id, &user.username)
        .await?
        .ok_or_else(|| AppError::Forbidden("Access denied".to_string()))?;

    let instruction = build_instruction(
        &requirement.description,
        TestCaseFormat::from(request.format_type.as_str()),
        &requirement.title,
        &request.example_case,
    );

    let mut draft = HistoryDraft::new(user.username.clone(), HistoryKind::Generation);
    draft.project_id = Some(requirement.project_id);
    draft.requirement_id = Some(requirement.id);
    draft.requirement_title = Some(requirement.title);

    Ok(open_relay(
        &state,
        &user.username,
        Some(requirement.project_id),
        &instruction,
        GENERATION_MAX_TOKENS,
        draft,
        false,
    )
    .await)
}

/// POST /chat_with_assistant
///
/// Chat-style refinement of generated test cases. The stream always ends
/// with a `[DONE]` sentinel, error or not.
pub async fn chat_with_assistant(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let prompt = build_chat_context(&state.db, &user.username, &request).await?;

    let mut draft = HistoryDraft::new(user.username.clone(), HistoryKind::Chat);
    draft.message = Some(request.message);
    draft.test_cases = Some(request.test_cases);
    draft.project_id = request.project_id;
    draft.requirement_id = request.requirement_id;

    Ok(open_relay(
        &state,
        &user.username,
        request.project_id,
        &prompt,
        CHAT_MAX_TOKENS,
        draft,
        true,
    )
    .await)
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Resolves the caller's API key, opens the upstream stream, and wires it to
/// the relay. Every failure from here on is an SSE error event.
async fn open_relay(
    state: &AppState,
    username: &str,
    project_id: Option<Uuid>,
    prompt: &str,
    max_tokens: u32,
    draft: HistoryDraft,
    emit_done: bool,
) -> Response {
    let api_key = match resolve_api_key(
        &state.db,
        username,
        project_id,
        state.config.default_api_key.as_deref(),
    )
    .await
    {
        Ok(Some(key)) => key,
        Ok(None) => return sse_error("No API key available".to_string(), emit_done).into_response(),
        Err(e) => {
            tracing::error!("API key lookup failed: {e}");
            return sse_error("No API key available".to_string(), emit_done).into_response();
        }
    };

    let client = LlmClient::new(state.http.clone(), api_key);

    match client.stream(prompt, max_tokens).await {
        Ok(upstream) => sse_response(state.db.clone(), upstream, draft, emit_done).into_response(),
        Err(e) => sse_error(e.to_string(), emit_done).into_response(),
    }
}

/// Assembles the chat prompt: assistant preamble, any project/requirement
/// context the caller can actually access, the test cases under discussion,
/// the user message, and the serialized conversation history.
async fn build_chat_context(
    db: &PgPool,
    username: &str,
    request: &ChatRequest,
) -> Result<String, AppError> {
    let mut parts =
        vec!["You are a test case assistant helping to improve test cases.".to_string()];

    if let Some(project_id) = request.project_id {
        if let Some(project) = find_project_for_member(db, project_id, username).await? {
            parts.push(format!(
                "Project Context: {} - {}",
                project.name, project.context
            ));
        }
    }

    if let Some(requirement_id) = request.requirement_id {
        if let Some(requirement) = fetch_requirement(db, requirement_id).await? {
            let accessible =
                find_project_for_member(db, requirement.project_id, username).await?;
            if accessible.is_some() {
                parts.push(format!(
                    "Requirement: {}\n{}",
                    requirement.title, requirement.description
                ));
            }
        }
    }

    parts.push(format!("Current test cases:\n{}", request.test_cases));
    parts.push(format!("User message: {}", request.message));

    if !request.chat_history.is_empty() {
        let lines: Vec<String> = request
            .chat_history
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect();
        parts.push(format!("Conversation history:\n{}", lines.join("\n")));
    }

    Ok(parts.join("\n\n"))
}
