//! REST handlers — auth, session CRUD, and message operations.

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tracing::info;

use parley_auth::{hash_password, verify_password};
use parley_core::error::{AuthError, ChatError};
use parley_core::message::MessageType;
use parley_core::session::{NewSession, Session, SessionId, SessionMode, SessionStatus};
use parley_core::user::{NewUser, UserId};

use crate::{ApiError, CurrentUser, SharedState, current_user};

// ── Auth ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn auth_response(
    state: &SharedState,
    user: parley_core::user::User,
) -> Result<Json<serde_json::Value>, ApiError> {
    let access_token = state.tokens.issue(&user.id).map_err(ApiError::from)?;
    let refresh_token = state.tokens.issue_refresh(&user.id).map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "bearer",
        "user": user,
    })))
}

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ChatError::Validation(
            "username, email, and password are required".into(),
        )
        .into());
    }

    if state.users.find_by_username(username).await.map_err(to_err)?.is_some() {
        return Err(AuthError::UserExists(username.to_string()).into());
    }

    let user = state
        .users
        .create(NewUser {
            username: username.to_string(),
            email: req.email.trim().to_string(),
            password_hash: hash_password(&req.password),
        })
        .await
        .map_err(to_err)?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, auth_response(&state, user)?))
}

pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .find_by_username(req.username.trim())
        .await
        .map_err(to_err)?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials.into());
    }

    auth_response(&state, user)
}

// ── Sessions ──────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct CreateSessionRequest {
    pub name: Option<String>,
    pub project_id: Option<String>,
    pub mode: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct SessionListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

fn parse_mode(s: &str) -> Result<SessionMode, ApiError> {
    SessionMode::try_parse(s).ok_or_else(|| {
        ChatError::Validation(format!(
            "Invalid mode '{s}'. Must be one of: chat, question, teaching, review"
        ))
        .into()
    })
}

pub async fn create_session(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = match req.mode.as_deref() {
        Some(s) => parse_mode(s)?,
        None => SessionMode::default(),
    };

    let session = state
        .sessions
        .create(NewSession {
            owner_id: current_user(&user),
            project_id: req.project_id,
            name: req.name,
            mode,
            role: req.role,
        })
        .await
        .map_err(to_err)?;

    info!(session_id = %session.id, mode = %session.mode, "Session created");
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn list_sessions(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Query(query): Query<SessionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some("ACTIVE") => Some(SessionStatus::Active),
        Some("ARCHIVED") => Some(SessionStatus::Archived),
        Some(other) => {
            return Err(ChatError::Validation(format!(
                "Invalid status '{other}'. Must be ACTIVE or ARCHIVED"
            ))
            .into());
        }
    };

    let sessions = state
        .sessions
        .list_for_owner(&current_user(&user), status)
        .await
        .map_err(to_err)?;

    Ok(Json(serde_json::json!({ "sessions": sessions })))
}

pub async fn get_session(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = owned_session(&state, &id, &current_user(&user)).await?;
    Ok(Json(session))
}

pub async fn set_session_mode(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<SetModeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = parse_mode(&req.mode)?;
    let session = owned_session(&state, &id, &current_user(&user)).await?;
    let updated = state.sessions.set_mode(&session.id, mode).await.map_err(to_err)?;
    info!(session_id = %updated.id, mode = %updated.mode, "Session mode changed");
    Ok(Json(updated))
}

pub async fn archive_session(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = owned_session(&state, &id, &current_user(&user)).await?;
    let updated = state
        .sessions
        .set_status(&session.id, SessionStatus::Archived)
        .await
        .map_err(to_err)?;
    info!(session_id = %updated.id, "Session archived");
    Ok(Json(updated))
}

pub async fn delete_session(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = owned_session(&state, &id, &current_user(&user)).await?;
    state.sessions.delete(&session.id).await.map_err(to_err)?;
    info!(session_id = %session.id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Messages ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub message_type: Option<String>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn send_message(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message_type = req
        .message_type
        .as_deref()
        .map(MessageType::parse)
        .unwrap_or_default();

    let pair = state
        .pipeline
        .send_message(
            &SessionId::from(&id),
            &current_user(&user),
            &req.content,
            message_type,
        )
        .await?;

    Ok(Json(pair))
}

pub async fn list_messages(
    State(state): State<SharedState>,
    user: Extension<CurrentUser>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = SessionId::from(&id);
    let caller = current_user(&user);
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    let messages = state
        .pipeline
        .list_messages(&session_id, &caller, page, limit)
        .await?;
    let total = state.pipeline.message_count(&session_id, &caller).await?;

    Ok(Json(serde_json::json!({
        "messages": messages,
        "total": total,
        "page": page,
        "limit": limit,
    })))
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Fetch a session and enforce ownership: 404 if absent, 403 if owned by
/// someone else.
async fn owned_session(
    state: &SharedState,
    id: &str,
    caller: &UserId,
) -> Result<Session, ApiError> {
    let session_id = SessionId::from(id);
    let session = state
        .sessions
        .get(&session_id)
        .await
        .map_err(to_err)?
        .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))?;

    if &session.owner_id != caller {
        return Err(ChatError::NotAuthorized {
            session_id: id.to_string(),
            user_id: caller.0.clone(),
        }
        .into());
    }

    Ok(session)
}

fn to_err(e: parley_core::error::StoreError) -> ApiError {
    ApiError(e.into())
}
