//! HTTP and WebSocket gateway for Parley.
//!
//! Exposes the REST API (auth, sessions, messages) and the per-session
//! real-time WebSocket channel. Built on Axum.
//!
//! Security layers applied:
//! - Bearer-JWT authentication on all /api routes except /api/auth
//! - CORS with an explicit origin list
//! - Request body size limit (1 MB)
//! - HTTP trace logging

pub mod api;
pub mod ws;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use parley_auth::TokenService;
use parley_chat::ChatPipeline;
use parley_core::error::{AuthError, ChatError, Error};
use parley_core::store::{MessageStore, SessionStore, UserStore};
use parley_core::user::UserId;
use parley_realtime::ConnectionRegistry;

/// Shared application state for the gateway.
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserStore>,
    pub pipeline: Arc<ChatPipeline>,
    pub registry: Arc<ConnectionRegistry>,
    pub tokens: TokenService,
}

pub type SharedState = Arc<AppState>;

/// The authenticated principal, attached by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

/// Build the full gateway router.
pub fn build_router(state: SharedState, cors_origins: &[String]) -> Router {
    let protected = Router::new()
        .route("/sessions", post(api::create_session).get(api::list_sessions))
        .route(
            "/sessions/{id}",
            get(api::get_session).delete(api::delete_session),
        )
        .route("/sessions/{id}/mode", patch(api::set_session_mode))
        .route("/sessions/{id}/archive", post(api::archive_session))
        .route(
            "/sessions/{id}/messages",
            get(api::list_messages).post(api::send_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let auth_routes = Router::new()
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login));

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/sessions/{id}", get(ws::session_ws_handler))
        .nest("/api", auth_routes.merge(protected))
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(cors_layer(cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn serve(
    state: SharedState,
    host: &str,
    port: u16,
    cors_origins: &[String],
) -> Result<(), Error> {
    let router = build_router(state, cors_origins);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {addr}: {e}")))?;

    info!("Gateway listening on http://{addr}");
    axum::serve(listener, router)
        .await
        .map_err(|e| Error::Internal(format!("Server error: {e}")))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "websocket": "enabled",
    }))
}

/// Verify the bearer token and attach the principal to the request.
async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<SharedState>,
    mut req: axum::extract::Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(Error::Auth(AuthError::InvalidToken))?;

    let user_id = state.tokens.verify(token).map_err(Error::Auth)?;
    req.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(req).await)
}

/// Extract the principal the middleware attached.
pub(crate) fn current_user(ext: &Extension<CurrentUser>) -> UserId {
    ext.0.0.clone()
}

// ── Error mapping ─────────────────────────────────────────────────────────

/// Wrapper turning domain errors into HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self(Error::Chat(e))
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(Error::Auth(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Chat(ChatError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Chat(ChatError::NotAuthorized { .. }) => {
                (StatusCode::FORBIDDEN, "Not authorized for this session".into())
            }
            Error::Chat(ChatError::SessionNotFound(_)) => {
                (StatusCode::NOT_FOUND, "Session not found".into())
            }
            Error::Auth(AuthError::UserExists(name)) => {
                (StatusCode::CONFLICT, format!("User already exists: {name}"))
            }
            Error::Auth(AuthError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials".into())
            }
            Error::Auth(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token".into()),
            Error::Provider(e) => {
                warn!(error = %e, "Provider error surfaced to client");
                (StatusCode::BAD_GATEWAY, "Completion provider unavailable".into())
            }
            Error::Store(e) => {
                warn!(error = %e, "Store error surfaced to client");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable".into())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use parley_core::completion::{CompletionClient, CompletionRequest};
    use parley_core::error::ProviderError;
    use parley_provider::CompletionService;
    use parley_store::SqliteStore;
    use tower::ServiceExt;

    struct StubClient;

    #[async_trait]
    impl CompletionClient for StubClient {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
            Ok(format!("reply to: {}", request.turns.last().unwrap().content))
        }
    }

    async fn test_state() -> SharedState {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        let registry = Arc::new(ConnectionRegistry::new());
        let completions = CompletionService::new(Arc::new(StubClient), "test-model", 100);
        let pipeline = Arc::new(
            ChatPipeline::new(store.clone(), store.clone(), completions)
                .with_notifier(registry.clone()),
        );
        Arc::new(AppState {
            sessions: store.clone(),
            messages: store.clone(),
            users: store,
            pipeline,
            registry,
            tokens: TokenService::new("test-secret", 60),
        })
    }

    fn router(state: SharedState) -> Router {
        build_router(state, &[])
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_auth(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn register_and_login(router: &Router, username: &str) -> String {
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/auth/register",
                serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "hunter2",
                }),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let router = router(test_state().await);
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let router = router(test_state().await);
        let response = router
            .oneshot(Request::get("/api/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_rejected() {
        let router = router(test_state().await);
        register_and_login(&router, "ada").await;

        let response = router
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"username": "ada", "password": "wrong"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let router = router(test_state().await);
        register_and_login(&router, "ada").await;

        let response = router
            .oneshot(post_json(
                "/api/auth/register",
                serde_json::json!({
                    "username": "ada",
                    "email": "ada2@example.com",
                    "password": "hunter2",
                }),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn full_session_and_send_flow() {
        let router = router(test_state().await);
        let token = register_and_login(&router, "ada").await;

        // create a teaching session
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({"mode": "teaching", "role": "Python Tutor"}),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let session = body_json(response).await;
        let session_id = session["id"].as_str().unwrap().to_string();
        assert_eq!(session["mode"], "teaching");
        assert_eq!(session["status"], "ACTIVE");

        // send a message
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/sessions/{session_id}/messages"),
                serde_json::json!({"content": "What is a variable?"}),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let pair = body_json(response).await;
        assert_eq!(pair["user_message"]["content"], "What is a variable?");
        assert_eq!(pair["assistant_message"]["role"], "assistant");
        assert_eq!(
            pair["assistant_message"]["content"],
            "reply to: What is a variable?"
        );

        // paginated history
        let response = router
            .clone()
            .oneshot(get_auth(
                &format!("/api/sessions/{session_id}/messages?page=1&limit=50"),
                &token,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listing = body_json(response).await;
        assert_eq!(listing["total"], 2);
        assert_eq!(listing["messages"].as_array().unwrap().len(), 2);

        // archive, then confirm the list filter sees it
        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/sessions/{session_id}/archive"),
                serde_json::json!({}),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(get_auth("/api/sessions?status=ARCHIVED", &token))
            .await
            .unwrap();
        let listing = body_json(response).await;
        assert_eq!(listing["sessions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let router = router(test_state().await);
        let token = register_and_login(&router, "ada").await;

        let response = router
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({"mode": "debate"}),
                Some(&token),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cross_user_session_access_is_forbidden() {
        let router = router(test_state().await);
        let ada = register_and_login(&router, "ada").await;
        let bob = register_and_login(&router, "bob").await;

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({"mode": "chat"}),
                Some(&ada),
            ))
            .await
            .unwrap();
        let session_id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(post_json(
                &format!("/api/sessions/{session_id}/messages"),
                serde_json::json!({"content": "let me in"}),
                Some(&bob),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .oneshot(get_auth(&format!("/api/sessions/{session_id}"), &bob))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delete_session_returns_no_content_then_404() {
        let router = router(test_state().await);
        let token = register_and_login(&router, "ada").await;

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/sessions",
                serde_json::json!({}),
                Some(&token),
            ))
            .await
            .unwrap();
        let session_id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/sessions/{session_id}"))
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(get_auth(&format!("/api/sessions/{session_id}"), &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
