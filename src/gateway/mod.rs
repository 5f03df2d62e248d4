//! Axum-based HTTP gateway exposing authentication and the product API.
//!
//! - Request body size limits (64KB max)
//! - Request timeouts (30s)
//! - bcrypt and SQLite work runs on the blocking pool, never on the async workers
//! - Every token failure produces the same 401 body

use crate::auth::{
    strip_bearer, AuthError, Claims, CredentialStore, SqliteAccountRepository, TokenService,
};
use crate::config::Config;
use crate::inventory::{InventoryError, NewProduct, ProductStore};
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB).
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const UNAUTHORIZED_MSG: &str = "Unauthorized";
const INVALID_LOGIN_MSG: &str = "Invalid username or password";

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub products: Arc<ProductStore>,
    /// Whether `POST /api/auth/register` accepts new accounts.
    pub allow_registration: bool,
}

impl AppState {
    /// Open the SQLite database and build the auth services from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.storage.resolved_db_path()?;
        let conn = crate::db::open_shared(&db_path)?;
        let accounts = SqliteAccountRepository::with_shared(Arc::clone(&conn))?;
        let products = ProductStore::with_shared(conn)?;
        tracing::info!(path = %db_path.display(), "Database opened");

        let credentials = CredentialStore::new(
            Arc::new(accounts),
            config.auth.bcrypt_cost,
            config.auth.min_password_len,
        )
        .context("initialising credential store")?;
        let tokens = TokenService::new(config.auth.token_config())?;

        Ok(Self {
            credentials: Arc::new(credentials),
            tokens: Arc::new(tokens),
            products: Arc::new(products),
            allow_registration: config.auth.allow_registration,
        })
    }
}

/// Build the router with all routes and middleware layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/register", post(handle_auth_register))
        .route("/api/auth/login", post(handle_auth_login))
        .route("/api/auth/me", get(handle_auth_me))
        .route(
            "/api/products",
            get(handle_products_list).post(handle_products_create),
        )
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Run the HTTP gateway until Ctrl-C.
pub async fn run_gateway(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .context("parsing gateway listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "Gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// Concrete return type for JSON handlers.
type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    let message: String = message.into();
    (status, Json(serde_json::json!({"error": message})))
}

fn internal_error() -> ApiResponse {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Map a core error to its boundary response. Token failures and login
/// failures each collapse to a single body.
fn auth_error_response(err: &AuthError) -> ApiResponse {
    match err {
        AuthError::InvalidUsername(_) | AuthError::WeakPassword { .. } => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        AuthError::DuplicateUsername(_) => error_response(StatusCode::CONFLICT, err.to_string()),
        AuthError::InvalidCredentials => {
            error_response(StatusCode::UNAUTHORIZED, INVALID_LOGIN_MSG)
        }
        e if e.is_token_rejection() => {
            tracing::debug!(reason = %e, "Bearer token rejected");
            error_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MSG)
        }
        e => {
            tracing::error!(error = %e, "Auth operation failed");
            internal_error()
        }
    }
}

fn bad_json(e: &JsonRejection) -> ApiResponse {
    error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {e}"))
}

/// Validate the bearer token on a protected request.
fn require_claims(state: &AppState, headers: &HeaderMap) -> Result<Claims, ApiResponse> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer)
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MSG))?;

    state
        .tokens
        .validate(token)
        .map_err(|e| auth_error_response(&e))
}

/// Credentials body shared by register and login.
#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

/// GET /health: always public
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /api/auth/register: create a new account.
async fn handle_auth_register(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> ApiResponse {
    if !state.allow_registration {
        return error_response(StatusCode::FORBIDDEN, "Registration is disabled");
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return bad_json(&e),
    };

    let credentials = Arc::clone(&state.credentials);
    let result =
        tokio::task::spawn_blocking(move || credentials.register(&body.username, &body.password))
            .await;

    match result {
        Ok(Ok(account)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "status": "registered",
                "user_id": account.id,
                "username": account.username,
            })),
        ),
        Ok(Err(e)) => auth_error_response(&e),
        Err(e) => {
            tracing::error!(error = %e, "Registration task failed");
            internal_error()
        }
    }
}

/// POST /api/auth/login: verify credentials and issue a bearer token.
async fn handle_auth_login(
    State(state): State<AppState>,
    body: Result<Json<CredentialsBody>, JsonRejection>,
) -> ApiResponse {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return bad_json(&e),
    };

    let credentials = Arc::clone(&state.credentials);
    let verified =
        tokio::task::spawn_blocking(move || credentials.verify(&body.username, &body.password))
            .await;

    let account = match verified {
        Ok(Ok(account)) => account,
        Ok(Err(e)) => return auth_error_response(&e),
        Err(e) => {
            tracing::error!(error = %e, "Login task failed");
            return internal_error();
        }
    };

    match state.tokens.issue(&account) {
        Ok(issued) => {
            tracing::info!(user_id = %account.id, "Login succeeded");
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "token": issued.token,
                    "token_type": "Bearer",
                    "expires_at": issued.expires_at,
                })),
            )
        }
        Err(e) => auth_error_response(&e),
    }
}

/// GET /api/auth/me: the identity carried by the bearer token.
async fn handle_auth_me(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    match require_claims(&state, &headers) {
        Ok(claims) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "username": claims.sub,
                "expires_at": claims.exp,
            })),
        ),
        Err(resp) => resp,
    }
}

/// GET /api/products: list all products.
async fn handle_products_list(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    if let Err(resp) = require_claims(&state, &headers) {
        return resp;
    }

    let products = Arc::clone(&state.products);
    match tokio::task::spawn_blocking(move || products.list()).await {
        Ok(Ok(products)) => (StatusCode::OK, Json(serde_json::json!(products))),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Listing products failed");
            internal_error()
        }
        Err(e) => {
            tracing::error!(error = %e, "Product list task failed");
            internal_error()
        }
    }
}

/// POST /api/products: add a product.
async fn handle_products_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResponse {
    let claims = match require_claims(&state, &headers) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let Json(new) = match body {
        Ok(b) => b,
        Err(e) => return bad_json(&e),
    };

    let products = Arc::clone(&state.products);
    match tokio::task::spawn_blocking(move || products.create(new)).await {
        Ok(Ok(product)) => {
            tracing::info!(product_id = product.id, by = %claims.sub, "Product created");
            (StatusCode::CREATED, Json(serde_json::json!(product)))
        }
        Ok(Err(InventoryError::Invalid(reason))) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Ok(Err(InventoryError::Storage(e))) => {
            tracing::error!(error = %e, "Creating product failed");
            internal_error()
        }
        Err(e) => {
            tracing::error!(error = %e, "Product create task failed");
            internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Account, InMemoryAccountRepository, TokenConfig};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn token_config() -> TokenConfig {
        TokenConfig {
            signing_key: b"0123456789abcdef0123456789abcdef".to_vec(),
            issuer: "stockmaster".into(),
            audience: "stockmaster-clients".into(),
            lifetime: crate::auth::DEFAULT_TOKEN_TTL,
        }
    }

    fn test_state(allow_registration: bool) -> AppState {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        AppState {
            credentials: Arc::new(
                CredentialStore::new(Arc::new(InMemoryAccountRepository::new()), 4, 1).unwrap(),
            ),
            tokens: Arc::new(TokenService::new(token_config()).unwrap()),
            products: Arc::new(ProductStore::with_connection(conn).unwrap()),
            allow_registration,
        }
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn login(app: &Router, username: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"username": username, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[test]
    fn security_body_limit_is_64kb() {
        assert_eq!(MAX_BODY_SIZE, 65_536);
    }

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn token_errors_share_one_response() {
        let bodies: Vec<_> = [
            AuthError::InvalidSignature,
            AuthError::InvalidIssuerOrAudience,
            AuthError::Expired,
        ]
        .iter()
        .map(|e| {
            let (status, Json(body)) = auth_error_response(e);
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            body
        })
        .collect();
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let (status, Json(body)) =
            auth_error_response(&AuthError::Storage(anyhow::anyhow!("disk /dev/sda1 failed")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("sda1"));
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(test_state(true));
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let app = router(test_state(true));

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({"username": "alice", "password": "Secr3t!"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "alice");

        let token = login(&app, "alice", "Secr3t!").await;
        assert_eq!(token.split('.').count(), 3);

        let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = router(test_state(true));
        let creds = serde_json::json!({"username": "alice", "password": "Secr3t!"});

        let (first, _) = send(&app, "POST", "/api/auth/register", None, Some(creds.clone())).await;
        let (second, _) = send(&app, "POST", "/api/auth/register", None, Some(creds)).await;
        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn empty_username_is_bad_request() {
        let app = router(test_state(true));
        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({"username": "  ", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn registration_can_be_disabled() {
        let app = router(test_state(false));
        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(serde_json::json!({"username": "alice", "password": "pw"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = router(test_state(true));
        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"user": "alice"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = test_state(true);
        state.credentials.register("alice", "Secr3t!").unwrap();
        let app = router(state);

        let (wrong_status, wrong_body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"username": "alice", "password": "wrong"})),
        )
        .await;
        let (ghost_status, ghost_body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(serde_json::json!({"username": "nobody", "password": "Secr3t!"})),
        )
        .await;

        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(ghost_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_body, ghost_body);
    }

    #[tokio::test]
    async fn products_require_a_valid_token() {
        let state = test_state(true);
        let expired = state
            .tokens
            .issue_at(
                &Account {
                    id: "1".into(),
                    username: "alice".into(),
                    password_hash: String::new(),
                    created_at: 0,
                },
                1_000,
            )
            .unwrap();
        let app = router(state);

        let (missing, missing_body) = send(&app, "GET", "/api/products", None, None).await;
        let (garbage, garbage_body) =
            send(&app, "GET", "/api/products", Some("not.a.token"), None).await;
        let (old, old_body) =
            send(&app, "GET", "/api/products", Some(&expired.token), None).await;

        for status in [missing, garbage, old] {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        assert_eq!(missing_body, garbage_body);
        assert_eq!(garbage_body, old_body);
    }

    #[tokio::test]
    async fn products_create_and_list_with_token() {
        let state = test_state(true);
        state.credentials.register("alice", "Secr3t!").unwrap();
        let app = router(state);
        let token = login(&app, "alice", "Secr3t!").await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({"name": "Bolt", "quantity": 10, "price": 2.5})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Bolt");

        let (status, _) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({"name": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, listed) = send(&app, "GET", "/api/products", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["quantity"], 10);
        assert_eq!(listed[0]["price"], serde_json::json!(2.5));
    }

    #[tokio::test]
    async fn products_accept_the_web_client_body() {
        let state = test_state(true);
        state.credentials.register("alice", "Secr3t!").unwrap();
        let app = router(state);
        let token = login(&app, "alice", "Secr3t!").await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({"name": "Sensor", "quantity": 3, "price": 19.99})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["price"], serde_json::json!(19.99));

        let (status, listed) = send(&app, "GET", "/api/products", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["name"], "Sensor");
        assert_eq!(listed[0]["price"], serde_json::json!(19.99));
    }

    #[tokio::test]
    async fn products_reject_unknown_fields() {
        let state = test_state(true);
        state.credentials.register("alice", "Secr3t!").unwrap();
        let app = router(state);
        let token = login(&app, "alice", "Secr3t!").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/products",
            Some(&token),
            Some(serde_json::json!({"name": "Bolt", "price_cents": 250})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, listed) = send(&app, "GET", "/api/products", Some(&token), None).await;
        assert!(listed.as_array().unwrap().is_empty());
    }
}
