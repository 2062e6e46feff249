/// Authentication Routes
///
/// Thin handlers over the rotation engine: registration, login, token
/// refresh, logout, and current-user lookup. Generic over the store so
/// the same surface runs against Postgres or the in-memory backend.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{self, Claims};
use crate::configuration::AuthSettings;
use crate::error::AppError;
use crate::store::{SessionMeta, SessionStore, UserStore};
use crate::validators::is_valid_email;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Token pair response for login and refresh
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(pair: auth::TokenPair, settings: &AuthSettings) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: settings.access_token_ttl,
        }
    }
}

fn session_meta(req: &HttpRequest) -> SessionMeta {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    SessionMeta {
        ip: header("x-forwarded-for")
            .or_else(|| req.peer_addr().map(|a| a.ip().to_string())),
        user_agent: header("user-agent"),
    }
}

/// POST /auth/register
///
/// Creates the user; issues no tokens (login does). 409 on duplicate
/// email, 400 on a malformed address.
pub async fn register<S: UserStore>(
    form: web::Json<RegisterRequest>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)
        .ok_or_else(|| AppError::Validation("email has invalid format".to_string()))?;

    let user = auth::register(store.get_ref(), &email, &form.password, &form.name).await?;

    Ok(HttpResponse::Created().json(user))
}

/// POST /auth/login
///
/// Returns a fresh token pair and roots a session lineage keyed by the
/// refresh token's jti, recording caller IP and user agent. Unknown
/// email and wrong password produce the identical 401.
pub async fn login<S: SessionStore + UserStore>(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    store: web::Data<S>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)
        .ok_or_else(|| AppError::Validation("email has invalid format".to_string()))?;

    let pair = auth::login(
        store.get_ref(),
        settings.get_ref(),
        &email,
        &form.password,
        session_meta(&req),
    )
    .await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, settings.get_ref())))
}

/// POST /auth/refresh
///
/// Single-use rotation: the presented refresh token is verified,
/// validated against its session row, and atomically replaced by a
/// successor. Replay of a rotated or revoked token gets 401.
pub async fn refresh<S: SessionStore>(
    form: web::Json<RefreshRequest>,
    store: web::Data<S>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let pair = auth::refresh(store.get_ref(), settings.get_ref(), &form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResponse::new(pair, settings.get_ref())))
}

/// POST /auth/logout
///
/// Always 204: a missing body, missing token, or invalid token is an
/// already-logged-out state. Only a store outage responds otherwise.
pub async fn logout<S: SessionStore>(
    form: Option<web::Json<LogoutRequest>>,
    store: web::Data<S>,
    settings: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let token = form.and_then(|f| f.into_inner().refresh_token);

    auth::logout(store.get_ref(), settings.get_ref(), token.as_deref()).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/me
///
/// Requires a valid bearer access token; claims are injected by the
/// access-token middleware.
pub async fn me<S: UserStore>(
    claims: web::ReqData<Claims>,
    store: web::Data<S>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| crate::error::StoreError::NotFound(user_id.to_string()))?;

    Ok(HttpResponse::Ok().json(auth::UserView {
        id: user.id.to_string(),
        email: user.email,
        name: user.name,
        role: user.role,
    }))
}
