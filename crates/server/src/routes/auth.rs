use axum::{
    Json,
    body::Bytes,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{AppendHeaders, IntoResponse, Response},
};
use rusqlite::Connection;
use uuid::Uuid;

use garage_api::{
    AuthTokenResponse, LoginRequest, LogoutRequest, OkResponse, RefreshRequest, RegisterRequest,
    ServiceError, UserResponse, crypto, db,
    service::{self, AuthToken},
};

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::extract::JsonBody;
use crate::now_unix;
use crate::repository;
use crate::storage::{Db, is_constraint_violation, sq_execute, sq_query_opt, sq_query_row};

/// Cookie carrying the access token for browser page visits.
pub const AUTH_COOKIE: &str = "garage_token";

// ---------------------------------------------------------------------------
// Auth extractors
// ---------------------------------------------------------------------------

/// Authenticated user, from `Authorization: Bearer <jwt | gpat_...>` or the
/// `garage_token` cookie.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub profile: UserResponse,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let db = Db::from_ref(state);
        let config = AppConfig::from_ref(state);
        authenticate(&parts.headers, &db, &config)
    }
}

/// Like [`AuthUser`] but anonymous visitors are `None` instead of 401.
pub struct MaybeUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Self(Some(user))),
            Err(e) if e.status() == StatusCode::UNAUTHORIZED => Ok(Self(None)),
            Err(e) => Err(e),
        }
    }
}

fn unauthenticated() -> ApiErr {
    ApiErr::unauthorized("Unauthenticated.")
}

/// Value of a cookie from the `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name && !value.is_empty()).then(|| value.to_string())
        })
}

fn request_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    match bearer {
        Some(token) => Some(token.to_string()),
        None => cookie_value(headers, AUTH_COOKIE),
    }
}

fn authenticate(headers: &HeaderMap, db: &Db, config: &AppConfig) -> Result<AuthUser, ApiErr> {
    let token = request_token(headers).ok_or_else(unauthenticated)?;
    let conn = db.conn();
    let user_id = match service::resolve_auth_token(&token, &config.jwt_secret, now_unix()) {
        Ok(AuthToken::Jwt(user_id)) => user_id,
        Ok(AuthToken::Personal(plaintext)) => {
            repository::tokens::authenticate(&conn, &plaintext)?.ok_or_else(unauthenticated)?
        }
        Err(e) => {
            tracing::debug!("rejected access token: {e}");
            return Err(unauthenticated());
        }
    };
    let profile = repository::users::find(&conn, &user_id)?.ok_or_else(unauthenticated)?;
    Ok(AuthUser { user_id, profile })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session_cookie(config: &AppConfig, access_token: &str) -> AppendHeaders<[(header::HeaderName, String); 1]> {
    let secure = if config.secure_cookies() { "; Secure" } else { "" };
    AppendHeaders([(
        header::SET_COOKIE,
        format!(
            "{AUTH_COOKIE}={access_token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
            crypto::JWT_EXPIRY_SECS
        ),
    )])
}

fn clear_cookie(config: &AppConfig) -> AppendHeaders<[(header::HeaderName, String); 1]> {
    let secure = if config.secure_cookies() { "; Secure" } else { "" };
    AppendHeaders([(
        header::SET_COOKIE,
        format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{secure}"),
    )])
}

/// Sign an access token and persist a fresh refresh token.
fn issue_tokens(
    conn: &Connection,
    config: &AppConfig,
    user_id: &str,
    name: &str,
) -> Result<AuthTokenResponse, ApiErr> {
    let bundle = service::prepare_token_bundle(&config.jwt_secret, user_id, name, now_unix())?;
    sq_execute(conn, db::users::delete_expired_refresh_tokens(user_id))
        .map_err(ApiErr::from_db("prune refresh tokens"))?;
    sq_execute(
        conn,
        db::users::insert_refresh_token(
            &bundle.token_id,
            user_id,
            &bundle.token_hash,
            &bundle.expires_at,
        ),
    )
    .map_err(ApiErr::from_db("insert refresh token"))?;
    Ok(bundle.response)
}

fn email_taken() -> ApiErr {
    ServiceError::invalid("email", "The email has already been taken.").into()
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

/// POST /api/auth/register: create an account and sign in.
pub async fn register(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<Response, ApiErr> {
    if !config.registration_open {
        return Err(ApiErr::forbidden("registration is currently closed"));
    }
    let (name, email) = service::validate_registration(&req.name, &req.email, &req.password)?;

    {
        let conn = db.conn();
        let exists: bool = sq_query_row(&conn, db::users::email_exists(&email), |row| row.get(0))
            .map_err(ApiErr::from_db("check email"))?;
        if exists {
            return Err(email_taken());
        }
    }

    let password = req.password;
    let iterations = config.password_iterations;
    let password_hash =
        tokio::task::spawn_blocking(move || crypto::hash_password(&password, iterations))
            .await
            .map_err(ApiErr::from_db("hash password"))??;

    let user_id = Uuid::new_v4().to_string();
    let tokens = {
        let conn = db.conn();
        match sq_execute(&conn, db::users::insert(&user_id, &name, &email, &password_hash)) {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => return Err(email_taken()),
            Err(e) => return Err(ApiErr::from_db("insert user")(e)),
        }
        issue_tokens(&conn, &config, &user_id, &name)?
    };
    tracing::info!("registered user {user_id}");

    Ok((
        StatusCode::CREATED,
        session_cookie(&config, &tokens.access_token),
        Json(tokens),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Login / refresh / logout
// ---------------------------------------------------------------------------

/// POST /api/auth/login: email + password.
pub async fn login(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Response, ApiErr> {
    let invalid = || ApiErr::unauthorized("These credentials do not match our records.");
    let email = req.email.trim().to_lowercase();

    let found: Option<(String, String, String)> = {
        let conn = db.conn();
        sq_query_opt(&conn, db::users::get_by_email_for_login(&email), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("login lookup"))?
    };
    let Some((user_id, name, password_hash)) = found else {
        return Err(invalid());
    };

    let password = req.password;
    let verified =
        tokio::task::spawn_blocking(move || crypto::verify_password(&password, &password_hash))
            .await
            .map_err(ApiErr::from_db("verify password"))?;
    if !verified {
        return Err(invalid());
    }

    let tokens = {
        let conn = db.conn();
        issue_tokens(&conn, &config, &user_id, &name)?
    };
    Ok((session_cookie(&config, &tokens.access_token), Json(tokens)).into_response())
}

/// POST /api/auth/refresh: rotate a refresh token into a new bundle.
pub async fn refresh(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<Response, ApiErr> {
    let hash = crypto::hash_token(&req.refresh_token);
    let tokens = {
        let conn = db.conn();
        let found: Option<(String, String, String)> =
            sq_query_opt(&conn, db::users::lookup_refresh_token(&hash), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(ApiErr::from_db("lookup refresh token"))?;
        let Some((token_id, user_id, name)) = found else {
            return Err(ApiErr::unauthorized("invalid or expired refresh token"));
        };
        sq_execute(&conn, db::users::delete_refresh_token_by_id(&token_id))
            .map_err(ApiErr::from_db("consume refresh token"))?;
        issue_tokens(&conn, &config, &user_id, &name)?
    };
    Ok((session_cookie(&config, &tokens.access_token), Json(tokens)).into_response())
}

/// POST /api/auth/logout: drop the refresh token (if given) and the cookie.
pub async fn logout(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    body: Bytes,
) -> Result<Response, ApiErr> {
    let req: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiErr::bad_request(format!("invalid JSON: {e}")))?
    };
    if let Some(token) = req.refresh_token.filter(|t| !t.is_empty()) {
        let conn = db.conn();
        sq_execute(&conn, db::users::delete_refresh_token(&crypto::hash_token(&token)))
            .map_err(ApiErr::from_db("delete refresh token"))?;
    }
    Ok((clear_cookie(&config), Json(OkResponse { ok: true })).into_response())
}

/// GET /api/auth/me: the authenticated user.
pub async fn me(user: AuthUser) -> Json<UserResponse> {
    Json(user.profile)
}
