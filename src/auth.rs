use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar};
use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{error::AppError, models::user::User, state::AppState};

pub const SESSION_COOKIE: &str = "ridepool_session";

const SESSION_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub phone: String,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid,
            username: user.username,
            email: user.email,
            phone: user.phone,
        }
    }
}

/// Session lookup result for handlers. Extracted from the private session
/// cookie on every request; absent or expired sessions yield `None`.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .map_err(|never| -> AppError { match never {} })?;
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };
        Ok(Self(session_user(state, cookie.value()).await?))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }
}

async fn session_user(
    state: &AppState,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"SELECT u.id, u.uuid, u.username, u.email, u.phone, u.password_hash, u.created_at, u.last_login_at
           FROM users u
           JOIN sessions s ON s.user_id = u.id
           WHERE s.id = ? AND (s.expires_at IS NULL OR s.expires_at > ?)"#,
    )
    .bind(session_id)
    .bind(Utc::now())
    .fetch_optional(&state.db)
    .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(session_id)
        .execute(&state.db)
        .await?;

    Ok(Some(user.into()))
}

pub async fn register_user(
    state: &AppState,
    username: &str,
    email: &str,
    phone: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let username = username.trim();
    let email = email.trim();
    let phone = phone.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("a username is required".into()));
    }
    if email.is_empty() {
        return Err(AppError::BadRequest("an email address is required".into()));
    }
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "the password must be at least 8 characters".into(),
        ));
    }

    let taken: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_one(&state.db)
            .await?;
    if taken > 0 {
        return Err(AppError::BadRequest(
            "that username or email is already registered".into(),
        ));
    }

    let user_uuid = Uuid::new_v4().to_string();
    let password_hash = hash_password(password)?;
    let now = Utc::now();

    sqlx::query(
        r#"INSERT INTO users (uuid, username, email, phone, password_hash, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user_uuid)
    .bind(username)
    .bind(email)
    .bind(phone)
    .bind(&password_hash)
    .bind(now)
    .execute(&state.db)
    .await?;

    let user = sqlx::query_as::<_, User>(
        r#"SELECT id, uuid, username, email, phone, password_hash, created_at, last_login_at
           FROM users WHERE uuid = ?"#,
    )
    .bind(&user_uuid)
    .fetch_one(&state.db)
    .await?;

    debug!(user = %user.username, "registered new user");
    Ok(user.into())
}

/// Checks credentials against the stored argon2 hash. The identifier may be
/// a username or an email address.
pub async fn authenticate_user(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<AuthenticatedUser, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"SELECT id, uuid, username, email, phone, password_hash, created_at, last_login_at
           FROM users WHERE username = ? OR email = ?"#,
    )
    .bind(identifier.trim())
    .bind(identifier.trim())
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !verify_password(password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(user.into())
}

pub async fn create_session(state: &AppState, user_id: i64) -> Result<String, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO sessions (id, user_id, created_at, last_seen_at, expires_at)
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .bind(now + Duration::days(SESSION_LIFETIME_DAYS))
    .execute(&state.db)
    .await?;
    Ok(session_id)
}

pub async fn destroy_session(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(session_id)
        .execute(&state.db)
        .await?;
    Ok(())
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session_id: &str) -> PrivateCookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, session_id.to_string()))
            .path("/")
            .http_only(true),
    )
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}
