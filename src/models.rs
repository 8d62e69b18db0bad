use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::JwtKeys;
use crate::config::{Config, SessionMode};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub jwt: JwtKeys,
    pub session_ttl_seconds: i64,
    pub session_mode: SessionMode,
    pub cookie_secure: bool,
    pub drop_last_price: bool,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, cfg: &Config) -> Self {
        Self {
            db,
            jwt: JwtKeys::from_secret(&cfg.jwt_secret),
            session_ttl_seconds: cfg.session_ttl_seconds,
            session_mode: cfg.session_mode,
            cookie_secure: cfg.cookie_secure,
            drop_last_price: cfg.drop_last_price,
        }
    }
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub surname: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserIdResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AuthenticatedResponse {
    pub authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub password: String,
}
