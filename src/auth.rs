use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng as SaltRng},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Bytes of entropy behind a tracked session id.
const SESSION_ID_BYTES: usize = 32;

/// True when `candidate` matches the PHC string kept in `users.password`.
/// A row whose stored value is not a PHC string never matches.
pub fn verify_password(candidate: &str, phc: &str) -> bool {
    PasswordHash::new(phc).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    })
}

/// PHC string for a signup password, salted per user.
pub fn hash_password(plain: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut SaltRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("could not hash password: {e}"))
}

/// Fresh `jti` for a token issued in tracked mode.
pub fn generate_session_id() -> String {
    let mut raw = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut raw);
    URL_SAFE_NO_PAD.encode(raw)
}

/// Key under which a `jti` is kept in `session_token`; the id itself is never stored.
pub fn hash_session_id(session_id: &str) -> String {
    hex::encode(Sha256::digest(session_id.as_bytes()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Sign an HS256 token for `user_id` that expires `ttl_seconds` from now.
pub fn issue_token(
    keys: &JwtKeys,
    user_id: Uuid,
    ttl_seconds: i64,
    session_id: Option<String>,
) -> Result<IssuedToken, String> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(ttl_seconds);
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: session_id,
    };

    encode(&Header::default(), &claims, &keys.encoding)
        .map(|token| IssuedToken { token, expires_at })
        .map_err(|e| format!("jwt encode error: {e}"))
}

/// Verify signature and expiry. Any failure yields `None`; callers treat that as anonymous.
pub fn decode_token(keys: &JwtKeys, token: &str) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    match decode::<Claims>(token, &keys.decoding, &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!("rejected session token: {e}");
            None
        }
    }
}
