use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use headers::{Authorization, Cookie, authorization::Bearer};
use uuid::Uuid;

use crate::auth::{decode_token, hash_session_id};
use crate::config::SessionMode;
use crate::error::ApiError;
use crate::models::AppState;

pub const SESSION_COOKIE: &str = "jwt";

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    /// Only set in tracked mode.
    pub session_token_id: Option<Uuid>,
}

/// Outcome of looking at the request's session token. Never rejects for a bad token.
#[derive(Debug, Clone)]
pub enum Session {
    Anonymous,
    Authenticated(AuthContext),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

pub fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age_seconds}; HttpOnly{}",
        cookie_attrs(secure)
    )
}

pub fn cleared_session_cookie(secure: bool) -> String {
    format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly{}", cookie_attrs(secure))
}

fn cookie_attrs(secure: bool) -> &'static str {
    // cross-site front ends need SameSite=None, which browsers only accept with Secure
    if secure { "; Secure; SameSite=None" } else { "; SameSite=Lax" }
}

async fn bearer_or_cookie(parts: &mut Parts, state: &AppState) -> Option<String> {
    if let Ok(TypedHeader(cookies)) =
        TypedHeader::<Cookie>::from_request_parts(parts, state).await
    {
        if let Some(token) = cookies.get(SESSION_COOKIE).filter(|t| !t.is_empty()) {
            return Some(token.to_string());
        }
    }

    TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
        .await
        .ok()
        .map(|TypedHeader(authz)| authz.token().to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let Some(token) = bearer_or_cookie(parts, state).await else {
                return Ok(Session::Anonymous);
            };
            let Some(claims) = decode_token(&state.jwt, &token) else {
                return Ok(Session::Anonymous);
            };

            let session_token_id = match state.session_mode {
                SessionMode::Stateless => None,
                SessionMode::Tracked => {
                    let Some(jti) = claims.jti.as_deref() else {
                        return Ok(Session::Anonymous);
                    };

                    let row: Option<SessionLookupRow> = sqlx::query_as::<_, SessionLookupRow>(
                        r#"
                        SELECT session_token_id
                        FROM session_token
                        WHERE session_token_hash = $1
                          AND user_id = $2
                          AND revoked_at IS NULL
                          AND expires_at > now()
                        "#,
                    )
                    .bind(hash_session_id(jti))
                    .bind(claims.sub)
                    .fetch_optional(&state.db)
                    .await
                    .map_err(ApiError::db)?;

                    match row {
                        Some(r) => Some(r.session_token_id),
                        None => return Ok(Session::Anonymous),
                    }
                }
            };

            Ok(Session::Authenticated(AuthContext {
                user_id: claims.sub,
                session_token_id,
            }))
        }
    }
}

/// Route layer for everything that touches prices: anonymous callers get 401
/// before the handler runs.
pub async fn require_session(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();

    let ctx = match Session::from_request_parts(&mut parts, &state).await {
        Ok(Session::Authenticated(ctx)) => ctx,
        Ok(Session::Anonymous) => {
            tracing::debug!(path = %parts.uri.path(), "rejected anonymous request");
            return ApiError::not_authenticated().into_response();
        }
        Err(e) => return e.into_response(),
    };

    let mut req = Request::from_parts(parts, body);
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_with_max_age() {
        let c = session_cookie("abc.def.ghi", 3600, false);
        assert!(c.starts_with("jwt=abc.def.ghi;"));
        assert!(c.contains("Max-Age=3600"));
        assert!(c.contains("HttpOnly"));
        assert!(!c.contains("Secure"));

        let secure = session_cookie("t", 10, true);
        assert!(secure.contains("Secure; SameSite=None"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let c = cleared_session_cookie(false);
        assert!(c.starts_with("jwt=;"));
        assert!(c.contains("Max-Age=0"));
    }
}
