use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    auth::{generate_session_id, hash_password, hash_session_id, issue_token, verify_password},
    config::SessionMode,
    error::ApiError,
    middleware::auth_context::{Session, cleared_session_cookie, session_cookie},
    models::*,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/authenticate", get(authenticate))
}

/// Sign a token for `user_id` (registering it first in tracked mode) and
/// return the matching `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let session_id = match state.session_mode {
        SessionMode::Stateless => None,
        SessionMode::Tracked => Some(generate_session_id()),
    };

    let issued = issue_token(&state.jwt, user_id, state.session_ttl_seconds, session_id.clone())
        .map_err(ApiError::Internal)?;

    if let Some(sid) = session_id {
        sqlx::query(
            r#"
            INSERT INTO session_token (user_id, session_token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(hash_session_id(&sid))
        .bind(issued.expires_at)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;
    }

    Ok(session_cookie(
        &issued.token,
        state.session_ttl_seconds,
        state.cookie_secure,
    ))
}

fn user_already_registered() -> ApiError {
    ApiError::Unauthorized("ALREADY_REGISTERED", "User is already registered".into())
}

pub async fn signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim();
    if email.is_empty()
        || req.password.is_empty()
        || req.name.trim().is_empty()
        || req.surname.trim().is_empty()
    {
        return Err(ApiError::validation(
            "email, password, name and surname are required",
        ));
    }

    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?;
    if existing.is_some() {
        return Err(user_already_registered());
    }

    let password_hash = hash_password(&req.password).map_err(ApiError::Internal)?;

    let user_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO users (email, password, name, surname)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(req.name.trim())
    .bind(req.surname.trim())
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        // lost a race with a concurrent signup for the same email
        if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
            user_already_registered()
        } else {
            ApiError::db(e)
        }
    })?;

    let cookie = start_session(&state, user_id).await?;
    tracing::info!(%user_id, "user signed up");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(UserIdResponse { user_id }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Ok(Json(req)) = body else {
        return Err(ApiError::invalid_credentials());
    };
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid_credentials());
    }

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, email, password
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password) {
        tracing::debug!(email = %user.email, "wrong password");
        return Err(ApiError::invalid_credentials());
    }

    let cookie = start_session(&state, user.id).await?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(UserIdResponse { user_id: user.id }),
    ))
}

/// Clears the cookie. In tracked mode the presented session is revoked as well;
/// in stateless mode the token itself stays valid until it expires.
pub async fn logout(
    State(state): State<AppState>,
    session: Result<Session, ApiError>,
) -> impl IntoResponse {
    let session = session.unwrap_or_else(|e| {
        tracing::error!("session lookup failed during logout: {e:?}");
        Session::Anonymous
    });

    if let Session::Authenticated(ctx) = &session {
        if let Some(session_token_id) = ctx.session_token_id {
            let res = sqlx::query(
                r#"
                UPDATE session_token
                SET revoked_at = now()
                WHERE session_token_id = $1
                  AND revoked_at IS NULL
                "#,
            )
            .bind(session_token_id)
            .execute(&state.db)
            .await;

            if let Err(e) = res {
                tracing::error!("failed to revoke session {session_token_id}: {e}");
            }
        }
    }

    (
        StatusCode::ACCEPTED,
        [(header::SET_COOKIE, cleared_session_cookie(state.cookie_secure))],
        "cookie cleared",
    )
}

pub async fn authenticate(session: Session) -> Json<AuthenticatedResponse> {
    Json(AuthenticatedResponse {
        authenticated: session.is_authenticated(),
    })
}
