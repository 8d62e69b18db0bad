use crate::{middleware::auth_context::require_session, models::AppState};
use axum::{Router, middleware::from_fn_with_state};

pub mod auth_routes;
pub mod price_routes;

pub fn router(state: AppState) -> Router {
    let prices = price_routes::router()
        .route_layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(prices)
        .nest("/auth", auth_routes::router())
        .with_state(state)
}
