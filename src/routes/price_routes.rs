// src/routes/price_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    catalog::{self, CategoryTable, NewTable},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, MessageResponse},
};

/// Every route here sits behind `require_session` (see `routes::router`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_table))
        .route("/api/get-prices", get(get_tables))
        .route("/delete-service/{id}", delete(delete_service))
        .route("/update/{service_id}", put(update_service))
        .route("/addService", post(add_service))
}

fn id_from_value(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn price_from_value(v: &Value) -> Option<f64> {
    let price = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    price.is_finite().then_some(price)
}

/// `{ "<header id>": price, ... }` -> [(header id, price)]
fn parse_price_map(map: &Map<String, Value>) -> Result<Vec<(i32, f64)>, ApiError> {
    map.iter()
        .map(|(key, value)| {
            let header_id: i32 = key
                .trim()
                .parse()
                .map_err(|_| ApiError::validation(format!("invalid header id: {key}")))?;
            let price = price_from_value(value)
                .ok_or_else(|| ApiError::validation(format!("invalid price for header {header_id}")))?;
            Ok((header_id, price))
        })
        .collect()
}

/// Body of `PUT /update/{service_id}` is `{ "<service_id>": { "<header id>": price } }`.
fn parse_update_body(service_id: i32, body: &Value) -> Result<Vec<(i32, f64)>, ApiError> {
    body.get(service_id.to_string())
        .and_then(Value::as_object)
        .ok_or_else(|| ApiError::validation("Invalid data for the provided service ID"))
        .and_then(parse_price_map)
}

#[derive(Debug, Deserialize)]
pub struct AddServiceRequest {
    #[serde(rename = "categoryID")]
    pub category_id: Option<Value>,
    pub new_service: Option<Map<String, Value>>,
}

#[derive(Debug, PartialEq)]
struct NewService {
    category_id: i32,
    name: String,
    prices: Vec<(i32, f64)>,
}

/// `new_service` carries the name under `name`; every other key is a header id.
fn parse_add_service(req: AddServiceRequest) -> Result<NewService, ApiError> {
    let (Some(category), Some(mut fields)) = (req.category_id, req.new_service) else {
        return Err(ApiError::validation("Category and service data are required"));
    };

    let category_id = id_from_value(&category)
        .ok_or_else(|| ApiError::validation("categoryID must be an integer"))?;

    let name = match fields.remove("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(ApiError::validation("new_service.name is required")),
    };

    Ok(NewService {
        category_id,
        name,
        prices: parse_price_map(&fields)?,
    })
}

pub async fn add_table(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    WithRejection(Json(req), _): WithRejection<Json<NewTable>, ApiError>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if req.category_name.trim().is_empty() {
        return Err(ApiError::validation("category_name is required"));
    }

    let created = catalog::add_table(&state.db, &req).await?;

    tracing::info!(
        user_id = %auth.user_id,
        category_id = created.category_id,
        headers = created.header_ids.len(),
        services = created.service_ids.len(),
        "price table stored"
    );

    Ok((StatusCode::CREATED, Json(MessageResponse::new("Data stored successfully"))))
}

pub async fn get_tables(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryTable>>, ApiError> {
    let tables = catalog::fetch_tables(&state.db, state.drop_last_price).await?;
    Ok(Json(tables))
}

pub async fn delete_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(service_id): Path<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = catalog::delete_service(&state.db, service_id).await?;

    tracing::info!(
        user_id = %auth.user_id,
        service_id,
        category_id = deleted.category_id,
        category_deleted = deleted.category_deleted,
        "service deleted"
    );

    Ok(Json(MessageResponse::new(
        "Service and associated category (if empty) deleted successfully",
    )))
}

pub async fn update_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(service_id): Path<i32>,
    WithRejection(Json(body), _): WithRejection<Json<Value>, ApiError>,
) -> Result<Json<MessageResponse>, ApiError> {
    let prices = parse_update_body(service_id, &body)?;

    let updated = catalog::update_service_prices(&state.db, service_id, &prices).await?;

    tracing::info!(user_id = %auth.user_id, service_id, updated, "service prices updated");

    Ok(Json(MessageResponse::new("Service prices updated successfully")))
}

pub async fn add_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    WithRejection(Json(req), _): WithRejection<Json<AddServiceRequest>, ApiError>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let new_service = parse_add_service(req)?;

    let service_id = catalog::add_service(
        &state.db,
        new_service.category_id,
        &new_service.name,
        &new_service.prices,
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        service_id,
        category_id = new_service.category_id,
        cells = new_service.prices.len(),
        "service added"
    );

    Ok((StatusCode::CREATED, Json(MessageResponse::new("New service added successfully"))))
}
