use crate::handlers::common::{map_service_error, success_response};
use crate::services::carts::CartLineRequest;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Creates the router for cart endpoints, keyed by user id
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(get_cart))
        .route("/:user_id/add", post(add_to_cart))
        .route("/:user_id/remove", post(remove_from_cart))
        .route("/:user_id/update", put(update_cart_line))
        .route("/:user_id/clear", delete(clear_cart))
        .route("/:user_id/sync", post(sync_cart))
}

#[derive(Debug, Deserialize)]
pub struct ProductRef {
    pub product_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuantityUpdate {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub items: Vec<CartLineRequest>,
}

async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn add_to_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<CartLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .add(user_id, body.product_id, body.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<ProductRef>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove(user_id, body.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn update_cart_line(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<QuantityUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .update_quantity(user_id, body.product_id, body.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .services
        .carts
        .clear(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "user_id": user_id, "removed": removed })))
}

async fn sync_cart(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<SyncRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .sync(user_id, body.items)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}
