use crate::handlers::common::{
    created_response, map_service_error, success_response, PageParams, PaginatedResponse,
};
use crate::models::order::PlaceOrderRequest;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

/// Creates the router for order endpoints
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/user/:user_id",
            get(list_user_orders).post(place_order),
        )
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

async fn place_order(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let placement = state
        .services
        .orders
        .place(user_id, body)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(placement))
}

async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .orders
        .list_for_user(user_id, params.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::from(page)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.get(id).await.map_err(map_service_error)?;
    Ok(success_response(order))
}

async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, &body.status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .cancel(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}
