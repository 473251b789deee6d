use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, CallerId,
};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Favorites of the caller named by `X-User-Id`
pub fn favorites_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_favorites).post(add_favorite).delete(clear_favorites),
        )
        .route("/toggle", post(toggle_favorite))
        .route("/check/:product_id", get(check_favorite))
        .route("/count/:product_id", get(count_favorites))
        .route("/:product_id", delete(remove_favorite))
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    #[serde(alias = "produto_id")]
    pub product_id: i64,
}

async fn list_favorites(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<impl IntoResponse, ApiError> {
    let favorites = state
        .services
        .favorites
        .list(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(favorites))
}

async fn add_favorite(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(body): Json<FavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let favorite = state
        .services
        .favorites
        .add(user_id, body.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(favorite))
}

async fn remove_favorite(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .favorites
        .remove(user_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

async fn clear_favorites(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state
        .services
        .favorites
        .clear(user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "removed": removed })))
}

async fn check_favorite(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let favorito = state
        .services
        .favorites
        .check(user_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "product_id": product_id, "favorito": favorito })))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(body): Json<FavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .services
        .favorites
        .toggle(user_id, body.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

async fn count_favorites(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .services
        .favorites
        .count_for_product(product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "product_id": product_id, "total": total })))
}
