use crate::handlers::common::{
    created_response, into_document, map_service_error, success_response, PageParams,
    PaginatedResponse,
};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

/// Creates the router for category endpoints
pub fn categories_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route("/seed", post(seed_categories))
        .route("/summary", get(category_summary))
        .route(
            "/:id",
            get(get_category)
                .put(update_category)
                .delete(deactivate_category),
        )
        .route("/:id/activate", put(activate_category))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListParams {
    pub active: Option<bool>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<CategoryListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = PageParams {
        page: params.page,
        page_size: params.page_size,
    };
    let page = state
        .services
        .categories
        .list(params.active, paging.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::from(page)))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .create(into_document(body))
        .await
        .map_err(map_service_error)?;
    Ok(created_response(category))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .update(id, into_document(body))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

async fn deactivate_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .deactivate(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

async fn activate_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .activate(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(category))
}

async fn seed_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .services
        .categories
        .seed()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(serde_json::json!({
        "created": created.len(),
        "items": created,
    })))
}

async fn category_summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .categories
        .summary()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}
