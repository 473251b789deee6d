use crate::handlers::common::{
    created_response, into_document, map_service_error, no_content_response, read_multipart,
    success_response, PageParams, PaginatedResponse,
};
use crate::services::products::ProductQuery;
use crate::services::PageRequest;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

/// Creates the router for product endpoints
pub fn products_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/with-image", post(create_product_with_image))
        .route("/category/:categoria", get(products_by_category))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/image", put(replace_product_image))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub categoria: Option<String>,
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = ProductQuery {
        categoria: params.categoria,
        status: params.status,
        q: params.q,
    };
    let page = state
        .services
        .products
        .list(
            query,
            PageRequest {
                page: params.page,
                page_size: params.page_size,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::from(page)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .create(into_document(body))
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

async fn create_product_with_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (fields, mut files) = read_multipart(multipart).await?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("arquivo de imagem ausente".to_string()));
    }
    let product = state
        .services
        .products
        .create_with_image(fields, files.swap_remove(0))
        .await
        .map_err(map_service_error)?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .update(id, into_document(body))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn replace_product_image(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (_, mut files) = read_multipart(multipart).await?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("arquivo de imagem ausente".to_string()));
    }
    let product = state
        .services
        .products
        .replace_image(id, files.swap_remove(0))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .products
        .delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

async fn products_by_category(
    State(state): State<AppState>,
    Path(categoria): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .products
        .by_category(&categoria, params.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(PaginatedResponse::from(page)))
}
