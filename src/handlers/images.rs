use crate::handlers::common::{created_response, map_service_error, read_multipart, success_response};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Standalone image upload, lookup and removal
pub fn images_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload_image))
        .route("/upload-multiple", post(upload_images))
        .route("/product/:product_id", get(list_product_images))
        .route("/info", post(image_info))
        .route("/", delete(delete_image))
}

#[derive(Debug, Deserialize)]
pub struct DeleteImageRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageInfoRequest {
    #[serde(alias = "url")]
    pub image_url: String,
}

fn product_id_field(value: Option<&Value>) -> Result<Option<i64>, ApiError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest("product_id inválido".to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest("product_id inválido".to_string())),
        Some(_) => Err(ApiError::BadRequest("product_id inválido".to_string())),
    }
}

async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (fields, mut files) = read_multipart(multipart).await?;
    let product_id = product_id_field(fields.get("product_id"))?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("nenhum arquivo enviado".to_string()));
    }
    let upload = files.remove(0);
    let url = state
        .services
        .images
        .upload(upload, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(json!({ "url": url })))
}

/// Stores every file of the form. A failure removes what was already stored.
async fn upload_images(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (fields, files) = read_multipart(multipart).await?;
    let product_id = product_id_field(fields.get("product_id"))?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("nenhum arquivo enviado".to_string()));
    }

    let images = &state.services.images;
    let mut urls = Vec::with_capacity(files.len());
    for upload in files {
        match images.upload(upload, product_id).await {
            Ok(url) => urls.push(url),
            Err(err) => {
                for url in &urls {
                    if let Err(cleanup) = images.delete(url).await {
                        tracing::warn!(%url, error = %cleanup, "failed to remove partial upload");
                    }
                }
                return Err(map_service_error(err));
            }
        }
    }
    Ok(created_response(json!({ "urls": urls })))
}

async fn list_product_images(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let images = state
        .services
        .images
        .list(product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "product_id": product_id,
        "total": images.len(),
        "images": images,
    })))
}

async fn image_info(
    State(state): State<AppState>,
    Json(body): Json<ImageInfoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.image_url.trim().is_empty() {
        return Err(ApiError::BadRequest("image_url é obrigatório".to_string()));
    }
    let info = state
        .services
        .images
        .info(body.image_url.trim())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(info))
}

async fn delete_image(
    State(state): State<AppState>,
    Json(body): Json<DeleteImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .services
        .images
        .delete(&body.url)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_field_accepts_numbers_and_digit_strings() {
        assert_eq!(product_id_field(None).unwrap(), None);
        assert_eq!(product_id_field(Some(&json!(7))).unwrap(), Some(7));
        assert_eq!(product_id_field(Some(&json!(" 12 "))).unwrap(), Some(12));
        assert_eq!(product_id_field(Some(&json!(""))).unwrap(), None);
        assert!(product_id_field(Some(&json!("abc"))).is_err());
        assert!(product_id_field(Some(&json!(true))).is_err());
    }
}
