use crate::errors::{ApiError, ServiceError};
use crate::models::Document;
use crate::services::images::ImageUpload;
use crate::services::{Page, PageRequest};
use axum::{
    async_trait,
    extract::{FromRequestParts, Multipart},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carrying the id of the already-authenticated caller.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Paging query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        PageRequest {
            page: params.page,
            page_size: params.page_size,
        }
    }
}

/// Standard pagination response metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// Standard paginated response wrapper
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        let pagination = PaginationMeta {
            page: page.page,
            page_size: page.page_size,
            total: page.total,
            total_pages: page.total_pages(),
        };
        Self {
            items: page.items,
            pagination,
        }
    }
}

/// Any JSON body as a document. Non-object bodies become an empty document and
/// fail validation downstream.
pub fn into_document(body: Value) -> Document {
    crate::models::document_from(body)
}

/// Caller identity taken from `X-User-Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("cabeçalho X-User-Id ausente".to_string()))?;
        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(CallerId)
            .ok_or_else(|| ApiError::BadRequest("cabeçalho X-User-Id inválido".to_string()))
    }
}

/// Splits a multipart form into its text fields and its files. A text field named
/// `data` holding a JSON object is merged into the fields.
pub async fn read_multipart(mut multipart: Multipart) -> Result<(Document, Vec<ImageUpload>), ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("formulário multipart inválido: {}", e))
    };
    let mut fields = Document::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad)?;
            files.push(ImageUpload {
                filename,
                content_type,
                bytes,
            });
            continue;
        }
        let text = field.text().await.map_err(bad)?;
        match (name.as_str(), serde_json::from_str::<Value>(&text)) {
            ("data", Ok(Value::Object(map))) => fields.extend(map),
            _ => {
                fields.insert(name, Value::String(text));
            }
        }
    }
    Ok((fields, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<CallerId, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CallerId::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn caller_id_from_header() {
        assert_eq!(extract(Some(" 42 ")).await.unwrap(), CallerId(42));
        assert!(matches!(extract(None).await, Err(ApiError::Unauthorized(_))));
        assert!(matches!(extract(Some("abc")).await, Err(ApiError::BadRequest(_))));
        assert!(matches!(extract(Some("-1")).await, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn pagination_meta_counts_pages() {
        let page = Page {
            items: vec![1, 2],
            page: 2,
            page_size: 2,
            total: 5,
        };
        let response = PaginatedResponse::from(page);
        assert_eq!(response.pagination.total_pages, 3);
        assert_eq!(response.items, vec![1, 2]);
    }
}
