use crate::handlers::common::{
    created_response, into_document, map_service_error, success_response, PaginatedResponse,
};
use crate::services::users::UserQuery;
use crate::services::PageRequest;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Creates the router for account endpoints
pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/auth", post(authenticate))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/confirm-email/:token", get(confirm_email))
        .route("/resend-confirmation", post(resend_confirmation))
        .route("/types", get(user_types))
        .route("/summary", get(user_summary))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/change-password", put(change_password))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub tipo: Option<String>,
    pub ativo: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub email: String,
    #[serde(alias = "password")]
    pub senha: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(alias = "new_password", alias = "senha")]
    pub nova_senha: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(alias = "current_password")]
    pub senha_atual: String,
    #[serde(alias = "new_password")]
    pub nova_senha: String,
}

async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = UserQuery {
        tipo: params.tipo,
        ativo: params.ativo,
        search: params.search,
    };
    let page = state
        .services
        .users
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

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.get(id).await.map_err(map_service_error)?;
    Ok(success_response(user))
}

async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .create(into_document(body))
        .await
        .map_err(map_service_error)?;
    Ok(created_response(user))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .update(id, into_document(body))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .delete(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(user))
}

async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<AuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .services
        .users
        .authenticate(&body.email, &body.senha)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(session))
}

async fn change_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .change_password(id, &body.senha_atual, &body.nova_senha)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "message": "senha alterada" })))
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .forgot_password(&body.email)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "message": "se o email estiver cadastrado, enviaremos as instruções"
    })))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .reset_password(&body.token, &body.nova_senha)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "message": "senha redefinida" })))
}

async fn confirm_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .confirm_email(&token)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(user))
}

async fn resend_confirmation(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .resend_confirmation(&body.email)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "message": "email de confirmação reenviado" })))
}

async fn user_types(State(state): State<AppState>) -> impl IntoResponse {
    success_response(state.services.users.types())
}

async fn user_summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .users
        .summary()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(summary))
}
