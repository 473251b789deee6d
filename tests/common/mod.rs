#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use luxus_brecho_api::{
    config::AppConfig,
    db::{self, DbConfig},
    errors::ServiceError,
    handlers::common::USER_ID_HEADER,
    models::document_from,
    services::{email::EmailSender, images::LocalImageStorage},
    app_router, AppServices, AppState,
};

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Confirmation { to: String, token: String },
    PasswordReset { to: String, token: String },
}

/// Keeps every outgoing email in memory so tests can read the tokens back.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_confirmation_token(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|email| match email {
            SentEmail::Confirmation { to: t, token } if t == to => Some(token),
            _ => None,
        })
    }

    pub fn last_reset_token(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|email| match email {
            SentEmail::PasswordReset { to: t, token } if t == to => Some(token),
            _ => None,
        })
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_confirmation(&self, to: &str, _nome: &str, token: &str) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(SentEmail::Confirmation {
            to: to.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, _nome: &str, token: &str) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(SentEmail::PasswordReset {
            to: to.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}

/// Helper harness for spinning up the application over a private in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub emails: Arc<RecordingEmailSender>,
    pub images: Arc<LocalImageStorage>,
    _image_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let image_dir = tempfile::tempdir().expect("temp image dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.image_storage_dir = image_dir.path().display().to_string();
        cfg.image_public_base_url = "/uploads".to_string();
        cfg.max_image_bytes = 64 * 1024;

        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let emails = Arc::new(RecordingEmailSender::default());
        let images = Arc::new(LocalImageStorage::new(
            image_dir.path(),
            &cfg.image_public_base_url,
            cfg.max_image_bytes,
        ));
        let services = AppServices::new(db.clone(), &cfg, images.clone(), emails.clone());
        let state = AppState {
            db,
            config: Arc::new(cfg),
            services,
        };

        Self {
            router: app_router(state.clone()),
            state,
            emails,
            images,
            _image_dir: image_dir,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Sends a JSON request and returns the status with the parsed body (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("failed to build request")).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(body), &[]).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None, &[]).await
    }

    /// Request on behalf of `user_id` via `X-User-Id`.
    pub async fn as_user(
        &self,
        user_id: i64,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let id = user_id.to_string();
        self.request(method, uri, body, &[(USER_ID_HEADER, id.as_str())])
            .await
    }

    /// Multipart request with text fields and `(field, filename, bytes)` files.
    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> (StatusCode, Value) {
        let boundary = "luxus-test-boundary";
        let mut body: Vec<u8> = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("failed to build multipart request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Creates one of the default categories through the service layer.
    pub async fn seed_categories(&self) {
        self.services()
            .categories
            .seed()
            .await
            .expect("seed categories");
    }

    pub async fn create_product(&self, titulo: &str, preco: f64, categoria: &str) -> i64 {
        let product = self
            .services()
            .products
            .create(document_from(json!({
                "titulo": titulo,
                "descricao": format!("{} em ótimo estado", titulo),
                "preco": preco,
                "categoria": categoria,
                "imagem": "http://x/img.jpg",
            })))
            .await
            .expect("create product");
        product.id
    }

    /// Registers a customer and confirms the email, returning the user id.
    pub async fn create_active_customer(&self, email: &str, senha: &str) -> i64 {
        let user = self
            .services()
            .users
            .create(document_from(json!({
                "nome": "Cliente Teste",
                "email": email,
                "senha": senha,
            })))
            .await
            .expect("create customer");
        let token = self
            .emails
            .last_confirmation_token(email)
            .expect("confirmation email sent");
        self.services()
            .users
            .confirm_email(&token)
            .await
            .expect("confirm email");
        user.id
    }

    pub async fn create_admin(&self, email: &str) -> i64 {
        self.services()
            .users
            .create(document_from(json!({
                "nome": "Admin Teste",
                "email": email,
                "senha": "admin123",
                "tipo": "administrador",
            })))
            .await
            .expect("create admin")
            .id
    }
}

pub fn address() -> Value {
    json!({
        "rua": "Rua das Flores",
        "numero": "123",
        "bairro": "Centro",
        "cidade": "São Paulo",
        "estado": "SP",
        "cep": "01001-000",
    })
}
