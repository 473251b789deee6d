//! Luxus Brechó API
//!
//! Backend for a secondhand-clothing marketplace: catalog and categories,
//! accounts, carts, favorites and order placement over a single relational store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
};

pub use handlers::{api_v1_routes, AppServices};

/// Multipart overhead allowed on top of the largest accepted image.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub services: AppServices,
}

/// CORS from configuration: explicit origins win, then the permissive opt-in.
/// Without either, cross-origin requests are not allowed.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        ::tracing::info!("using permissive CORS");
        CorsLayer::permissive()
    } else {
        ::tracing::warn!("no CORS origins configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

/// Full HTTP surface: `/api/v1`, `/health` and the stored images.
pub fn app_router(state: AppState) -> Router {
    let cfg = state.config.clone();
    let body_limit = cfg.max_image_bytes.saturating_mul(10) + BODY_LIMIT_SLACK;

    let mut app = Router::new()
        .route("/", get(|| async { "luxus-brecho-api up" }))
        .nest("/api/v1", api_v1_routes().with_state(state.clone()))
        .nest("/health", health::health_routes(state.db.clone()));

    // Only a path-style base URL can be served from this process.
    if cfg.image_public_base_url.starts_with('/') && cfg.image_public_base_url.len() > 1 {
        app = app.nest_service(
            cfg.image_public_base_url.trim_end_matches('/'),
            ServeDir::new(&cfg.image_storage_dir),
        );
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}
