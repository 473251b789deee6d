pub mod carts;
pub mod categories;
pub mod common;
pub mod favorites;
pub mod images;
pub mod orders;
pub mod products;
pub mod users;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    carts::CartService,
    categories::CategoryService,
    email::EmailSender,
    favorites::FavoriteService,
    images::ImageStorage,
    orders::OrderService,
    products::ProductService,
    sequence::SequenceAllocator,
    tokens::TokenIssuer,
    users::{AccountSettings, UserService},
};

pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub sequence: SequenceAllocator,
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub users: Arc<UserService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub favorites: Arc<FavoriteService>,
    pub images: Arc<dyn ImageStorage>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        images: Arc<dyn ImageStorage>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let sequence = SequenceAllocator::new(db.clone());
        let max_page_size = config.api_max_page_size;
        let tokens = TokenIssuer::new(
            config.jwt_secret.clone(),
            config.jwt_expiration as u64,
            config.refresh_token_expiration as u64,
        );
        let settings = AccountSettings {
            confirmation_ttl_hours: config.confirmation_token_ttl_hours,
            reset_ttl_hours: config.reset_token_ttl_hours,
            max_page_size,
        };

        Self {
            categories: Arc::new(CategoryService::new(db.clone(), sequence.clone(), max_page_size)),
            products: Arc::new(ProductService::new(
                db.clone(),
                sequence.clone(),
                images.clone(),
                config.api_default_page_size,
                max_page_size,
            )),
            users: Arc::new(UserService::new(db.clone(), sequence.clone(), tokens, email, settings)),
            carts: Arc::new(CartService::new(db.clone())),
            orders: Arc::new(OrderService::new(db.clone(), sequence.clone(), max_page_size)),
            favorites: Arc::new(FavoriteService::new(db)),
            images,
            sequence,
        }
    }
}

/// Every resource router, to be nested under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/products", products::products_routes())
        .nest("/categories", categories::categories_routes())
        .nest("/users", users::users_routes())
        .nest("/cart", carts::carts_routes())
        .nest("/orders", orders::orders_routes())
        .nest("/favorites", favorites::favorites_routes())
        .nest("/images", images::images_routes())
}
