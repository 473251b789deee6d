use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod category_repository;
pub mod product_repository;
pub mod user_repository;

pub use category_repository::CategoryRepository;
pub use product_repository::{ProductFilter, ProductRepository};
pub use user_repository::{UserFilter, UserRepository};

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Normalizes 1-based paging input: page at least 1, size within `1..=max`.
///
/// The page is capped so that the row offset `(page - 1) * size` fits a signed
/// 64-bit SQL `OFFSET`.
pub fn clamp_page(page: Option<u64>, page_size: Option<u64>, default_size: u64, max: u64) -> (u64, u64) {
    let size = page_size.unwrap_or(default_size).clamp(1, max.max(1));
    let last_page = i64::MAX as u64 / size;
    let page = page.unwrap_or(1).clamp(1, last_page);
    (page, size)
}
