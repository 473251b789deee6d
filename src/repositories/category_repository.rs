use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::category::{
    ActiveModel as CategoryActiveModel, Column, Entity as Category, Model as CategoryModel,
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Repository for category rows
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    base: BaseRepository,
}

impl CategoryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Inserts a category that already carries its allocated id. A duplicate id or
    /// name surfaces as `ServiceError::DuplicateKey`.
    pub async fn create(&self, category: CategoryActiveModel) -> Result<CategoryModel, ServiceError> {
        Ok(category.insert(self.base.get_db()).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<CategoryModel>, ServiceError> {
        Ok(Category::find_by_id(id).one(self.base.get_db()).await?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<CategoryModel>, ServiceError> {
        Ok(Category::find()
            .filter(Column::Name.eq(name))
            .one(self.base.get_db())
            .await?)
    }

    /// Lists categories sorted by name, optionally filtered by `active`.
    pub async fn list(
        &self,
        active: Option<bool>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<CategoryModel>, u64), ServiceError> {
        let mut query = Category::find();
        if let Some(active) = active {
            query = query.filter(Column::Active.eq(active));
        }
        let paginator = query
            .order_by_asc(Column::Name)
            .paginate(self.base.get_db(), page_size);

        let total = paginator.num_items().await?;
        let categories = paginator.fetch_page(page - 1).await?;
        Ok((categories, total))
    }

    pub async fn update(&self, category: CategoryActiveModel) -> Result<CategoryModel, ServiceError> {
        Ok(category.update(self.base.get_db()).await?)
    }

    /// Names of every active category, read live on each call.
    pub async fn active_names(&self) -> Result<HashSet<String>, ServiceError> {
        let names: Vec<String> = Category::find()
            .select_only()
            .column(Column::Name)
            .filter(Column::Active.eq(true))
            .into_tuple()
            .all(self.base.get_db())
            .await?;
        Ok(names.into_iter().collect())
    }

    pub async fn count(&self, active: Option<bool>) -> Result<u64, ServiceError> {
        let mut query = Category::find();
        if let Some(active) = active {
            query = query.filter(Column::Active.eq(active));
        }
        Ok(query.count(self.base.get_db()).await?)
    }
}
