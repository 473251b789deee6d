use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use std::sync::Arc;

use crate::entities::product::{
    ActiveModel as ProductActiveModel, Column, Entity as Product, Model as ProductModel,
    ProductStatus,
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

/// Equality filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub categoria: Option<String>,
    pub status: Option<ProductStatus>,
}

impl ProductFilter {
    fn apply(&self, mut query: Select<Product>) -> Select<Product> {
        if let Some(categoria) = &self.categoria {
            query = query.filter(Column::Categoria.eq(categoria.as_str()));
        }
        if let Some(status) = self.status {
            query = query.filter(Column::Status.eq(status));
        }
        query
    }
}

/// Repository for product rows
#[derive(Debug, Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, product: ProductActiveModel) -> Result<ProductModel, ServiceError> {
        Ok(product.insert(self.base.get_db()).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<ProductModel>, ServiceError> {
        Ok(Product::find_by_id(id).one(self.base.get_db()).await?)
    }

    pub async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<ProductModel>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Product::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(self.base.get_db())
            .await?)
    }

    /// Paginated listing ordered by id.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let paginator = filter
            .apply(Product::find())
            .order_by_asc(Column::Id)
            .paginate(self.base.get_db(), page_size);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    /// Every product matching the filters, unpaginated. Used by the text search.
    pub async fn find_matching(&self, filter: &ProductFilter) -> Result<Vec<ProductModel>, ServiceError> {
        Ok(filter
            .apply(Product::find())
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?)
    }

    /// Products of one category ordered by title.
    pub async fn list_by_category(
        &self,
        categoria: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let paginator = Product::find()
            .filter(Column::Categoria.eq(categoria))
            .order_by_asc(Column::Titulo)
            .order_by_asc(Column::Id)
            .paginate(self.base.get_db(), page_size);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;
        Ok((products, total))
    }

    pub async fn count_by_category(&self, categoria: &str) -> Result<u64, ServiceError> {
        Ok(Product::find()
            .filter(Column::Categoria.eq(categoria))
            .count(self.base.get_db())
            .await?)
    }

    pub async fn update(&self, product: ProductActiveModel) -> Result<ProductModel, ServiceError> {
        Ok(product.update(self.base.get_db()).await?)
    }

    /// Hard delete. Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, ServiceError> {
        let result = Product::delete_by_id(id).exec(self.base.get_db()).await?;
        Ok(result.rows_affected > 0)
    }

    /// Flips `from` to `to` only when the row still has status `from`. Returns
    /// whether this call performed the flip.
    pub async fn transition_status<C: ConnectionTrait>(
        conn: &C,
        id: i64,
        from: ProductStatus,
        to: ProductStatus,
    ) -> Result<bool, ServiceError> {
        let result = Product::update_many()
            .col_expr(Column::Status, Expr::value(to))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(from))
            .exec(conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn mark_sold(&self, id: i64) -> Result<bool, ServiceError> {
        Self::transition_status(
            self.base.get_db(),
            id,
            ProductStatus::Disponivel,
            ProductStatus::Vendido,
        )
        .await
    }

    pub async fn release(&self, id: i64) -> Result<bool, ServiceError> {
        Self::transition_status(
            self.base.get_db(),
            id,
            ProductStatus::Vendido,
            ProductStatus::Disponivel,
        )
        .await
    }
}
