use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::entities::favorite::{self, Column, Entity as Favorite};
use crate::entities::product;
use crate::errors::ServiceError;
use crate::repositories::ProductRepository;

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteView {
    pub product_id: i64,
    pub created_at: DateTime<Utc>,
    /// `None` when the product has since been deleted.
    pub product: Option<product::Model>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub product_id: i64,
    pub favorito: bool,
}

#[derive(Clone)]
pub struct FavoriteService {
    db: Arc<DatabaseConnection>,
    products: ProductRepository,
}

impl FavoriteService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            products: ProductRepository::new(db.clone()),
            db,
        }
    }

    /// The composite key rejects a second favorite for the same pair as a duplicate.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: i64, product_id: i64) -> Result<favorite::Model, ServiceError> {
        if self.products.find_by_id(product_id).await?.is_none() {
            return Err(ServiceError::not_found("produto", product_id));
        }
        let created = favorite::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.db.as_ref())
        .await?;
        info!(user_id, product_id, "favorite added");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: i64, product_id: i64) -> Result<(), ServiceError> {
        let result = Favorite::delete_by_id((user_id, product_id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "produto {} não está nos favoritos",
                product_id
            )));
        }
        info!(user_id, product_id, "favorite removed");
        Ok(())
    }

    /// Newest first, each with the live product if it still exists.
    pub async fn list(&self, user_id: i64) -> Result<Vec<FavoriteView>, ServiceError> {
        let rows = Favorite::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::ProductId)
            .all(self.db.as_ref())
            .await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.product_id).collect();
        let mut products: HashMap<i64, product::Model> = self
            .products
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| FavoriteView {
                product_id: row.product_id,
                created_at: row.created_at,
                product: products.remove(&row.product_id),
            })
            .collect())
    }

    pub async fn check(&self, user_id: i64, product_id: i64) -> Result<bool, ServiceError> {
        Ok(Favorite::find_by_id((user_id, product_id))
            .one(self.db.as_ref())
            .await?
            .is_some())
    }

    #[instrument(skip(self))]
    pub async fn toggle(&self, user_id: i64, product_id: i64) -> Result<ToggleOutcome, ServiceError> {
        let favorito = if self.check(user_id, product_id).await? {
            self.remove(user_id, product_id).await?;
            false
        } else {
            self.add(user_id, product_id).await?;
            true
        };
        Ok(ToggleOutcome {
            product_id,
            favorito,
        })
    }

    pub async fn count_for_product(&self, product_id: i64) -> Result<u64, ServiceError> {
        Ok(Favorite::find()
            .filter(Column::ProductId.eq(product_id))
            .count(self.db.as_ref())
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i64) -> Result<u64, ServiceError> {
        let result = Favorite::delete_many()
            .filter(Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        info!(user_id, removed = result.rows_affected, "favorites cleared");
        Ok(result.rows_affected)
    }
}
