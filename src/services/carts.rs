use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::entities::cart_item::{self, Column, Entity as CartItem};
use crate::entities::product;
use crate::errors::ServiceError;
use crate::repositories::ProductRepository;

#[derive(Debug, Clone, Deserialize)]
pub struct CartLineRequest {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: i64,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
    pub product: product::Model,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub user_id: i64,
    pub items: Vec<CartLineView>,
    pub total_items: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
}

fn positive_quantity(quantity: Option<i32>) -> Result<i32, ServiceError> {
    match quantity {
        None => Ok(1),
        Some(q) if q >= 1 => Ok(q),
        Some(_) => Err(ServiceError::field("quantity", "deve ser no mínimo 1")),
    }
}

/// One cart per user, stored as rows of `cart_items`.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    products: ProductRepository,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            products: ProductRepository::new(db.clone()),
            db,
        }
    }

    /// Raw lines in insertion order.
    pub async fn lines(&self, user_id: i64) -> Result<Vec<cart_item::Model>, ServiceError> {
        Ok(CartItem::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_asc(Column::AddedAt)
            .order_by_asc(Column::ProductId)
            .all(self.db.as_ref())
            .await?)
    }

    /// Cart with live product data. Lines whose product no longer exists are left out.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: i64) -> Result<CartView, ServiceError> {
        let lines = self.lines(user_id).await?;
        let ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<i64, product::Model> = self
            .products
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let items: Vec<CartLineView> = lines
            .into_iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?.clone();
                let line_total = (product.preco * Decimal::from(line.quantity)).round_dp(2);
                Some(CartLineView {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    added_at: line.added_at,
                    product,
                    line_total,
                })
            })
            .collect();

        Ok(CartView {
            user_id,
            total_items: items.iter().map(|i| i64::from(i.quantity)).sum(),
            subtotal: items.iter().map(|i| i.line_total).sum(),
            items,
        })
    }

    #[instrument(skip(self))]
    pub async fn add(&self, user_id: i64, product_id: i64, quantity: Option<i32>) -> Result<CartView, ServiceError> {
        let quantity = positive_quantity(quantity)?;
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("produto", product_id))?;
        if !product.is_available() {
            return Err(ServiceError::InvalidOperation(format!(
                "produto {} não está disponível",
                product_id
            )));
        }

        match CartItem::find_by_id((user_id, product_id))
            .one(self.db.as_ref())
            .await?
        {
            Some(existing) => {
                let new_quantity = existing.quantity.saturating_add(quantity);
                let mut model: cart_item::ActiveModel = existing.into();
                model.quantity = Set(new_quantity);
                model.update(self.db.as_ref()).await?;
            }
            None => {
                cart_item::ActiveModel {
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    added_at: Set(Utc::now()),
                }
                .insert(self.db.as_ref())
                .await?;
            }
        }
        info!(user_id, product_id, quantity, "cart line added");
        self.get(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: i64, product_id: i64) -> Result<CartView, ServiceError> {
        let result = CartItem::delete_by_id((user_id, product_id))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "produto {} não está no carrinho",
                product_id
            )));
        }
        info!(user_id, product_id, "cart line removed");
        self.get(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(&self, user_id: i64, product_id: i64, quantity: i32) -> Result<CartView, ServiceError> {
        let quantity = positive_quantity(Some(quantity))?;
        let existing = CartItem::find_by_id((user_id, product_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("produto {} não está no carrinho", product_id))
            })?;
        let mut model: cart_item::ActiveModel = existing.into();
        model.quantity = Set(quantity);
        model.update(self.db.as_ref()).await?;
        self.get(user_id).await
    }

    /// Removes every line; returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i64) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        info!(user_id, removed = result.rows_affected, "cart cleared");
        Ok(result.rows_affected)
    }

    /// Replaces the cart with `lines`, keeping only products that exist and are
    /// available. Repeated products are merged.
    #[instrument(skip(self, lines))]
    pub async fn sync(&self, user_id: i64, lines: Vec<CartLineRequest>) -> Result<CartView, ServiceError> {
        let mut wanted: Vec<(i64, i32)> = Vec::new();
        for line in lines {
            let quantity = positive_quantity(line.quantity)?;
            match wanted.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, q)) => *q = q.saturating_add(quantity),
                None => wanted.push((line.product_id, quantity)),
            }
        }

        let ids: Vec<i64> = wanted.iter().map(|(id, _)| *id).collect();
        let available: HashMap<i64, bool> = self
            .products
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.is_available()))
            .collect();

        let txn = self.db.begin().await?;
        CartItem::delete_many()
            .filter(Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        let now = Utc::now();
        let mut kept = 0usize;
        for (product_id, quantity) in wanted {
            if available.get(&product_id).copied() != Some(true) {
                continue;
            }
            cart_item::ActiveModel {
                user_id: Set(user_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                added_at: Set(now + chrono::Duration::microseconds(kept as i64)),
            }
            .insert(&txn)
            .await?;
            kept += 1;
        }
        txn.commit().await?;

        info!(user_id, kept, "cart synchronized");
        self.get(user_id).await
    }
}
