//! Order composition.
//!
//! Placing an order touches several tables without a surrounding transaction:
//! products are flipped to `vendido` one by one, then the order and its snapshot
//! lines are written together, then the cart is cleared. Product flips are
//! conditional on the product still being `disponivel`, so two orders racing for
//! the same piece cannot both get it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use super::carts::CartService;
use super::sequence::{self, SequenceAllocator};
use super::{Page, PageRequest};
use crate::entities::order::{self, Entity as Order, OrderStatus};
use crate::entities::order_item::{self, Entity as OrderItem};
use crate::entities::product::ProductStatus;
use crate::errors::ServiceError;
use crate::models::order::{
    validate_order_request, DropReason, DroppedItem, OrderDetails, OrderLine, OrderPlacement,
    PlaceOrderRequest,
};
use crate::repositories::ProductRepository;

/// Product data copied into the order at placement time.
struct Snapshot {
    product_id: i64,
    titulo: String,
    quantity: i32,
    preco_unitario: Decimal,
    preco_total: Decimal,
    imagem_url: String,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(&raw.trim().to_lowercase()).map_err(|_| {
        ServiceError::field(
            "status",
            "deve ser um de: pendente, confirmado, em_preparacao, enviado, entregue, cancelado",
        )
    })
}

/// Sums the quantities of repeated products, keeping first-seen order.
fn merge_lines(lines: Vec<OrderLine>) -> Vec<OrderLine> {
    let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
    for line in lines {
        match merged.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line),
        }
    }
    merged
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    products: ProductRepository,
    carts: CartService,
    sequence: SequenceAllocator,
    max_page_size: u64,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, sequence: SequenceAllocator, max_page_size: u64) -> Self {
        Self {
            products: ProductRepository::new(db.clone()),
            carts: CartService::new(db.clone()),
            db,
            sequence,
            max_page_size,
        }
    }

    /// Places an order for `user_id`. Lines come from the request, or from the
    /// user's cart when the request has none.
    ///
    /// Lines whose product is missing or already sold are reported in
    /// `dropped_items` instead of failing the whole order. When nothing is left, no
    /// order is created and the call fails with a conflict.
    #[instrument(skip(self, request))]
    pub async fn place(&self, user_id: i64, request: PlaceOrderRequest) -> Result<OrderPlacement, ServiceError> {
        let items = if request.items.is_empty() {
            self.carts
                .lines(user_id)
                .await?
                .into_iter()
                .map(|l| json!({ "product_id": l.product_id, "quantity": l.quantity }))
                .collect()
        } else {
            request.items
        };
        let validated = validate_order_request(user_id, &items, request.endereco)
            .map_err(ServiceError::Validation)?;

        let mut snapshots = Vec::new();
        let mut dropped = Vec::new();
        for line in merge_lines(validated.lines) {
            let Some(product) = self.products.find_by_id(line.product_id).await? else {
                dropped.push(DroppedItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    reason: DropReason::NotFound,
                });
                continue;
            };
            if !self.products.mark_sold(product.id).await? {
                dropped.push(DroppedItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    reason: DropReason::Unavailable,
                });
                continue;
            }
            snapshots.push(Snapshot {
                product_id: product.id,
                titulo: product.titulo,
                quantity: line.quantity,
                preco_unitario: product.preco,
                preco_total: (product.preco * Decimal::from(line.quantity)).round_dp(2),
                imagem_url: product.imagem,
            });
        }

        if !dropped.is_empty() {
            warn!(user_id, dropped = ?dropped, "order lines dropped");
        }
        if snapshots.is_empty() {
            return Err(ServiceError::Conflict(
                "nenhum dos produtos solicitados está disponível".to_string(),
            ));
        }

        let flipped: Vec<i64> = snapshots.iter().map(|s| s.product_id).collect();
        let details = match self.persist(user_id, validated.endereco, snapshots).await {
            Ok(details) => details,
            Err(e) => {
                error!(user_id, error = %e, "order not persisted; releasing products");
                self.release_products(&flipped).await;
                return Err(e);
            }
        };

        if let Err(e) = self.carts.clear(user_id).await {
            warn!(user_id, order_id = details.order.id, error = %e, "cart not cleared after order");
        }

        info!(
            order_id = details.order.id,
            user_id,
            total = %details.order.total,
            items = details.items.len(),
            "order placed"
        );
        Ok(OrderPlacement {
            order: details,
            dropped_items: dropped,
        })
    }

    /// Allocates the order id and writes the order row with its lines atomically.
    async fn persist(
        &self,
        user_id: i64,
        endereco: serde_json::Value,
        snapshots: Vec<Snapshot>,
    ) -> Result<OrderDetails, ServiceError> {
        let id = self.sequence.next(sequence::ORDERS).await?;
        let total: Decimal = snapshots.iter().map(|s| s.preco_total).sum();
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let order = order::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            total: Set(total),
            status: Set(OrderStatus::Confirmado),
            endereco: Set(endereco),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let item = order_item::ActiveModel {
                order_id: Set(id),
                product_id: Set(snapshot.product_id),
                titulo: Set(snapshot.titulo),
                quantity: Set(snapshot.quantity),
                preco_unitario: Set(snapshot.preco_unitario),
                preco_total: Set(snapshot.preco_total),
                imagem_url: Set(snapshot.imagem_url),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }
        txn.commit().await?;

        Ok(OrderDetails { order, items })
    }

    async fn release_products(&self, ids: &[i64]) {
        for id in ids {
            if let Err(e) = self.products.release(*id).await {
                warn!(product_id = id, error = %e, "product not released");
            }
        }
    }

    async fn items_for(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<order_item::Model>>, ServiceError> {
        let mut grouped: HashMap<i64, Vec<order_item::Model>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }
        let rows = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids.iter().copied()))
            .order_by_asc(order_item::Column::Id)
            .all(self.db.as_ref())
            .await?;
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }

    pub async fn get(&self, id: i64) -> Result<OrderDetails, ServiceError> {
        let order = Order::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("pedido", id))?;
        let items = self.items_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(OrderDetails { order, items })
    }

    /// Orders of one user, newest first.
    pub async fn list_for_user(&self, user_id: i64, paging: PageRequest) -> Result<Page<OrderDetails>, ServiceError> {
        let (page, page_size) = paging.resolve(10, self.max_page_size);
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .paginate(self.db.as_ref(), page_size);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let mut items = self.items_for(&ids).await?;
        Ok(Page {
            items: orders
                .into_iter()
                .map(|order| OrderDetails {
                    items: items.remove(&order.id).unwrap_or_default(),
                    order,
                })
                .collect(),
            page,
            page_size,
            total,
        })
    }

    /// Moves the order forward along its lifecycle. `cancelado` is delegated to
    /// [`OrderService::cancel`]; going backwards is rejected.
    #[instrument(skip(self))]
    pub async fn update_status(&self, id: i64, status: &str) -> Result<OrderDetails, ServiceError> {
        let target = parse_status(status)?;
        if target == OrderStatus::Cancelado {
            return self.cancel(id).await;
        }

        let details = self.get(id).await?;
        let current = details.order.status;
        let allowed = match (current.rank(), target.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        };
        if !allowed {
            return Err(ServiceError::InvalidOperation(format!(
                "transição de status inválida: {} -> {}",
                current, target
            )));
        }

        let mut model: order::ActiveModel = details.order.into();
        model.status = Set(target);
        model.updated_at = Set(Utc::now());
        let order = model.update(self.db.as_ref()).await?;
        info!(order_id = id, from = %current, to = %target, "order status changed");
        Ok(OrderDetails {
            order,
            items: details.items,
        })
    }

    /// Cancels an order that has not shipped, returning its products to sale.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64) -> Result<OrderDetails, ServiceError> {
        let details = self.get(id).await?;
        let current = details.order.status;
        if !current.is_cancellable() {
            return Err(ServiceError::InvalidOperation(format!(
                "pedido com status '{}' não pode ser cancelado",
                current
            )));
        }

        let txn = self.db.begin().await?;
        for item in &details.items {
            let released = ProductRepository::transition_status(
                &txn,
                item.product_id,
                ProductStatus::Vendido,
                ProductStatus::Disponivel,
            )
            .await?;
            if !released {
                warn!(order_id = id, product_id = item.product_id, "product was not sold; left as is");
            }
        }
        let mut model: order::ActiveModel = details.order.into();
        model.status = Set(OrderStatus::Cancelado);
        model.updated_at = Set(Utc::now());
        let order = model.update(&txn).await?;
        txn.commit().await?;

        info!(order_id = id, "order cancelled");
        Ok(OrderDetails {
            order,
            items: details.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lines_are_merged() {
        let lines = vec![
            OrderLine { product_id: 2, quantity: 1 },
            OrderLine { product_id: 5, quantity: 1 },
            OrderLine { product_id: 2, quantity: 3 },
        ];
        assert_eq!(
            merge_lines(lines),
            vec![
                OrderLine { product_id: 2, quantity: 4 },
                OrderLine { product_id: 5, quantity: 1 },
            ]
        );
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(parse_status(" Enviado ").unwrap(), OrderStatus::Enviado);
        assert_eq!(parse_status("em_preparacao").unwrap(), OrderStatus::EmPreparacao);
        assert!(parse_status("perdido").is_err());
    }
}
