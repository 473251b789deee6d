use std::sync::Arc;

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use tracing::{debug, instrument};

use crate::entities::counter::{self, Column, Entity as Counter};
use crate::errors::ServiceError;

pub const PRODUCTS: &str = "products";
pub const CATEGORIES: &str = "categories";
pub const USERS: &str = "users";
pub const ORDERS: &str = "orders";

/// Mints per-name integer ids from the `counters` table.
///
/// Each call is one upsert statement, so two callers can never observe the same
/// value for a counter. Nothing is cached in process.
#[derive(Clone)]
pub struct SequenceAllocator {
    db: Arc<DatabaseConnection>,
}

impl SequenceAllocator {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Increments `name` and returns the new value. A missing counter starts at 0,
    /// so the first value handed out is 1.
    #[instrument(skip(self))]
    pub async fn next(&self, name: &str) -> Result<i64, ServiceError> {
        let row = Counter::insert(counter::ActiveModel {
            name: Set(name.to_string()),
            seq: Set(1),
        })
        .on_conflict(
            OnConflict::column(Column::Name)
                .value(Column::Seq, Expr::col((Counter, Column::Seq)).add(1))
                .to_owned(),
        )
        .exec_with_returning(self.db.as_ref())
        .await?;

        debug!(counter = name, value = row.seq, "sequence advanced");
        Ok(row.seq)
    }

    /// Current value without advancing, `None` if the counter was never used.
    pub async fn current(&self, name: &str) -> Result<Option<i64>, ServiceError> {
        Ok(Counter::find_by_id(name.to_string())
            .one(self.db.as_ref())
            .await?
            .map(|row| row.seq))
    }

    /// Creates the counter at 0 if it does not exist yet.
    pub async fn ensure(&self, name: &str) -> Result<(), ServiceError> {
        Counter::insert(counter::ActiveModel {
            name: Set(name.to_string()),
            seq: Set(0),
        })
        .on_conflict(OnConflict::column(Column::Name).do_nothing().to_owned())
        .exec_without_returning(self.db.as_ref())
        .await?;
        Ok(())
    }
}
