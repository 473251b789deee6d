use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, Set};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::sequence::{self, SequenceAllocator};
use super::{take_immutable_id, to_document, Page, PageRequest};
use crate::entities::category;
use crate::errors::ServiceError;
use crate::models::{self, bool_field, category as rules, str_field, Document};
use crate::repositories::{CategoryRepository, ProductRepository};

/// Categories inserted by `seed` when missing.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Casual", "Roupas para o dia a dia"),
    ("Social", "Roupas para ocasiões formais"),
    ("Esportivo", "Roupas para atividades físicas"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub total: u64,
    pub ativas: u64,
    pub inativas: u64,
}

#[derive(Clone)]
pub struct CategoryService {
    categories: CategoryRepository,
    products: ProductRepository,
    sequence: SequenceAllocator,
    max_page_size: u64,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, sequence: SequenceAllocator, max_page_size: u64) -> Self {
        Self {
            categories: CategoryRepository::new(db.clone()),
            products: ProductRepository::new(db),
            sequence,
            max_page_size,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        active: Option<bool>,
        paging: PageRequest,
    ) -> Result<Page<category::Model>, ServiceError> {
        let (page, page_size) = paging.resolve(10, self.max_page_size);
        let (items, total) = self.categories.list(active, page, page_size).await?;
        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }

    pub async fn get(&self, id: i64) -> Result<category::Model, ServiceError> {
        self.categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("categoria", id))
    }

    /// Live set of active category names.
    pub async fn active_names(&self) -> Result<HashSet<String>, ServiceError> {
        self.categories.active_names().await
    }

    #[instrument(skip(self, payload))]
    pub async fn create(&self, payload: Document) -> Result<category::Model, ServiceError> {
        let mut doc = rules::normalize(payload);
        doc.remove("id");
        rules::validate(&doc).map_err(ServiceError::Validation)?;

        let id = self.sequence.next(sequence::CATEGORIES).await?;
        let now = Utc::now();
        let created = self
            .categories
            .create(category::ActiveModel {
                id: Set(id),
                name: Set(str_field(&doc, "name").unwrap_or_default().to_string()),
                description: Set(str_field(&doc, "description").unwrap_or_default().to_string()),
                active: Set(bool_field(&doc, "active").unwrap_or(true)),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .await?;

        info!(category_id = created.id, name = %created.name, "category created");
        Ok(created)
    }

    /// Merges `payload` over the stored row, validates the merged result and only
    /// then writes it.
    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: Document) -> Result<category::Model, ServiceError> {
        let current = self.get(id).await?;
        let mut patch = rules::normalize(payload);
        take_immutable_id(&mut patch, id)?;

        let mut merged = to_document(&current)?;
        for key in ["id", "created_at", "updated_at"] {
            merged.remove(key);
        }
        merged.extend(patch);
        let merged = rules::normalize(merged);
        rules::validate(&merged).map_err(ServiceError::Validation)?;

        let name = str_field(&merged, "name").unwrap_or_default().to_string();
        let active = bool_field(&merged, "active").unwrap_or(current.active);
        if name != current.name || (current.active && !active) {
            self.ensure_unreferenced(&current.name).await?;
        }

        let updated = self
            .categories
            .update(category::ActiveModel {
                id: Set(id),
                name: Set(name),
                description: Set(str_field(&merged, "description").unwrap_or_default().to_string()),
                active: Set(active),
                created_at: Set(current.created_at),
                updated_at: Set(Utc::now()),
            })
            .await?;

        info!(category_id = id, "category updated");
        Ok(updated)
    }

    /// Soft delete. Refused while any product still references the category name.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: i64) -> Result<category::Model, ServiceError> {
        let current = self.get(id).await?;
        self.ensure_unreferenced(&current.name).await?;
        if !current.active {
            return Ok(current);
        }
        let updated = self.set_active(current, false).await?;
        info!(category_id = id, "category deactivated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn activate(&self, id: i64) -> Result<category::Model, ServiceError> {
        let current = self.get(id).await?;
        if current.active {
            return Ok(current);
        }
        let updated = self.set_active(current, true).await?;
        info!(category_id = id, "category activated");
        Ok(updated)
    }

    async fn set_active(&self, current: category::Model, active: bool) -> Result<category::Model, ServiceError> {
        let mut model: category::ActiveModel = current.into();
        model.active = Set(active);
        model.updated_at = Set(Utc::now());
        self.categories.update(model).await
    }

    async fn ensure_unreferenced(&self, name: &str) -> Result<(), ServiceError> {
        let count = self.products.count_by_category(name).await?;
        if count > 0 {
            return Err(ServiceError::Conflict(format!(
                "categoria '{}' possui {} produto(s) vinculado(s)",
                name, count
            )));
        }
        Ok(())
    }

    /// Inserts the default categories that are missing. Safe to run repeatedly.
    #[instrument(skip(self))]
    pub async fn seed(&self) -> Result<Vec<category::Model>, ServiceError> {
        let mut created = Vec::new();
        for (name, description) in DEFAULT_CATEGORIES {
            if self.categories.find_by_name(name).await?.is_some() {
                continue;
            }
            let payload = models::document_from(serde_json::json!({
                "name": name,
                "description": description,
                "active": true,
            }));
            match self.create(payload).await {
                Ok(category) => created.push(category),
                Err(ServiceError::DuplicateKey(detail)) => {
                    warn!(name, %detail, "category appeared concurrently while seeding");
                }
                Err(e) => return Err(e),
            }
        }
        info!(created = created.len(), "default categories seeded");
        Ok(created)
    }

    pub async fn summary(&self) -> Result<CategorySummary, ServiceError> {
        let total = self.categories.count(None).await?;
        let ativas = self.categories.count(Some(true)).await?;
        Ok(CategorySummary {
            total,
            ativas,
            inativas: total - ativas,
        })
    }
}
