use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, Set};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::images::{ImageStorage, ImageUpload};
use super::sequence::{self, SequenceAllocator};
use super::{take_immutable_id, to_document, Page, PageRequest};
use crate::entities::product::{self, ProductStatus};
use crate::errors::ServiceError;
use crate::models::product::{self as rules, ProductDraft};
use crate::models::Document;
use crate::repositories::{CategoryRepository, ProductFilter, ProductRepository};

/// Listing parameters accepted by [`ProductService::list`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub categoria: Option<String>,
    pub status: Option<String>,
    pub q: Option<String>,
}

/// Text relevance of `product` for `terms`: 2 per occurrence in the title, 1 per
/// occurrence in the description. Terms are expected lower-cased.
pub fn relevance(product: &product::Model, terms: &[String]) -> usize {
    let titulo = product.titulo.to_lowercase();
    let descricao = product.descricao.to_lowercase();
    terms
        .iter()
        .map(|term| 2 * titulo.matches(term.as_str()).count() + descricao.matches(term.as_str()).count())
        .sum()
}

fn parse_status(raw: &str) -> Result<ProductStatus, ServiceError> {
    let normalized = rules::normalize(crate::models::document_from(
        serde_json::json!({ "status": raw }),
    ));
    normalized
        .get("status")
        .and_then(Value::as_str)
        .and_then(|s| ProductStatus::from_str(s).ok())
        .ok_or_else(|| ServiceError::field("status", "deve ser 'disponivel' ou 'vendido'"))
}

#[derive(Clone)]
pub struct ProductService {
    products: ProductRepository,
    categories: CategoryRepository,
    sequence: SequenceAllocator,
    images: Arc<dyn ImageStorage>,
    default_page_size: u64,
    max_page_size: u64,
}

impl ProductService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        sequence: SequenceAllocator,
        images: Arc<dyn ImageStorage>,
        default_page_size: u64,
        max_page_size: u64,
    ) -> Self {
        Self {
            products: ProductRepository::new(db.clone()),
            categories: CategoryRepository::new(db),
            sequence,
            images,
            default_page_size,
            max_page_size,
        }
    }

    /// Filtered listing. With a non-empty `q` the results are ranked by
    /// [`relevance`], ties broken by id, and products without a hit are left out.
    #[instrument(skip(self))]
    pub async fn list(&self, query: ProductQuery, paging: PageRequest) -> Result<Page<product::Model>, ServiceError> {
        let (page, page_size) = paging.resolve(self.default_page_size, self.max_page_size);
        let filter = ProductFilter {
            categoria: query
                .categoria
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            status: match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => Some(parse_status(raw)?),
                None => None,
            },
        };

        let terms: Vec<String> = query
            .q
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        if terms.is_empty() {
            let (items, total) = self.products.list(&filter, page, page_size).await?;
            return Ok(Page {
                items,
                page,
                page_size,
                total,
            });
        }

        let mut scored: Vec<(usize, product::Model)> = self
            .products
            .find_matching(&filter)
            .await?
            .into_iter()
            .map(|p| (relevance(&p, &terms), p))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then(a.id.cmp(&b.id)));

        let total = scored.len() as u64;
        let offset = usize::try_from((page - 1).saturating_mul(page_size)).unwrap_or(usize::MAX);
        let items = scored
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .map(|(_, p)| p)
            .collect();
        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }

    pub async fn get(&self, id: i64) -> Result<product::Model, ServiceError> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("produto", id))
    }

    /// Normalize, validate against the live category set, allocate an id, insert.
    #[instrument(skip(self, payload))]
    pub async fn create(&self, payload: Document) -> Result<product::Model, ServiceError> {
        let mut doc = rules::normalize(payload);
        doc.remove("id");
        doc.entry("status")
            .or_insert_with(|| Value::String(ProductStatus::Disponivel.to_string()));

        let active = self.categories.active_names().await?;
        rules::canonicalize_category(&mut doc, &active);
        rules::validate(&doc, &active).map_err(ServiceError::Validation)?;
        let draft = ProductDraft::from_document(&doc)
            .ok_or_else(|| ServiceError::InternalError("validated product is incomplete".into()))?;

        let id = self.sequence.next(sequence::PRODUCTS).await?;
        let now = Utc::now();
        let created = self
            .products
            .create(product::ActiveModel {
                id: Set(id),
                titulo: Set(draft.titulo),
                descricao: Set(draft.descricao),
                preco: Set(draft.preco),
                categoria: Set(draft.categoria),
                imagem: Set(draft.imagem),
                status: Set(draft.status),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .await?;

        info!(product_id = created.id, categoria = %created.categoria, "product created");
        Ok(created)
    }

    /// Stores the image first, then creates the product pointing at it. The image
    /// is removed again when the product cannot be created.
    #[instrument(skip(self, payload, upload))]
    pub async fn create_with_image(&self, mut payload: Document, upload: ImageUpload) -> Result<product::Model, ServiceError> {
        let url = self.images.upload(upload, None).await?;
        payload.insert("imagem".to_string(), Value::String(url.clone()));
        payload.remove("imagem_url");
        payload.remove("image_url");

        match self.create(payload).await {
            Ok(created) => Ok(created),
            Err(e) => {
                self.discard_image(&url).await;
                Err(e)
            }
        }
    }

    /// Merge-then-validate update; the stored row is untouched when validation fails.
    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: Document) -> Result<product::Model, ServiceError> {
        let current = self.get(id).await?;
        let mut patch = rules::normalize(payload);
        take_immutable_id(&mut patch, id)?;

        let mut merged = to_document(&current)?;
        for key in ["id", "created_at", "updated_at"] {
            merged.remove(key);
        }
        merged.extend(patch);
        let mut merged = rules::normalize(merged);

        let active = self.categories.active_names().await?;
        rules::canonicalize_category(&mut merged, &active);
        rules::validate(&merged, &active).map_err(ServiceError::Validation)?;
        let draft = ProductDraft::from_document(&merged)
            .ok_or_else(|| ServiceError::InternalError("validated product is incomplete".into()))?;

        let updated = self
            .products
            .update(product::ActiveModel {
                id: Set(id),
                titulo: Set(draft.titulo),
                descricao: Set(draft.descricao),
                preco: Set(draft.preco),
                categoria: Set(draft.categoria),
                imagem: Set(draft.imagem),
                status: Set(draft.status),
                created_at: Set(current.created_at),
                updated_at: Set(Utc::now()),
            })
            .await?;

        info!(product_id = id, "product updated");
        Ok(updated)
    }

    /// Uploads a new image, points the product at it and drops the previous one.
    #[instrument(skip(self, upload))]
    pub async fn replace_image(&self, id: i64, upload: ImageUpload) -> Result<product::Model, ServiceError> {
        let current = self.get(id).await?;
        let url = self.images.upload(upload, Some(id)).await?;

        let old = current.imagem.clone();
        let mut model: product::ActiveModel = current.into();
        model.imagem = Set(url.clone());
        model.updated_at = Set(Utc::now());

        let updated = match self.products.update(model).await {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_image(&url).await;
                return Err(e);
            }
        };
        if old != url {
            self.discard_image(&old).await;
        }
        info!(product_id = id, "product image replaced");
        Ok(updated)
    }

    /// Hard delete followed by best-effort removal of the stored image.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let current = self.get(id).await?;
        if !self.products.delete(id).await? {
            return Err(ServiceError::not_found("produto", id));
        }
        self.discard_image(&current.imagem).await;
        info!(product_id = id, "product deleted");
        Ok(())
    }

    /// Products of one category by title. An empty category is reported as not found.
    pub async fn by_category(&self, categoria: &str, paging: PageRequest) -> Result<Page<product::Model>, ServiceError> {
        let (page, page_size) = paging.resolve(20, self.max_page_size);
        let (items, total) = self
            .products
            .list_by_category(categoria.trim(), page, page_size)
            .await?;
        if total == 0 {
            return Err(ServiceError::NotFound(format!(
                "nenhum produto encontrado na categoria '{}'",
                categoria.trim()
            )));
        }
        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }

    async fn discard_image(&self, url: &str) {
        if let Err(e) = self.images.delete(url).await {
            warn!(%url, error = %e, "failed to delete image");
        }
    }
}
