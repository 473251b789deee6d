//! Business operations over the repositories and collaborators.

pub mod carts;
pub mod categories;
pub mod email;
pub mod favorites;
pub mod images;
pub mod orders;
pub mod products;
pub mod sequence;
pub mod tokens;
pub mod users;

use serde::{Deserialize, Serialize};

use crate::models::Document;
use crate::errors::ServiceError;

/// 1-based paging parameters as received from callers.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Resolves to `(page, page_size)` with the page at least 1 and the size in `1..=max`.
    pub fn resolve(&self, default_size: u64, max: u64) -> (u64, u64) {
        crate::repositories::clamp_page(self.page, self.page_size, default_size, max)
    }
}

/// One page of results plus the total count across pages.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

/// Serializes a stored row into a mutable document for merge-then-validate updates.
pub(crate) fn to_document<T: Serialize>(value: &T) -> Result<Document, ServiceError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(ServiceError::InternalError("expected an object".to_string())),
        Err(e) => Err(ServiceError::InternalError(e.to_string())),
    }
}

/// Rejects a payload `id` that differs from the addressed one and drops it otherwise.
pub(crate) fn take_immutable_id(payload: &mut Document, id: i64) -> Result<(), ServiceError> {
    match payload.remove("id") {
        None | Some(serde_json::Value::Null) => Ok(()),
        Some(value) if value.as_i64() == Some(id) => Ok(()),
        Some(_) => Err(ServiceError::field("id", "não pode ser alterado")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<u8> = Page {
            items: vec![],
            page: 1,
            page_size: 10,
            total: 21,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
