use super::{apply_aliases, check_text, into_result, str_field, trim_fields, Document, REQUIRED};
use crate::entities::product::ProductStatus;
use crate::errors::FieldErrors;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::collections::HashSet;
use std::str::FromStr;

pub const ALIASES: &[(&str, &str)] = &[
    ("nome", "titulo"),
    ("title", "titulo"),
    ("description", "descricao"),
    ("price", "preco"),
    ("category", "categoria"),
    ("imagem_url", "imagem"),
    ("image_url", "imagem"),
];

const TEXT_FIELDS: &[&str] = &["titulo", "descricao", "categoria", "imagem"];

pub fn normalize(mut doc: Document) -> Document {
    apply_aliases(&mut doc, ALIASES);
    trim_fields(&mut doc, TEXT_FIELDS);

    if let Some(Value::String(raw)) = doc.get("preco") {
        let cleaned = raw.trim().replace(',', ".");
        let parsed = cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(raw.trim().to_string()));
        doc.insert("preco".to_string(), parsed);
    }

    if let Some(Value::String(raw)) = doc.get("status") {
        let status = match raw.trim().to_lowercase().as_str() {
            "available" | "disponível" => "disponivel".to_string(),
            "sold" => "vendido".to_string(),
            other => other.to_string(),
        };
        doc.insert("status".to_string(), Value::String(status));
    }
    doc
}

/// Rewrites `categoria` to the spelling of the active category it names when
/// the two differ only in case. Unknown names are left for [`validate`] to report.
pub fn canonicalize_category(doc: &mut Document, active_categories: &HashSet<String>) {
    let Some(categoria) = str_field(doc, "categoria") else {
        return;
    };
    if active_categories.contains(categoria) {
        return;
    }
    let wanted = categoria.to_lowercase();
    let canonical = active_categories
        .iter()
        .filter(|name| name.to_lowercase() == wanted)
        .min()
        .cloned();
    if let Some(name) = canonical {
        doc.insert("categoria".to_string(), Value::String(name));
    }
}

/// `active_categories` is the live set of active category names.
pub fn validate(doc: &Document, active_categories: &HashSet<String>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_text(doc, "titulo", "titulo", 2, 100, &mut errors);
    check_text(doc, "descricao", "descricao", 10, 500, &mut errors);

    match doc.get("preco") {
        None | Some(Value::Null) => {
            errors.insert("preco".into(), REQUIRED.into());
        }
        Some(Value::Number(n)) => {
            if n.as_f64().map_or(true, |v| v < 0.0) {
                errors.insert("preco".into(), "não pode ser negativo".into());
            }
        }
        Some(_) => {
            errors.insert("preco".into(), "deve ser um número".into());
        }
    }

    check_text(doc, "categoria", "categoria", 1, 50, &mut errors);
    if !errors.contains_key("categoria") {
        if let Some(categoria) = str_field(doc, "categoria") {
            if !active_categories.contains(categoria) {
                errors.insert(
                    "categoria".into(),
                    format!("categoria '{}' não existe ou está inativa", categoria),
                );
            }
        }
    }

    check_text(doc, "imagem", "imagem", 1, 2048, &mut errors);

    match doc.get("status") {
        None | Some(Value::Null) => {}
        Some(Value::String(status)) if ProductStatus::from_str(status).is_ok() => {}
        Some(_) => {
            errors.insert("status".into(), "deve ser 'disponivel' ou 'vendido'".into());
        }
    }
    into_result(errors)
}

/// Typed view of a validated product document.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub titulo: String,
    pub descricao: String,
    pub preco: Decimal,
    pub categoria: String,
    pub imagem: String,
    pub status: ProductStatus,
}

impl ProductDraft {
    /// Returns `None` when the document did not pass [`validate`].
    pub fn from_document(doc: &Document) -> Option<Self> {
        let preco = doc
            .get("preco")
            .and_then(Value::as_f64)
            .and_then(Decimal::from_f64)?
            .round_dp(2);
        let status = match str_field(doc, "status") {
            Some(s) => ProductStatus::from_str(s).ok()?,
            None => ProductStatus::Disponivel,
        };
        Some(Self {
            titulo: str_field(doc, "titulo")?.to_string(),
            descricao: str_field(doc, "descricao")?.to_string(),
            preco,
            categoria: str_field(doc, "categoria")?.to_string(),
            imagem: str_field(doc, "imagem")?.to_string(),
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document_from;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn categories() -> HashSet<String> {
        ["Casual".to_string()].into_iter().collect()
    }

    #[test]
    fn normalizes_price_and_status() {
        let doc = normalize(document_from(json!({
            "nome": " T-Shirt ",
            "price": " 29,90 ",
            "status": "Available",
            "image_url": "http://x/img.jpg"
        })));
        assert_eq!(doc.get("titulo"), Some(&json!("T-Shirt")));
        assert_eq!(doc.get("preco").and_then(Value::as_f64), Some(29.9));
        assert_eq!(doc.get("status"), Some(&json!("disponivel")));
        assert_eq!(doc.get("imagem"), Some(&json!("http://x/img.jpg")));
    }

    #[test]
    fn unparsable_price_is_kept_for_the_validator() {
        let doc = normalize(document_from(json!({"preco": "caro"})));
        assert_eq!(doc.get("preco"), Some(&json!("caro")));
        let errors = validate(&doc, &categories()).unwrap_err();
        assert_eq!(errors["preco"], "deve ser um número");
    }

    #[test]
    fn reports_exactly_the_missing_fields() {
        let doc = normalize(document_from(json!({
            "titulo": "T-Shirt",
            "categoria": "Casual"
        })));
        let errors = validate(&doc, &categories()).unwrap_err();
        let keys: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["descricao", "imagem", "preco"]);
    }

    #[test]
    fn rejects_inactive_or_unknown_category() {
        let doc = normalize(document_from(json!({
            "titulo": "T-Shirt",
            "descricao": "Plain cotton tee size M",
            "preco": 29.9,
            "categoria": "Festa",
            "imagem": "http://x/img.jpg"
        })));
        let errors = validate(&doc, &categories()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("categoria"));
    }

    #[test]
    fn category_case_follows_the_active_name() {
        let mut doc = normalize(document_from(json!({"category": " cAsUaL "})));
        canonicalize_category(&mut doc, &categories());
        assert_eq!(doc.get("categoria"), Some(&json!("Casual")));

        let mut unknown = document_from(json!({"categoria": "festa"}));
        canonicalize_category(&mut unknown, &categories());
        assert_eq!(unknown.get("categoria"), Some(&json!("festa")));
    }

    #[test]
    fn rejects_negative_price_and_unknown_status() {
        let doc = normalize(document_from(json!({
            "titulo": "T-Shirt",
            "descricao": "Plain cotton tee size M",
            "preco": -1,
            "categoria": "Casual",
            "imagem": "http://x/img.jpg",
            "status": "reservado"
        })));
        let errors = validate(&doc, &categories()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("preco"));
        assert!(errors.contains_key("status"));
    }

    #[test]
    fn draft_defaults_status_and_rounds_price() {
        let doc = normalize(document_from(json!({
            "titulo": "T-Shirt",
            "descricao": "Plain cotton tee size M",
            "preco": "29.899",
            "categoria": "Casual",
            "imagem": "http://x/img.jpg"
        })));
        validate(&doc, &categories()).unwrap();
        let draft = ProductDraft::from_document(&doc).unwrap();
        assert_eq!(draft.preco, dec!(29.90));
        assert_eq!(draft.status, ProductStatus::Disponivel);
    }
}
