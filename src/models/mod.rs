//! Normalizers and validators for the documents accepted by the API.
//!
//! Every entity goes through the same two passes. `normalize` reshapes raw JSON
//! (alias keys, whitespace, boolean-like strings) and never rejects anything.
//! `validate` judges the normalized document and reports every problem at once.

pub mod address;
pub mod category;
pub mod order;
pub mod product;
pub mod user;

use crate::errors::FieldErrors;
use serde_json::{Map, Value};

/// Raw or normalized JSON object.
pub type Document = Map<String, Value>;

pub(crate) const REQUIRED: &str = "campo obrigatório";
pub(crate) const NOT_TEXT: &str = "deve ser um texto";
pub(crate) const NOT_BOOLEAN: &str = "deve ser verdadeiro ou falso";

/// Moves every alias key onto its canonical key. Rules are applied in order; a
/// canonical key already present wins and the alias is dropped either way.
pub(crate) fn apply_aliases(doc: &mut Document, rules: &[(&str, &str)]) {
    for (alias, canonical) in rules {
        if let Some(value) = doc.remove(*alias) {
            if !doc.contains_key(*canonical) {
                doc.insert((*canonical).to_string(), value);
            }
        }
    }
}

pub(crate) fn trim_fields(doc: &mut Document, fields: &[&str]) {
    for field in fields {
        if let Some(Value::String(text)) = doc.get_mut(*field) {
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                *text = trimmed.to_string();
            }
        }
    }
}

/// Interprets common boolean spellings. Unknown values are returned unchanged.
pub(crate) fn coerce_bool(value: &Value) -> Value {
    match value {
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "1" | "sim" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "não" | "nao" | "no" | "off" => Value::Bool(false),
            _ => Value::String(text.trim().to_string()),
        },
        Value::Number(n) if n.as_i64() == Some(1) => Value::Bool(true),
        Value::Number(n) if n.as_i64() == Some(0) => Value::Bool(false),
        other => other.clone(),
    }
}

pub(crate) fn coerce_bool_fields(doc: &mut Document, fields: &[&str]) {
    for field in fields {
        if let Some(value) = doc.get_mut(*field) {
            *value = coerce_bool(value);
        }
    }
}

pub fn str_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

pub fn bool_field(doc: &Document, field: &str) -> Option<bool> {
    doc.get(field).and_then(Value::as_bool)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        _ => false,
    }
}

/// Required text with an inclusive character-length range.
pub(crate) fn check_text(
    doc: &Document,
    field: &str,
    key: &str,
    min: usize,
    max: usize,
    errors: &mut FieldErrors,
) {
    let value = doc.get(field);
    if is_blank(value) {
        errors.insert(key.to_string(), REQUIRED.to_string());
        return;
    }
    check_length(value, key, min, max, errors);
}

/// Optional text; absent or null is accepted.
pub(crate) fn check_optional_text(
    doc: &Document,
    field: &str,
    key: &str,
    min: usize,
    max: usize,
    errors: &mut FieldErrors,
) {
    match doc.get(field) {
        None | Some(Value::Null) => {}
        value => check_length(value, key, min, max, errors),
    }
}

fn check_length(value: Option<&Value>, key: &str, min: usize, max: usize, errors: &mut FieldErrors) {
    match value {
        Some(Value::String(text)) => {
            let len = text.chars().count();
            if len < min || len > max {
                let message = if min == 0 {
                    format!("deve ter no máximo {} caracteres", max)
                } else {
                    format!("deve ter entre {} e {} caracteres", min, max)
                };
                errors.insert(key.to_string(), message);
            }
        }
        _ => {
            errors.insert(key.to_string(), NOT_TEXT.to_string());
        }
    }
}

pub(crate) fn check_optional_bool(doc: &Document, field: &str, errors: &mut FieldErrors) {
    match doc.get(field) {
        None | Some(Value::Null) | Some(Value::Bool(_)) => {}
        Some(_) => {
            errors.insert(field.to_string(), NOT_BOOLEAN.to_string());
        }
    }
}

pub(crate) fn into_result(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Expects an object payload; anything else normalizes to an empty document.
pub fn document_from(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("true"), json!(true))]
    #[case(json!(" SIM "), json!(true))]
    #[case(json!("On"), json!(true))]
    #[case(json!(1), json!(true))]
    #[case(json!("Não"), json!(false))]
    #[case(json!("no"), json!(false))]
    #[case(json!(0), json!(false))]
    #[case(json!(false), json!(false))]
    #[case(json!(" talvez "), json!("talvez"))]
    #[case(json!(7), json!(7))]
    fn coerces_boolean_spellings(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(coerce_bool(&input), expected);
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let mut doc = document_from(json!({"nome": "A", "name": "B", "titulo": "C"}));
        apply_aliases(&mut doc, &[("nome", "name"), ("titulo", "name")]);
        assert_eq!(doc.get("name"), Some(&json!("B")));
        assert!(!doc.contains_key("nome"));
        assert!(!doc.contains_key("titulo"));
    }

    #[test]
    fn first_alias_wins_when_canonical_missing() {
        let mut doc = document_from(json!({"titulo": "C", "nome": "A"}));
        apply_aliases(&mut doc, &[("nome", "name"), ("titulo", "name")]);
        assert_eq!(doc.get("name"), Some(&json!("A")));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn text_checks_count_characters_not_bytes() {
        let doc = document_from(json!({"nome": "Çé"}));
        let mut errors = FieldErrors::new();
        check_text(&doc, "nome", "nome", 2, 2, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn blank_text_is_missing() {
        let doc = document_from(json!({"nome": "   ", "idade": 3}));
        let mut errors = FieldErrors::new();
        check_text(&doc, "nome", "nome", 2, 10, &mut errors);
        check_text(&doc, "idade", "idade", 1, 10, &mut errors);
        assert_eq!(errors.get("nome").map(String::as_str), Some(REQUIRED));
        assert_eq!(errors.get("idade").map(String::as_str), Some(NOT_TEXT));
    }
}
