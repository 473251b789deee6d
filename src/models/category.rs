use super::{
    apply_aliases, check_optional_bool, check_text, coerce_bool_fields, into_result, trim_fields,
    Document,
};
use crate::errors::FieldErrors;

/// Historical input names for the category fields.
pub const ALIASES: &[(&str, &str)] = &[
    ("nome", "name"),
    ("titulo", "name"),
    ("categoria", "name"),
    ("descricao", "description"),
    ("ativo", "active"),
];

pub fn normalize(mut doc: Document) -> Document {
    apply_aliases(&mut doc, ALIASES);
    trim_fields(&mut doc, &["name", "description"]);
    coerce_bool_fields(&mut doc, &["active"]);
    doc
}

pub fn validate(doc: &Document) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_text(doc, "name", "name", 2, 50, &mut errors);
    check_text(doc, "description", "description", 5, 200, &mut errors);
    check_optional_bool(doc, "active", &mut errors);
    into_result(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document_from;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn maps_legacy_names() {
        let doc = normalize(document_from(json!({
            "nome": "  Casual ",
            "descricao": "Everyday wear",
            "ativo": "sim"
        })));
        assert_eq!(doc.get("name"), Some(&json!("Casual")));
        assert_eq!(doc.get("description"), Some(&json!("Everyday wear")));
        assert_eq!(doc.get("active"), Some(&json!(true)));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn reports_every_missing_field() {
        let errors = validate(&normalize(document_from(json!({"active": "talvez"})))).unwrap_err();
        let keys: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["active", "description", "name"]);
    }

    #[rstest]
    #[case("C", false)]
    #[case("Ca", true)]
    #[case(&"x".repeat(50), true)]
    #[case(&"x".repeat(51), false)]
    fn name_length_bounds(#[case] name: &str, #[case] ok: bool) {
        let doc = normalize(document_from(json!({"name": name, "description": "Roupas do dia"})));
        assert_eq!(validate(&doc).is_ok(), ok);
    }
}
