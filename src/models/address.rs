use super::{apply_aliases, check_optional_text, check_text, Document, REQUIRED};
use crate::errors::FieldErrors;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref ESTADO_REGEX: Regex = Regex::new(r"^[A-Z]{2}$").unwrap();
    static ref CEP_REGEX: Regex = Regex::new(r"^[0-9]{8}$").unwrap();
}

const ALIASES: &[(&str, &str)] = &[
    ("street", "rua"),
    ("logradouro", "rua"),
    ("number", "numero"),
    ("neighborhood", "bairro"),
    ("city", "cidade"),
    ("state", "estado"),
    ("uf", "estado"),
    ("zip", "cep"),
    ("zip_code", "cep"),
];

const TEXT_FIELDS: &[&str] = &["rua", "numero", "complemento", "bairro", "cidade", "estado", "cep"];

/// Shapes a structured address. Non-object values are returned untouched.
pub fn normalize_address(value: Value) -> Value {
    let mut doc = match value {
        Value::Object(map) => map,
        other => return other,
    };
    apply_aliases(&mut doc, ALIASES);

    if let Some(Value::Number(n)) = doc.get("numero") {
        let numero = n.to_string();
        doc.insert("numero".to_string(), Value::String(numero));
    }
    for field in TEXT_FIELDS {
        if let Some(Value::String(text)) = doc.get_mut(*field) {
            let cleaned = match *field {
                "estado" => text.trim().to_uppercase(),
                "cep" => text
                    .chars()
                    .filter(|c| !matches!(c, '-' | '.' | ' '))
                    .collect(),
                _ => text.trim().to_string(),
            };
            *text = cleaned;
        }
    }
    Value::Object(doc)
}

/// Checks a normalized address, writing errors as `<prefix>.<field>`.
pub fn validate_address(value: &Value, prefix: &str, errors: &mut FieldErrors) {
    let doc: &Document = match value {
        Value::Object(map) => map,
        Value::Null => {
            errors.insert(prefix.to_string(), REQUIRED.to_string());
            return;
        }
        _ => {
            errors.insert(prefix.to_string(), "endereço inválido".to_string());
            return;
        }
    };
    let key = |field: &str| format!("{}.{}", prefix, field);

    check_text(doc, "rua", &key("rua"), 1, 200, errors);
    check_text(doc, "numero", &key("numero"), 1, 20, errors);
    check_optional_text(doc, "complemento", &key("complemento"), 0, 100, errors);
    check_text(doc, "bairro", &key("bairro"), 1, 100, errors);
    check_text(doc, "cidade", &key("cidade"), 1, 100, errors);

    let estado_key = key("estado");
    check_text(doc, "estado", &estado_key, 1, 2, errors);
    if !errors.contains_key(&estado_key) {
        if let Some(estado) = doc.get("estado").and_then(Value::as_str) {
            if !ESTADO_REGEX.is_match(estado) {
                errors.insert(estado_key, "deve ser a sigla do estado".to_string());
            }
        }
    }

    let cep_key = key("cep");
    check_text(doc, "cep", &cep_key, 1, 20, errors);
    if !errors.contains_key(&cep_key) {
        if let Some(cep) = doc.get("cep").and_then(Value::as_str) {
            if !CEP_REGEX.is_match(cep) {
                errors.insert(cep_key, "deve conter 8 dígitos".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "rua": " Rua das Flores ",
            "numero": 120,
            "bairro": "Centro",
            "cidade": "Curitiba",
            "estado": "pr",
            "cep": "80010-000"
        })
    }

    #[test]
    fn normalizes_address_fields() {
        let address = normalize_address(valid());
        assert_eq!(address["rua"], "Rua das Flores");
        assert_eq!(address["numero"], "120");
        assert_eq!(address["estado"], "PR");
        assert_eq!(address["cep"], "80010000");
        assert_eq!(normalize_address(address.clone()), address);
    }

    #[test]
    fn valid_address_has_no_errors() {
        let mut errors = FieldErrors::new();
        validate_address(&normalize_address(valid()), "endereco", &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn nested_errors_are_prefixed() {
        let mut errors = FieldErrors::new();
        let address = normalize_address(json!({"rua": "X", "estado": "Paraná", "cep": "123"}));
        validate_address(&address, "endereco", &mut errors);
        let keys: Vec<_> = errors.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "endereco.bairro",
                "endereco.cep",
                "endereco.cidade",
                "endereco.estado",
                "endereco.numero"
            ]
        );
    }
}
