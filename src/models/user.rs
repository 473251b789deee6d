use super::address::{normalize_address, validate_address};
use super::{
    apply_aliases, check_optional_bool, check_optional_text, check_text, coerce_bool_fields,
    into_result, str_field, trim_fields, Document, REQUIRED,
};
use crate::entities::user::{self, UserRole};
use crate::errors::FieldErrors;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

pub const ALIASES: &[(&str, &str)] = &[
    ("name", "nome"),
    ("password", "senha"),
    ("role", "tipo"),
    ("phone", "telefone"),
    ("address", "endereco"),
    ("active", "ativo"),
];

/// Whether a password must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Create,
    Update,
}

pub fn normalize(mut doc: Document) -> Document {
    apply_aliases(&mut doc, ALIASES);
    trim_fields(&mut doc, &["nome", "telefone"]);

    if let Some(Value::String(email)) = doc.get_mut("email") {
        *email = email.trim().to_lowercase();
    }
    if let Some(Value::String(tipo)) = doc.get_mut("tipo") {
        *tipo = canonical_role(tipo);
    }
    coerce_bool_fields(&mut doc, &["ativo", "email_confirmado"]);

    if let Some(endereco) = doc.remove("endereco") {
        doc.insert("endereco".to_string(), normalize_address(endereco));
    }
    doc
}

fn canonical_role(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "administrador" | "admin" => UserRole::Administrador.to_string(),
        "cliente" | "client" | "customer" => UserRole::Cliente.to_string(),
        _ => raw.trim().to_string(),
    }
}

pub fn validate(doc: &Document, mode: ValidationMode) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    check_text(doc, "nome", "nome", 2, 100, &mut errors);

    check_text(doc, "email", "email", 3, 255, &mut errors);
    if !errors.contains_key("email") {
        if let Some(email) = str_field(doc, "email") {
            if !EMAIL_REGEX.is_match(email) {
                errors.insert("email".into(), "email inválido".into());
            }
        }
    }

    if mode == ValidationMode::Create {
        if let Err(message) = check_password(doc.get("senha")) {
            errors.insert("senha".into(), message);
        }
    }

    match doc.get("tipo") {
        None | Some(Value::Null) => {}
        Some(Value::String(tipo)) if UserRole::from_str(tipo).is_ok() => {}
        Some(_) => {
            errors.insert(
                "tipo".into(),
                "deve ser 'Administrador' ou 'Cliente'".into(),
            );
        }
    }

    check_optional_text(doc, "telefone", "telefone", 0, 20, &mut errors);
    check_optional_bool(doc, "ativo", &mut errors);

    match doc.get("endereco") {
        None | Some(Value::Null) => {}
        Some(endereco) => validate_address(endereco, "endereco", &mut errors),
    }
    into_result(errors)
}

/// Password rules shared by creation, change and reset.
pub fn check_password(value: Option<&Value>) -> Result<(), String> {
    let senha = match value {
        None | Some(Value::Null) => return Err(REQUIRED.to_string()),
        Some(Value::String(s)) if s.is_empty() => return Err(REQUIRED.to_string()),
        Some(Value::String(s)) => s,
        Some(_) => return Err(super::NOT_TEXT.to_string()),
    };
    let len = senha.chars().count();
    if !(6..=100).contains(&len) {
        return Err("deve ter entre 6 e 100 caracteres".to_string());
    }
    let has_letter = senha.chars().any(char::is_alphabetic);
    let has_digit = senha.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("deve conter letras e números".to_string());
    }
    Ok(())
}

/// Account as exposed to callers: no hash, no tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub tipo: UserRole,
    pub ativo: bool,
    pub email_confirmado: bool,
    pub telefone: Option<String>,
    pub endereco: Option<Value>,
    pub data_criacao: DateTime<Utc>,
    pub data_atualizacao: DateTime<Utc>,
}

impl From<user::Model> for PublicUser {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            nome: model.nome,
            email: model.email,
            tipo: model.tipo,
            ativo: model.ativo,
            email_confirmado: model.email_confirmado,
            telefone: model.telefone,
            endereco: model.endereco,
            data_criacao: model.data_criacao,
            data_atualizacao: model.data_atualizacao,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document_from;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn normalizes_identity_fields() {
        let doc = normalize(document_from(json!({
            "name": "  Ana Souza ",
            "email": "  Ana@Example.COM ",
            "password": " senha123 ",
            "role": "administrador",
            "active": "1"
        })));
        assert_eq!(doc["nome"], "Ana Souza");
        assert_eq!(doc["email"], "ana@example.com");
        assert_eq!(doc["senha"], " senha123 ");
        assert_eq!(doc["tipo"], "Administrador");
        assert_eq!(doc["ativo"], true);
    }

    #[rstest]
    #[case("abc123", true)]
    #[case("abc12", false)]
    #[case("abcdefgh", false)]
    #[case("12345678", false)]
    #[case("", false)]
    fn password_rules(#[case] senha: &str, #[case] ok: bool) {
        assert_eq!(check_password(Some(&json!(senha))).is_ok(), ok);
    }

    #[test]
    fn update_mode_does_not_require_password() {
        let doc = normalize(document_from(json!({"nome": "Ana", "email": "ana@example.com"})));
        assert!(validate(&doc, ValidationMode::Update).is_ok());
        let errors = validate(&doc, ValidationMode::Create).unwrap_err();
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["senha"]);
    }

    #[test]
    fn collects_all_problems() {
        let doc = normalize(document_from(json!({
            "email": "not-an-email",
            "tipo": "Gerente",
            "telefone": "1".repeat(21),
            "endereco": {"rua": "Rua A"}
        })));
        let errors = validate(&doc, ValidationMode::Create).unwrap_err();
        for key in [
            "nome",
            "email",
            "senha",
            "tipo",
            "telefone",
            "endereco.numero",
            "endereco.cep",
        ] {
            assert!(errors.contains_key(key), "missing {key}: {errors:?}");
        }
    }
}
