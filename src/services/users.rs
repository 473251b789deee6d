use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::email::EmailSender;
use super::sequence::{self, SequenceAllocator};
use super::tokens::{self, TokenIssuer, TokenPair};
use super::{take_immutable_id, to_document, Page, PageRequest};
use crate::entities::user::{self, UserRole};
use crate::errors::ServiceError;
use crate::models::user::{self as rules, PublicUser, ValidationMode};
use crate::models::{bool_field, str_field, Document};
use crate::repositories::{UserFilter, UserRepository};

/// Keys that can never be written through create/update payloads.
const PROTECTED_KEYS: &[&str] = &[
    "senha_hash",
    "email_confirmado",
    "token_confirmacao",
    "token_expiracao",
    "token_reset",
    "token_reset_expiracao",
    "data_criacao",
    "data_atualizacao",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub tipo: Option<String>,
    pub ativo: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub administradores: u64,
    pub clientes: u64,
    pub total: u64,
}

/// Lifetimes of the emailed tokens and the paging cap.
#[derive(Debug, Clone, Copy)]
pub struct AccountSettings {
    pub confirmation_ttl_hours: i64,
    pub reset_ttl_hours: i64,
    pub max_page_size: u64,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            confirmation_ttl_hours: 24,
            reset_ttl_hours: 1,
            max_page_size: 100,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    sequence: SequenceAllocator,
    tokens: TokenIssuer,
    email: Arc<dyn EmailSender>,
    settings: AccountSettings,
}

fn expired(expiry: Option<DateTime<Utc>>) -> bool {
    expiry.map_or(true, |at| at < Utc::now())
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        sequence: SequenceAllocator,
        tokens: TokenIssuer,
        email: Arc<dyn EmailSender>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            users: UserRepository::new(db),
            sequence,
            tokens,
            email,
            settings,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: UserQuery, paging: PageRequest) -> Result<Page<PublicUser>, ServiceError> {
        let (page, page_size) = paging.resolve(20, self.settings.max_page_size);
        let tipo = match query.tipo.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => Some(parse_role(raw)?),
            None => None,
        };
        let filter = UserFilter {
            tipo,
            ativo: query.ativo,
            search: query.search,
        };
        let (items, total) = self.users.list(&filter, page, page_size).await?;
        Ok(Page {
            items,
            page,
            page_size,
            total,
        }
        .map(PublicUser::from))
    }

    async fn find(&self, id: i64) -> Result<user::Model, ServiceError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("usuário", id))
    }

    pub async fn get(&self, id: i64) -> Result<PublicUser, ServiceError> {
        self.find(id).await.map(PublicUser::from)
    }

    /// Administradores start active and confirmed. Clientes start inactive and get a
    /// confirmation token by email.
    #[instrument(skip(self, payload))]
    pub async fn create(&self, payload: Document) -> Result<PublicUser, ServiceError> {
        let mut doc = rules::normalize(payload);
        doc.remove("id");
        for key in PROTECTED_KEYS {
            doc.remove(*key);
        }
        doc.entry("tipo")
            .or_insert_with(|| Value::String(UserRole::Cliente.to_string()));
        rules::validate(&doc, ValidationMode::Create).map_err(ServiceError::Validation)?;

        let tipo = str_field(&doc, "tipo")
            .and_then(|t| UserRole::from_str(t).ok())
            .unwrap_or(UserRole::Cliente);
        let senha = str_field(&doc, "senha").unwrap_or_default();
        let senha_hash = tokens::hash_password(senha)?;

        let is_admin = tipo == UserRole::Administrador;
        let (token, expiry) = if is_admin {
            (None, None)
        } else {
            (
                Some(tokens::generate_url_safe_token()),
                Some(Utc::now() + Duration::hours(self.settings.confirmation_ttl_hours)),
            )
        };

        let id = self.sequence.next(sequence::USERS).await?;
        let now = Utc::now();
        let created = self
            .users
            .create(user::ActiveModel {
                id: Set(id),
                nome: Set(str_field(&doc, "nome").unwrap_or_default().to_string()),
                email: Set(str_field(&doc, "email").unwrap_or_default().to_string()),
                senha_hash: Set(senha_hash),
                tipo: Set(tipo),
                ativo: Set(is_admin),
                email_confirmado: Set(is_admin),
                token_confirmacao: Set(token.clone()),
                token_expiracao: Set(expiry),
                token_reset: Set(None),
                token_reset_expiracao: Set(None),
                telefone: Set(optional_text(&doc, "telefone")),
                endereco: Set(optional_address(&doc)),
                data_criacao: Set(now),
                data_atualizacao: Set(now),
            })
            .await?;

        if let Some(token) = token {
            if let Err(e) = self
                .email
                .send_confirmation(&created.email, &created.nome, &token)
                .await
            {
                warn!(user_id = created.id, error = %e, "confirmation email not sent");
            }
        }

        info!(user_id = created.id, tipo = %created.tipo, "user created");
        Ok(created.into())
    }

    /// Profile update. Password, tokens and confirmation state are not writable here.
    #[instrument(skip(self, payload))]
    pub async fn update(&self, id: i64, payload: Document) -> Result<PublicUser, ServiceError> {
        let current = self.find(id).await?;
        let mut patch = rules::normalize(payload);
        take_immutable_id(&mut patch, id)?;
        patch.remove("senha");
        for key in PROTECTED_KEYS {
            patch.remove(*key);
        }

        let mut merged = to_document(&PublicUser::from(current.clone()))?;
        for key in ["id", "email_confirmado", "data_criacao", "data_atualizacao"] {
            merged.remove(key);
        }
        merged.extend(patch);
        let merged = rules::normalize(merged);
        rules::validate(&merged, ValidationMode::Update).map_err(ServiceError::Validation)?;

        let tipo = str_field(&merged, "tipo")
            .and_then(|t| UserRole::from_str(t).ok())
            .unwrap_or(current.tipo);
        let ativo = bool_field(&merged, "ativo").unwrap_or(current.ativo);
        let loses_admin = current.tipo == UserRole::Administrador
            && current.ativo
            && (tipo != UserRole::Administrador || !ativo);
        if loses_admin {
            self.ensure_not_last_admin().await?;
        }

        let mut model: user::ActiveModel = current.into();
        model.nome = Set(str_field(&merged, "nome").unwrap_or_default().to_string());
        model.email = Set(str_field(&merged, "email").unwrap_or_default().to_string());
        model.tipo = Set(tipo);
        model.ativo = Set(ativo);
        model.telefone = Set(optional_text(&merged, "telefone"));
        model.endereco = Set(optional_address(&merged));
        model.data_atualizacao = Set(Utc::now());

        let updated = self.users.update(model).await?;
        info!(user_id = id, "user updated");
        Ok(updated.into())
    }

    /// Soft delete: the account is deactivated, never removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<PublicUser, ServiceError> {
        let current = self.find(id).await?;
        if current.tipo == UserRole::Administrador && current.ativo {
            self.ensure_not_last_admin().await?;
        }
        let mut model: user::ActiveModel = current.into();
        model.ativo = Set(false);
        model.data_atualizacao = Set(Utc::now());
        let updated = self.users.update(model).await?;
        info!(user_id = id, "user deactivated");
        Ok(updated.into())
    }

    async fn ensure_not_last_admin(&self) -> Result<(), ServiceError> {
        if self.users.count_active(UserRole::Administrador).await? <= 1 {
            return Err(ServiceError::InvalidOperation(
                "não é possível desativar o último administrador ativo".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, senha))]
    pub async fn authenticate(&self, email: &str, senha: &str) -> Result<AuthSession, ServiceError> {
        let email = email.trim().to_lowercase();
        let invalid = || ServiceError::Unauthorized("email ou senha inválidos".to_string());

        let user = self.users.find_by_email(&email).await?.ok_or_else(invalid)?;
        if !tokens::verify_password(senha, &user.senha_hash) {
            return Err(invalid());
        }
        if !user.ativo || !user.email_confirmado {
            return Err(ServiceError::Unauthorized(
                "conta inativa ou email não confirmado".to_string(),
            ));
        }

        let tokens = self.tokens.issue(&user)?;
        info!(user_id = user.id, "user authenticated");
        Ok(AuthSession {
            user: user.into(),
            tokens,
        })
    }

    #[instrument(skip(self, senha_atual, nova_senha))]
    pub async fn change_password(&self, id: i64, senha_atual: &str, nova_senha: &str) -> Result<(), ServiceError> {
        let current = self.find(id).await?;
        if !tokens::verify_password(senha_atual, &current.senha_hash) {
            return Err(ServiceError::Unauthorized("senha atual incorreta".to_string()));
        }
        rules::check_password(Some(&Value::String(nova_senha.to_string())))
            .map_err(|message| ServiceError::field("nova_senha", message))?;

        let mut model: user::ActiveModel = current.into();
        model.senha_hash = Set(tokens::hash_password(nova_senha)?);
        model.data_atualizacao = Set(Utc::now());
        self.users.update(model).await?;
        info!(user_id = id, "password changed");
        Ok(())
    }

    /// Issues a reset token for a known email. Unknown emails are ignored silently.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), ServiceError> {
        let email = email.trim().to_lowercase();
        let Some(current) = self.users.find_by_email(&email).await? else {
            info!("password reset requested for unknown email");
            return Ok(());
        };

        let token = tokens::generate_url_safe_token();
        let (to, nome, id) = (current.email.clone(), current.nome.clone(), current.id);
        let mut model: user::ActiveModel = current.into();
        model.token_reset = Set(Some(token.clone()));
        model.token_reset_expiracao = Set(Some(Utc::now() + Duration::hours(self.settings.reset_ttl_hours)));
        model.data_atualizacao = Set(Utc::now());
        self.users.update(model).await?;

        if let Err(e) = self.email.send_password_reset(&to, &nome, &token).await {
            warn!(user_id = id, error = %e, "password reset email not sent");
        }
        info!(user_id = id, "password reset token issued");
        Ok(())
    }

    #[instrument(skip(self, token, nova_senha))]
    pub async fn reset_password(&self, token: &str, nova_senha: &str) -> Result<(), ServiceError> {
        let current = self
            .users
            .find_by_reset_token(token.trim())
            .await?
            .ok_or_else(|| ServiceError::NotFound("token de redefinição não encontrado".to_string()))?;
        if expired(current.token_reset_expiracao) {
            return Err(ServiceError::InvalidOperation("token de redefinição expirado".to_string()));
        }
        rules::check_password(Some(&Value::String(nova_senha.to_string())))
            .map_err(|message| ServiceError::field("nova_senha", message))?;

        let id = current.id;
        let mut model: user::ActiveModel = current.into();
        model.senha_hash = Set(tokens::hash_password(nova_senha)?);
        model.token_reset = Set(None);
        model.token_reset_expiracao = Set(None);
        model.data_atualizacao = Set(Utc::now());
        self.users.update(model).await?;
        info!(user_id = id, "password reset");
        Ok(())
    }

    /// Activates and confirms the account owning `token`.
    #[instrument(skip(self, token))]
    pub async fn confirm_email(&self, token: &str) -> Result<PublicUser, ServiceError> {
        let current = self
            .users
            .find_by_confirmation_token(token.trim())
            .await?
            .ok_or_else(|| ServiceError::NotFound("token de confirmação não encontrado".to_string()))?;
        if expired(current.token_expiracao) {
            return Err(ServiceError::InvalidOperation("token de confirmação expirado".to_string()));
        }

        let id = current.id;
        let mut model: user::ActiveModel = current.into();
        model.ativo = Set(true);
        model.email_confirmado = Set(true);
        model.token_confirmacao = Set(None);
        model.token_expiracao = Set(None);
        model.data_atualizacao = Set(Utc::now());
        let updated = self.users.update(model).await?;
        info!(user_id = id, "email confirmed");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), ServiceError> {
        let email = email.trim().to_lowercase();
        let current = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("usuário não encontrado".to_string()))?;
        if current.email_confirmado {
            return Err(ServiceError::InvalidOperation("email já confirmado".to_string()));
        }

        let token = tokens::generate_url_safe_token();
        let (to, nome, id) = (current.email.clone(), current.nome.clone(), current.id);
        let mut model: user::ActiveModel = current.into();
        model.token_confirmacao = Set(Some(token.clone()));
        model.token_expiracao = Set(Some(
            Utc::now() + Duration::hours(self.settings.confirmation_ttl_hours),
        ));
        model.data_atualizacao = Set(Utc::now());
        self.users.update(model).await?;

        self.email.send_confirmation(&to, &nome, &token).await?;
        info!(user_id = id, "confirmation email resent");
        Ok(())
    }

    pub fn types(&self) -> Vec<UserRole> {
        vec![UserRole::Administrador, UserRole::Cliente]
    }

    /// Active accounts per role.
    pub async fn summary(&self) -> Result<UserSummary, ServiceError> {
        let administradores = self.users.count_active(UserRole::Administrador).await?;
        let clientes = self.users.count_active(UserRole::Cliente).await?;
        Ok(UserSummary {
            administradores,
            clientes,
            total: administradores + clientes,
        })
    }
}

fn parse_role(raw: &str) -> Result<UserRole, ServiceError> {
    let doc = rules::normalize(crate::models::document_from(serde_json::json!({ "tipo": raw })));
    str_field(&doc, "tipo")
        .and_then(|t| UserRole::from_str(t).ok())
        .ok_or_else(|| ServiceError::field("tipo", "deve ser 'Administrador' ou 'Cliente'"))
}

fn optional_text(doc: &Document, field: &str) -> Option<String> {
    str_field(doc, field)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn optional_address(doc: &Document) -> Option<Value> {
    doc.get("endereco").filter(|v| !v.is_null()).cloned()
}
