use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum UserRole {
    #[sea_orm(string_value = "Administrador")]
    Administrador,
    #[sea_orm(string_value = "Cliente")]
    Cliente,
}

/// Stored account row. Never serialized directly; see `models::user::PublicUser`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub nome: String,
    #[sea_orm(unique)]
    pub email: String,
    pub senha_hash: String,
    pub tipo: UserRole,
    pub ativo: bool,
    pub email_confirmado: bool,
    pub token_confirmacao: Option<String>,
    pub token_expiracao: Option<DateTime<Utc>>,
    pub token_reset: Option<String>,
    pub token_reset_expiracao: Option<DateTime<Utc>>,
    pub telefone: Option<String>,
    pub endereco: Option<Json>,
    pub data_criacao: DateTime<Utc>,
    pub data_atualizacao: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
