use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};
use std::sync::Arc;

use crate::entities::user::{
    ActiveModel as UserActiveModel, Column, Entity as User, Model as UserModel, UserRole,
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

use super::BaseRepository;

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub tipo: Option<UserRole>,
    pub ativo: Option<bool>,
    /// Case-insensitive substring over nome and email.
    pub search: Option<String>,
}

/// Repository for user accounts
#[derive(Debug, Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn create(&self, user: UserActiveModel) -> Result<UserModel, ServiceError> {
        Ok(user.insert(self.base.get_db()).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find_by_id(id).one(self.base.get_db()).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find()
            .filter(Column::Email.eq(email))
            .one(self.base.get_db())
            .await?)
    }

    pub async fn find_by_confirmation_token(&self, token: &str) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find()
            .filter(Column::TokenConfirmacao.eq(token))
            .one(self.base.get_db())
            .await?)
    }

    pub async fn find_by_reset_token(&self, token: &str) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find()
            .filter(Column::TokenReset.eq(token))
            .one(self.base.get_db())
            .await?)
    }

    /// Newest accounts first.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<UserModel>, u64), ServiceError> {
        let mut query = User::find();
        if let Some(tipo) = filter.tipo {
            query = query.filter(Column::Tipo.eq(tipo));
        }
        if let Some(ativo) = filter.ativo {
            query = query.filter(Column::Ativo.eq(ativo));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(Column::Nome))).like(pattern.clone()))
                    .add(Expr::col(Column::Email).like(pattern)),
            );
        }
        let paginator = query
            .order_by_desc(Column::DataCriacao)
            .order_by_desc(Column::Id)
            .paginate(self.base.get_db(), page_size);

        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page - 1).await?;
        Ok((users, total))
    }

    pub async fn update(&self, user: UserActiveModel) -> Result<UserModel, ServiceError> {
        Ok(user.update(self.base.get_db()).await?)
    }

    pub async fn count_active(&self, tipo: UserRole) -> Result<u64, ServiceError> {
        Ok(User::find()
            .filter(Column::Tipo.eq(tipo))
            .filter(Column::Ativo.eq(true))
            .count(self.base.get_db())
            .await?)
    }
}
