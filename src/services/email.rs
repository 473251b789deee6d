use async_trait::async_trait;
use tracing::info;

use crate::errors::ServiceError;

/// Outbound email collaborator. The core only hands over recipient, name and token.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_confirmation(&self, to: &str, nome: &str, token: &str) -> Result<(), ServiceError>;

    async fn send_password_reset(&self, to: &str, nome: &str, token: &str) -> Result<(), ServiceError>;
}

/// Writes the links to the log instead of delivering mail.
#[derive(Debug, Clone)]
pub struct LogEmailSender {
    frontend_url: String,
}

impl LogEmailSender {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn confirmation_link(&self, token: &str) -> String {
        format!("{}/confirmar-email/{}", self.frontend_url, token)
    }

    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/redefinir-senha/{}", self.frontend_url, token)
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_confirmation(&self, to: &str, nome: &str, token: &str) -> Result<(), ServiceError> {
        info!(to, nome, link = %self.confirmation_link(token), "confirmation email queued");
        Ok(())
    }

    async fn send_password_reset(&self, to: &str, nome: &str, token: &str) -> Result<(), ServiceError> {
        info!(to, nome, link = %self.reset_link(token), "password reset email queued");
        Ok(())
    }
}
