//! Error types for idlink.

use thiserror::Error;
use uuid::Uuid;

/// Top-level result type for idlink operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Top-level error type for idlink.
///
/// Self-links, duplicate links, unlinking an unlinked pair and invalid tokens
/// are normal outcomes and never surface here.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("account not found: user {} in {}", .user_id, tenant_label(.tenant_id))]
    AccountNotFound {
        tenant_id: Option<Uuid>,
        user_id: Uuid,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("token error: {0}")]
    Token(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid identity reference: {0}")]
    InvalidIdentity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Shorthand for wrapping a backend failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

fn tenant_label(tenant_id: &Option<Uuid>) -> String {
    match tenant_id {
        Some(id) => format!("tenant {id}"),
        None => "host".to_string(),
    }
}
