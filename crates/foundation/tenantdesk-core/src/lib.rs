//! # tenantdesk-core
//!
//! Foundation types shared by every tenantdesk crate: record status filters,
//! pagination math, collection names, request validation rules, password
//! hashing, the per-user epoch cipher and the JWT signer.

pub mod collection;
pub mod crypto;
pub mod paging;
pub mod status;
pub mod token;
pub mod validate;

pub use collection::{Collection, PlanTypeName, TenantRole};
pub use crypto::{generate_password, hash_password, verify_password, Epoch, EpochCipher};
pub use paging::{ListParams, PageData};
pub use status::{match_status, status_value, ListFilter, RecordStatus, StatusTarget};
pub use token::{parse_duration, Audience, Claims, TokenSigner};
pub use validate::{Rule, RuleSet};

/// Result type for tenantdesk-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tenantdesk-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Cipher operation failed: {0}")]
    Cipher(String),

    #[error("Invalid epoch: {0}")]
    InvalidEpoch(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}
