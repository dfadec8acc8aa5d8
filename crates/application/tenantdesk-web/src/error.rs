use axum::response::{IntoResponse, Response};

use crate::reply::Reply;

pub type Result<T> = std::result::Result<T, Error>;

/// Handler outcome that short-circuits the normal reply.
///
/// `Reject` carries a finished reply (validation, auth, not found) so
/// handlers can bail out with `?`. Everything else reaches the client as a
/// 500 `Server error`; the detail stays in the log.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rejected: {}", .0.message)]
    Reject(Reply),

    #[error("store: {0}")]
    Store(#[from] tenantdesk_mongodb::Error),

    #[error("core: {0}")]
    Core(#[from] tenantdesk_core::Error),

    #[error("config: {0}")]
    Config(#[from] tenantdesk_config::Error),

    #[error("invalid mail address {raw:?}: {source}")]
    MailAddress {
        raw: String,
        source: lettre::address::AddressError,
    },

    #[error("mail message: {0}")]
    MailMessage(#[from] lettre::error::Error),

    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<Reply> for Error {
    fn from(reply: Reply) -> Self {
        Error::Reject(reply)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Reject(reply) => reply.into_response(),
            other => {
                tracing::error!(error = %other, "Request failed");
                Reply::server_error().into_response()
            }
        }
    }
}
