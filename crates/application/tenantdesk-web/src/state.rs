//! Shared application state

use std::sync::Arc;

use tenantdesk_config::Config;
use tenantdesk_core::{EpochCipher, TokenSigner};
use tenantdesk_mongodb::DocumentStore;

use crate::error::Result;
use crate::mail::{MailTransport, Mailer};

/// Everything a handler needs, shared behind an `Arc`.
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Config,
    /// Admin console sessions.
    pub admin_tokens: TokenSigner,
    /// Admin password reset links.
    pub reset_tokens: TokenSigner,
    /// Customer admin panel sessions.
    pub cap_tokens: TokenSigner,
    /// Lead invite links.
    pub invite_tokens: TokenSigner,
    pub cipher: EpochCipher,
    pub mailer: Mailer,
    /// Largest accepted request body.
    pub body_limit: usize,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self> {
        let auth = &config.auth;
        let admin_tokens = TokenSigner::new(&auth.admin_secret, config.admin_ttl()?);
        let reset_tokens = TokenSigner::new(&auth.admin_secret, config.admin_passlink_ttl()?);
        let cap_tokens = TokenSigner::new(&auth.cap_secret, config.cap_ttl()?);
        let invite_tokens = TokenSigner::new(&auth.customer_secret, config.lead_invite_ttl()?);
        let cipher = EpochCipher::new(&auth.crypto_secret)?;
        let body_limit = config.max_body_bytes()?;
        let mailer = Mailer::new(store.clone(), transport, &config.mail);

        Ok(Self {
            store,
            admin_tokens,
            reset_tokens,
            cap_tokens,
            invite_tokens,
            cipher,
            mailer,
            body_limit,
            config,
        })
    }

    /// Dev environments echo ids and links back in replies.
    pub fn is_dev(&self) -> bool {
        self.config.env.is_dev()
    }
}
