//! Shared server state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use docseal_catalog::{DocumentRepository, PermissionChecker};
use docseal_common::{Identity, Result};
use docseal_service::{
    ratelimit, DownloadGateway, DownloadService, PasswordCodec, ServiceConfig,
};
use docseal_storage::ContentStore;

/// State shared by all request handlers.
pub struct AppState {
    pub gateway: DownloadGateway,
    pub auth: TokenAuthenticator,
}

impl AppState {
    pub fn new(gateway: DownloadGateway, auth: TokenAuthenticator) -> Self {
        Self { gateway, auth }
    }

    /// Wire the download stack from configuration.
    ///
    /// # Errors
    /// - `InvalidInput` if any configured cost, limit or token is invalid
    pub fn from_config(
        config: &ServiceConfig,
        repository: Arc<dyn DocumentRepository>,
        permissions: Arc<dyn PermissionChecker>,
        store: Arc<dyn ContentStore>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let codec = PasswordCodec::new(config.build_encoder()?);
        let service = DownloadService::new(
            repository,
            permissions,
            store,
            Arc::new(codec),
            config.staging_dir(),
        );
        let gateway = DownloadGateway::new(Arc::new(service), ratelimit::from_config(&config.rate_limit)?);
        let auth = TokenAuthenticator::new(&config.server.tokens)?;

        Ok(Arc::new(Self::new(gateway, auth)))
    }
}

/// Maps bearer tokens to identities.
pub struct TokenAuthenticator {
    tokens: HashMap<String, Identity>,
}

impl TokenAuthenticator {
    /// Build from a token to user id map.
    ///
    /// # Errors
    /// - `InvalidInput` if a token is empty or a user id is blank
    pub fn new(tokens: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = HashMap::with_capacity(tokens.len());
        for (token, user_id) in tokens {
            if token.is_empty() {
                return Err(docseal_common::Error::InvalidInput(
                    "Bearer token cannot be empty".to_string(),
                ));
            }
            map.insert(token.clone(), Identity::new(user_id.clone())?);
        }
        Ok(Self { tokens: map })
    }

    /// Look up the identity for a token.
    pub fn identify(&self, token: &str) -> Option<&Identity> {
        self.tokens.get(token)
    }
}
