//! On-disk docseal workspace: catalog snapshot, content store and config.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use docseal_catalog::MemoryCatalog;
use docseal_service::{
    DownloadGateway, DownloadService, PasswordCodec, Publisher, ServiceConfig, Unlimited,
};
use docseal_storage::{create_default_registry, ContentStore, LocalStore};

/// Directory under the workspace root holding stored content.
const CONTENT_DIR: &str = "content";

/// A catalog directory opened for one command.
pub struct Workspace {
    pub config: ServiceConfig,
    pub catalog: MemoryCatalog,
    pub store: Arc<dyn ContentStore>,
    meta: LocalStore,
}

impl Workspace {
    /// Open the workspace at `root`, creating it if needed.
    ///
    /// Without a config file, content is stored under `<root>/content`.
    pub async fn open(root: &Path, config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => ServiceConfig::load(path)
                .await
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ServiceConfig::default(),
        };
        if config_path.is_none() {
            config.storage.provider = "local".to_string();
            config.storage.config = json!({ "root": root.join(CONTENT_DIR).to_string_lossy() });
        } else if config.storage.provider == "memory" {
            warn!("Content store is in memory; published content will not persist");
        }
        config.validate().context("Invalid configuration")?;

        let meta = LocalStore::new(root).context("Failed to open workspace directory")?;
        let catalog = MemoryCatalog::load(&meta)
            .await
            .context("Failed to load catalog")?;

        let registry = create_default_registry()?;
        let store = registry
            .resolve(&config.storage.provider, config.storage.config.clone())
            .with_context(|| format!("Failed to open {} store", config.storage.provider))?;

        debug!(root = %root.display(), store = store.name(), "Workspace opened");
        Ok(Self {
            config,
            catalog,
            store,
            meta,
        })
    }

    /// Persist the catalog snapshot.
    pub async fn save(&self) -> Result<()> {
        self.catalog
            .save(&self.meta)
            .await
            .context("Failed to save catalog")
    }

    pub fn publisher(&self) -> Result<Publisher> {
        Ok(Publisher::new(
            Arc::new(self.catalog.clone()),
            self.store.clone(),
            self.config.build_encoder()?,
        ))
    }

    pub fn download_service(&self) -> Result<DownloadService> {
        let staging = self.staging_dir()?;
        Ok(DownloadService::new(
            Arc::new(self.catalog.clone()),
            Arc::new(self.catalog.clone()),
            self.store.clone(),
            Arc::new(PasswordCodec::new(self.config.build_encoder()?)),
            staging,
        ))
    }

    /// Gateway for local use: permission pre-check without throttling.
    pub fn gateway(&self) -> Result<DownloadGateway> {
        Ok(DownloadGateway::new(
            Arc::new(self.download_service()?),
            Arc::new(Unlimited),
        ))
    }

    fn staging_dir(&self) -> Result<PathBuf> {
        let dir = self.config.staging_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create staging dir {}", dir.display()))?;
        Ok(dir)
    }
}
