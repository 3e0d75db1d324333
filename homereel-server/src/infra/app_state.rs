use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use homereel_config::Config;
use homereel_core::{
    ExtractionManager, JellyfinClient, NfoStore, UploadService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jellyfin: Arc<JellyfinClient>,
    pub nfo: Arc<NfoStore>,
    pub uploads: Arc<UploadService>,
    pub extraction: Arc<ExtractionManager>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config
            .ensure_directories()
            .context("failed to create media directories")?;

        let jellyfin = Arc::new(
            JellyfinClient::new(&config.jellyfin)
                .context("failed to build Jellyfin client")?,
        );
        let nfo = Arc::new(NfoStore::new(
            &config.media.root,
            &config.jellyfin.path_prefix,
        ));
        let uploads =
            Arc::new(UploadService::new(&config, jellyfin.clone()));
        let extraction =
            Arc::new(ExtractionManager::new(&config, jellyfin.clone()));

        Ok(Self {
            config: Arc::new(config),
            jellyfin,
            nfo,
            uploads,
            extraction,
        })
    }
}
