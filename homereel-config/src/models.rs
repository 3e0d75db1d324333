use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub jellyfin: JellyfinConfig,
    pub media: MediaConfig,
    pub upload: UploadConfig,
}

impl Config {
    /// Create the media root (and the upload spool directory inside it) if
    /// they do not exist yet.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.media.root)?;
        std::fs::create_dir_all(self.media.spool_dir())?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

#[derive(Clone)]
pub struct JellyfinConfig {
    pub url: String,
    /// Never logged.
    pub api_key: String,
    pub library_name: String,
    /// Username whose session drives the now-playing endpoint. Absent means
    /// the feature always reports idle.
    pub now_playing_user: Option<String>,
    /// Prefix under which Jellyfin reports media paths (its own mount of the
    /// shared volume). Remapped onto `media.root` for sidecar access.
    pub path_prefix: String,
}

impl std::fmt::Debug for JellyfinConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JellyfinConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("library_name", &self.library_name)
            .field("now_playing_user", &self.now_playing_user)
            .field("path_prefix", &self.path_prefix)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
}

impl MediaConfig {
    /// Spool directory for in-flight uploads. Lives under the media root so
    /// the final rename into place stays on one filesystem.
    pub fn spool_dir(&self) -> PathBuf {
        self.root.join(".tmp_uploads")
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_video_mb: u64,
    pub max_dvd_mb: u64,
}

impl UploadConfig {
    pub fn max_video_bytes(&self) -> u64 {
        self.max_video_mb * 1024 * 1024
    }

    pub fn max_dvd_bytes(&self) -> u64 {
        self.max_dvd_mb * 1024 * 1024
    }
}
