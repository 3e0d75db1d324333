use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::models::{
    Config, JellyfinConfig, MediaConfig, ServerConfig, UploadConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

const DEFAULT_LIBRARY_NAME: &str = "Home Videos";
const DEFAULT_PATH_PREFIX: &str = "/home-videos";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_MAX_VIDEO_MB: u64 = 2048;
const DEFAULT_MAX_DVD_MB: u64 = 10240;

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an injected lookup. Tests use this with a
    /// map instead of mutating process-wide environment state.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let jellyfin_url = required(&lookup, "JELLYFIN_URL")?;
        Url::parse(&jellyfin_url).map_err(|e| ConfigError::Invalid {
            var: "JELLYFIN_URL",
            reason: e.to_string(),
        })?;

        let api_key = required(&lookup, "JELLYFIN_API_KEY")?;
        let media_root = required(&lookup, "MEDIA_PATH")?;

        Ok(Config {
            server: ServerConfig {
                host: lookup("HOST")
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: parsed(&lookup, "PORT", DEFAULT_PORT)?,
                cors_origin: lookup("CORS_ORIGIN")
                    .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            },
            jellyfin: JellyfinConfig {
                url: jellyfin_url.trim_end_matches('/').to_string(),
                api_key,
                library_name: lookup("JELLYFIN_LIBRARY_NAME")
                    .unwrap_or_else(|| DEFAULT_LIBRARY_NAME.to_string()),
                now_playing_user: lookup("JELLYFIN_USER")
                    .filter(|user| !user.trim().is_empty()),
                path_prefix: lookup("JELLYFIN_PATH_PREFIX")
                    .unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string()),
            },
            media: MediaConfig {
                root: PathBuf::from(media_root),
            },
            upload: UploadConfig {
                max_video_mb: parsed(
                    &lookup,
                    "MAX_UPLOAD_SIZE_MB",
                    DEFAULT_MAX_VIDEO_MB,
                )?,
                max_dvd_mb: parsed(
                    &lookup,
                    "DVD_UPLOAD_MAX_MB",
                    DEFAULT_MAX_DVD_MB,
                )?,
            },
        })
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("JELLYFIN_URL", "http://jellyfin:8096"),
            ("JELLYFIN_API_KEY", "abc123"),
            ("MEDIA_PATH", "/home-videos"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|var| env.get(var).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.jellyfin.library_name, "Home Videos");
        assert_eq!(config.jellyfin.path_prefix, "/home-videos");
        assert_eq!(config.upload.max_video_mb, 2048);
        assert!(config.jellyfin.now_playing_user.is_none());
    }

    #[test]
    fn missing_required_var_is_named() {
        let mut env = base_env();
        env.remove("JELLYFIN_API_KEY");
        match load(&env) {
            Err(ConfigError::Missing(var)) => {
                assert_eq!(var, "JELLYFIN_API_KEY")
            }
            other => panic!("expected Missing, got {other:?}"),
        }
    }

    #[test]
    fn invalid_url_rejected() {
        let mut env = base_env();
        env.insert("JELLYFIN_URL", "not a url");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid {
                var: "JELLYFIN_URL",
                ..
            })
        ));
    }

    #[test]
    fn invalid_port_rejected() {
        let mut env = base_env();
        env.insert("PORT", "not-a-port");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
    }

    #[test]
    fn trailing_slash_trimmed_from_jellyfin_url() {
        let mut env = base_env();
        env.insert("JELLYFIN_URL", "http://jellyfin:8096/");
        let config = load(&env).unwrap();
        assert_eq!(config.jellyfin.url, "http://jellyfin:8096");
    }

    #[test]
    fn api_key_not_leaked_by_debug() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config.jellyfin);
        assert!(!rendered.contains("abc123"));
    }
}
