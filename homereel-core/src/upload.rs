//! Upload handling: collision-safe storage of new videos under the media
//! root, plus the filesystem side of DVD ingestion (ZIP extraction with
//! zip-slip validation, VIDEO_TS discovery, folder reconstruction).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use homereel_config::Config;
use homereel_model::UploadResult;
use once_cell::sync::Lazy;
use rand::{Rng, distr::Alphanumeric};
use regex::Regex;
use tokio::process::Command;
use tracing::{info, warn};

use crate::external::{self, ToolError};
use crate::jellyfin::JellyfinClient;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    Invalid(String),

    #[error("file too large: {size_mb}MB, maximum is {max_mb}MB")]
    TooLarge { size_mb: u64, max_mb: u64 },

    #[error("ZIP file contains path traversal attempt: {0}")]
    ZipSlip(PathBuf),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Video MIME types accepted for direct upload.
pub const SUPPORTED_VIDEO_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/mpeg",
    "video/webm",
];

static DVD_IFO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.ifo$").unwrap());
static DVD_VOB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^vts_\d+_[1-9]\.vob$").unwrap());
static VIDEO_TS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)video_ts").unwrap());

const UNZIP_TIMEOUT: Duration = Duration::from_secs(60);

/// Strip path components and replace characters that are unsafe in
/// filenames (or reserved on common filesystems) with underscores.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .filter(|base| !base.is_empty())
        .unwrap_or("upload");

    base.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect()
}

/// Six characters of lowercase alphanumeric noise — enough to keep
/// concurrent uploads of the same filename apart without a database.
pub fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// `YYYY-MM-DD_{suffix}_{sanitized original}` — the date prefix groups
/// uploads for browsing, the suffix avoids collisions.
pub fn unique_name(original: &str) -> String {
    let sanitized = sanitize_filename(original);
    let date = Utc::now().format("%Y-%m-%d");
    format!("{date}_{}_{sanitized}", random_suffix())
}

/// Rename that falls back to copy+delete when source and destination live
/// on different filesystems.
pub async fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tokio::fs::copy(source, dest).await?;
            if let Err(e) = tokio::fs::remove_file(source).await {
                warn!(path = %source.display(), error = %e, "source cleanup failed");
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// True when the directory holds a DVD VIDEO_TS payload (IFO navigation
/// files plus at least one content VOB).
pub fn is_dvd_directory(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    let names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();

    names.iter().any(|name| DVD_IFO_RE.is_match(name))
        && names.iter().any(|name| DVD_VOB_RE.is_match(name))
}

/// Locate a VIDEO_TS directory anywhere under `root` (case-insensitive).
/// Returns `(dvd_root, video_ts_dir)` — lsdvd wants the parent, the VOB
/// scan wants the directory itself.
pub fn find_video_ts(root: &Path) -> Option<(PathBuf, PathBuf)> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if path.is_dir() {
            if entry.file_name().to_string_lossy().eq_ignore_ascii_case("VIDEO_TS") {
                return Some((root.to_path_buf(), path));
            }
            subdirs.push(path);
        }
    }
    subdirs.iter().find_map(|dir| find_video_ts(dir))
}

/// Reject any extracted entry that resolves outside the extraction root
/// (zip-slip). Runs after `unzip` but before anything touches the tree;
/// canonicalization also catches symlink escapes.
pub fn validate_tree_within(root: &Path) -> Result<(), UploadError> {
    let canonical_root = root.canonicalize()?;
    validate_dir(&canonical_root, &canonical_root)
}

fn validate_dir(dir: &Path, root: &Path) -> Result<(), UploadError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let resolved = path.canonicalize()?;
        if !resolved.starts_with(root) {
            return Err(UploadError::ZipSlip(path));
        }
        if entry.file_type()?.is_dir() {
            validate_dir(&resolved, root)?;
        }
    }
    Ok(())
}

/// Unpack a DVD ZIP into `dest` and validate every entry stayed inside.
pub async fn extract_zip(zip: &Path, dest: &Path) -> Result<(), UploadError> {
    let mut command = Command::new("unzip");
    command.arg("-q").arg(zip).arg("-d").arg(dest);
    external::run("unzip", &mut command, UNZIP_TIMEOUT).await?;
    validate_tree_within(dest)
}

/// Output prefix for chapters extracted from an uploaded folder: the folder
/// name minus any VIDEO_TS fragment and trailing separators.
pub fn dvd_folder_prefix(folder_name: &str) -> String {
    let stripped = VIDEO_TS_RE.replace_all(folder_name, "");
    let trimmed = stripped
        .trim_end_matches(|c: char| c == '_' || c.is_whitespace());
    if trimmed.is_empty() {
        "DVD".to_string()
    } else {
        sanitize_filename(trimmed)
    }
}

/// Stores validated uploads under the media root with collision-safe names.
#[derive(Debug, Clone)]
pub struct UploadService {
    media_root: PathBuf,
    spool_dir: PathBuf,
    max_video_bytes: u64,
    max_video_mb: u64,
    jellyfin: Arc<JellyfinClient>,
}

impl UploadService {
    pub fn new(config: &Config, jellyfin: Arc<JellyfinClient>) -> Self {
        Self {
            media_root: config.media.root.clone(),
            spool_dir: config.media.spool_dir(),
            max_video_bytes: config.upload.max_video_bytes(),
            max_video_mb: config.upload.max_video_mb,
            jellyfin,
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Directory multipart bodies are spooled into before validation.
    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    pub fn supported_types(&self) -> &'static [&'static str] {
        SUPPORTED_VIDEO_TYPES
    }

    pub fn max_video_mb(&self) -> u64 {
        self.max_video_mb
    }

    fn validate_video(&self, mime: &str, size: u64) -> Result<(), UploadError> {
        if !SUPPORTED_VIDEO_TYPES.contains(&mime) {
            return Err(UploadError::Invalid(format!(
                "Unsupported file type: {mime}. Supported types: MP4, MOV, AVI, MKV, MPEG, WebM"
            )));
        }
        if size > self.max_video_bytes {
            return Err(UploadError::TooLarge {
                size_mb: size / (1024 * 1024),
                max_mb: self.max_video_mb,
            });
        }
        Ok(())
    }

    /// Move a spooled upload into the media root under a unique name.
    ///
    /// The spool lives on the same filesystem, so the move is normally one
    /// rename. A concurrent writer landing on the same name gets detected
    /// by the existence probe and retried once under a timestamp suffix;
    /// random suffixes make even that window effectively unreachable.
    pub async fn store_video(
        &self,
        spooled: &Path,
        original_name: &str,
        size: u64,
        mime: &str,
    ) -> Result<UploadResult, UploadError> {
        if let Err(e) = self.validate_video(mime, size) {
            discard(spooled).await;
            return Err(e);
        }

        let mut filename = unique_name(original_name);
        let mut target = self.media_root.join(&filename);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            filename = timestamp_suffixed(&filename);
            target = self.media_root.join(&filename);
        }

        if let Err(e) = move_file(spooled, &target).await {
            discard(spooled).await;
            return Err(e.into());
        }

        info!(filename = %filename, kb = size / 1024, "uploaded video");

        let jellyfin = self.jellyfin.clone();
        tokio::spawn(async move { jellyfin.refresh_home_library().await });

        Ok(UploadResult {
            filename,
            size,
            mime_type: mime.to_string(),
        })
    }
}

fn timestamp_suffixed(filename: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let millis = Utc::now().timestamp_millis();
    match path.extension() {
        Some(ext) => format!("{stem}_{millis}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{millis}"),
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "spool cleanup failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("dir/movie.mp4"), "movie.mp4");
        assert_eq!(sanitize_filename(r"C:\clips\movie.mp4"), "movie.mp4");
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("a<b>c:d?.mp4"), "a_b_c_d_.mp4");
        assert_eq!(sanitize_filename("tab\there.mp4"), "tab_here.mp4");
        assert_eq!(sanitize_filename("trailing/"), "upload");
    }

    #[test]
    fn unique_name_shape() {
        let name = unique_name("holiday.mp4");
        // YYYY-MM-DD_xxxxxx_holiday.mp4
        let mut parts = name.splitn(3, '_');
        let date = parts.next().unwrap();
        let suffix = parts.next().unwrap();
        let rest = parts.next().unwrap();
        assert!(date.parse::<chrono::NaiveDate>().is_ok());
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(rest, "holiday.mp4");
    }

    #[test]
    fn unique_names_differ() {
        assert_ne!(unique_name("a.mp4"), unique_name("a.mp4"));
    }

    #[test]
    fn dvd_directory_detection() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_dvd_directory(dir.path()));

        std::fs::write(dir.path().join("VTS_01_0.IFO"), b"ifo").unwrap();
        assert!(!is_dvd_directory(dir.path()));

        std::fs::write(dir.path().join("VTS_01_1.VOB"), b"vob").unwrap();
        assert!(is_dvd_directory(dir.path()));
    }

    #[test]
    fn menu_vob_alone_is_not_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VTS_01_0.IFO"), b"ifo").unwrap();
        // _0 is the menu VOB; content VOBs are numbered from 1
        std::fs::write(dir.path().join("VTS_01_0.VOB"), b"vob").unwrap();
        assert!(!is_dvd_directory(dir.path()));
    }

    #[test]
    fn finds_nested_video_ts_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("MY_DVD").join("video_ts");
        std::fs::create_dir_all(&nested).unwrap();

        let (dvd_root, video_ts) = find_video_ts(dir.path()).unwrap();
        assert_eq!(dvd_root, dir.path().join("MY_DVD"));
        assert_eq!(video_ts, nested);
    }

    #[cfg(unix)]
    #[test]
    fn zip_slip_symlink_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("payload");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(inner.join("ok.vob"), b"fine").unwrap();
        assert!(validate_tree_within(dir.path()).is_ok());

        std::os::unix::fs::symlink("/etc/passwd", inner.join("escape"))
            .unwrap();
        assert!(matches!(
            validate_tree_within(dir.path()),
            Err(UploadError::ZipSlip(_))
        ));
    }

    #[test]
    fn folder_prefix_strips_video_ts_fragment() {
        assert_eq!(dvd_folder_prefix("Wedding VIDEO_TS"), "Wedding");
        assert_eq!(dvd_folder_prefix("VIDEO_TS"), "DVD");
        assert_eq!(dvd_folder_prefix("video_ts_"), "DVD");
        assert_eq!(dvd_folder_prefix("Family Trip"), "Family Trip");
    }

    #[test]
    fn timestamp_suffix_preserves_extension() {
        let suffixed = timestamp_suffixed("2024-01-01_abc123_clip.mp4");
        assert!(suffixed.starts_with("2024-01-01_abc123_clip_"));
        assert!(suffixed.ends_with(".mp4"));
    }
}
