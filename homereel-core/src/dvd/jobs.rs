//! Background extraction jobs with a status-polling interface.
//!
//! A DVD rip takes minutes per chapter; holding an upload request open for
//! that long is not an option. Upload handlers spool the payload, start a
//! job here and answer immediately with a job id; the frontend polls
//! `GET /upload/dvd/{job_id}/status` until the job reaches a terminal
//! state. Terminal jobs stay queryable; the oldest are evicted once the
//! history outgrows its cap.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use homereel_config::Config;
use homereel_model::{ExtractionProgress, ExtractionStatus};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::external::ToolError;
use crate::jellyfin::JellyfinClient;
use crate::upload;

use super::extract::{self, MIN_CHAPTER_SECS};
use super::{DvdError, lsdvd};
use uuid::Uuid;

/// Terminal jobs retained for polling before eviction.
const MAX_JOB_HISTORY: usize = 100;

/// One part of a multi-file VIDEO_TS folder upload, already spooled to
/// disk. `original_name` is the browser-reported path inside the folder.
#[derive(Debug, Clone)]
pub struct SpooledDvdFile {
    pub spool_path: PathBuf,
    pub original_name: String,
}

#[derive(Clone)]
pub struct ExtractionManager {
    jobs: Arc<RwLock<HashMap<Uuid, ExtractionProgress>>>,
    order: Arc<RwLock<VecDeque<Uuid>>>,
    jellyfin: Arc<JellyfinClient>,
    media_root: PathBuf,
}

impl std::fmt::Debug for ExtractionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionManager")
            .field("media_root", &self.media_root)
            .finish_non_exhaustive()
    }
}

impl ExtractionManager {
    pub fn new(config: &Config, jellyfin: Arc<JellyfinClient>) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            order: Arc::new(RwLock::new(VecDeque::new())),
            jellyfin,
            media_root: config.media.root.clone(),
        }
    }

    /// Current progress of a job, terminal or not.
    pub async fn progress(&self, job_id: Uuid) -> Option<ExtractionProgress> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Start extraction from a spooled DVD ZIP. Returns immediately.
    pub async fn start_zip_job(
        &self,
        zip_spool: PathBuf,
        original_name: String,
    ) -> Uuid {
        let job_id = self.insert_job().await;
        let manager = self.clone();

        tokio::spawn(async move {
            let result = manager
                .run_zip_job(job_id, &zip_spool, &original_name)
                .await;
            if zip_spool.exists()
                && let Err(e) = tokio::fs::remove_file(&zip_spool).await
            {
                warn!(path = %zip_spool.display(), error = %e, "spool cleanup failed");
            }
            manager.finish(job_id, result).await;
        });

        job_id
    }

    /// Start extraction from a spooled multi-file VIDEO_TS folder upload.
    /// Returns immediately.
    pub async fn start_folder_job(
        &self,
        files: Vec<SpooledDvdFile>,
        folder_name: String,
    ) -> Uuid {
        let job_id = self.insert_job().await;
        let manager = self.clone();

        tokio::spawn(async move {
            let spooled: Vec<PathBuf> =
                files.iter().map(|file| file.spool_path.clone()).collect();
            let result =
                manager.run_folder_job(job_id, files, &folder_name).await;
            for leftover in spooled {
                if leftover.exists()
                    && let Err(e) = tokio::fs::remove_file(&leftover).await
                {
                    warn!(path = %leftover.display(), error = %e, "spool cleanup failed");
                }
            }
            manager.finish(job_id, result).await;
        });

        job_id
    }

    async fn run_zip_job(
        &self,
        job_id: Uuid,
        zip_spool: &Path,
        original_name: &str,
    ) -> Result<Vec<String>, DvdError> {
        let scratch = tempfile::Builder::new()
            .prefix(".tmp_dvd_")
            .tempdir_in(&self.media_root)?;

        let zip_path = scratch.path().join("upload.zip");
        upload::move_file(zip_spool, &zip_path).await?;
        upload::extract_zip(&zip_path, scratch.path()).await?;

        let (dvd_root, video_ts) = upload::find_video_ts(scratch.path())
            .ok_or(DvdError::MissingVideoTs)?;

        let stem = Path::new(original_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "DVD".to_string());
        let prefix = upload::sanitize_filename(&stem);

        self.extract_all(job_id, &dvd_root, &video_ts, &prefix).await
    }

    async fn run_folder_job(
        &self,
        job_id: Uuid,
        files: Vec<SpooledDvdFile>,
        folder_name: &str,
    ) -> Result<Vec<String>, DvdError> {
        let scratch = tempfile::Builder::new()
            .prefix(".tmp_dvd_folder_")
            .tempdir_in(&self.media_root)?;

        let video_ts = scratch.path().join("VIDEO_TS");
        tokio::fs::create_dir_all(&video_ts).await?;

        // Browsers report each part's path inside the selected folder;
        // flatten everything to its basename inside VIDEO_TS.
        for file in files {
            let target =
                video_ts.join(upload::sanitize_filename(&file.original_name));
            upload::move_file(&file.spool_path, &target).await?;
        }

        if !upload::is_dvd_directory(&video_ts) {
            return Err(DvdError::InvalidFolder);
        }

        let prefix = upload::dvd_folder_prefix(folder_name);
        self.extract_all(job_id, scratch.path(), &video_ts, &prefix)
            .await
    }

    async fn extract_all(
        &self,
        job_id: Uuid,
        dvd_root: &Path,
        video_ts: &Path,
        prefix: &str,
    ) -> Result<Vec<String>, DvdError> {
        let chapters = lsdvd::read_chapters(dvd_root).await?;
        let total = chapters.len();

        self.update(job_id, |progress| {
            progress.status = ExtractionStatus::Extracting;
            progress.total_chapters = Some(total as u32);
            progress.current_chapter = Some(0);
        })
        .await;

        let concat = extract::vob_concat_input(video_ts)?;
        let planned = extract::plan_chapters(&chapters);
        if planned.len() < total {
            info!(
                skipped = total - planned.len(),
                "skipping chapters shorter than {MIN_CHAPTER_SECS}s"
            );
        }

        let date = Utc::now().format("%Y-%m-%d").to_string();
        let batch = upload::random_suffix();
        let mut extracted = Vec::new();

        for chapter in planned {
            let filename =
                extract::chapter_output_name(&date, &batch, prefix, chapter.index);
            self.update(job_id, |progress| {
                progress.current_chapter = Some(chapter.index);
                progress.current_filename = Some(filename.clone());
            })
            .await;

            let output = self.media_root.join(&filename);
            match extract::extract_chapter(&concat, chapter, total, &output)
                .await
            {
                Ok(()) => {
                    self.update(job_id, |progress| {
                        progress.extracted_files.push(filename.clone());
                    })
                    .await;
                    extracted.push(filename);
                }
                // Without ffmpeg every remaining chapter fails the same
                // way; abort instead of grinding through the list.
                Err(DvdError::Tool(e @ ToolError::Unavailable { .. })) => {
                    return Err(DvdError::Tool(e));
                }
                Err(e) => {
                    error!(chapter = chapter.index, error = %e, "chapter extraction failed");
                }
            }
        }

        if extracted.is_empty() {
            return Err(DvdError::AllChaptersFailed);
        }

        info!(
            extracted = extracted.len(),
            total, "DVD extraction complete"
        );

        let jellyfin = self.jellyfin.clone();
        tokio::spawn(async move { jellyfin.refresh_home_library().await });

        Ok(extracted)
    }

    async fn insert_job(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs
            .write()
            .await
            .insert(job_id, ExtractionProgress::new(job_id));
        self.order.write().await.push_back(job_id);
        self.prune().await;
        job_id
    }

    async fn update(
        &self,
        job_id: Uuid,
        apply: impl FnOnce(&mut ExtractionProgress),
    ) {
        if let Some(progress) = self.jobs.write().await.get_mut(&job_id) {
            apply(progress);
        }
    }

    async fn finish(&self, job_id: Uuid, result: Result<Vec<String>, DvdError>) {
        match result {
            Ok(files) => {
                self.update(job_id, |progress| {
                    progress.status = ExtractionStatus::Complete;
                    progress.current_filename = None;
                    progress.extracted_files = files;
                    progress.completed_at = Some(Utc::now());
                })
                .await;
            }
            Err(e) => {
                error!(job = %job_id, error = %e, "extraction job failed");
                self.update(job_id, |progress| {
                    progress.status = ExtractionStatus::Error;
                    progress.error = Some(e.to_string());
                    progress.completed_at = Some(Utc::now());
                })
                .await;
            }
        }
    }

    /// Evict the oldest terminal jobs past the history cap. Live jobs are
    /// never evicted.
    async fn prune(&self) {
        let mut order = self.order.write().await;
        if order.len() <= MAX_JOB_HISTORY {
            return;
        }
        let mut jobs = self.jobs.write().await;
        while order.len() > MAX_JOB_HISTORY {
            let Some(oldest) = order.front().copied() else {
                break;
            };
            let terminal = jobs
                .get(&oldest)
                .is_none_or(|progress| progress.status.is_terminal());
            if !terminal {
                break;
            }
            order.pop_front();
            jobs.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homereel_config::{
        JellyfinConfig, MediaConfig, ServerConfig, UploadConfig,
    };

    fn test_manager(media_root: &Path) -> ExtractionManager {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
                cors_origin: "http://localhost:3000".into(),
            },
            jellyfin: JellyfinConfig {
                url: "http://127.0.0.1:1".into(),
                api_key: "test".into(),
                library_name: "Home Videos".into(),
                now_playing_user: None,
                path_prefix: "/home-videos".into(),
            },
            media: MediaConfig {
                root: media_root.to_path_buf(),
            },
            upload: UploadConfig {
                max_video_mb: 16,
                max_dvd_mb: 64,
            },
        };
        let jellyfin =
            Arc::new(JellyfinClient::new(&config.jellyfin).unwrap());
        ExtractionManager::new(&config, jellyfin)
    }

    #[tokio::test]
    async fn unknown_job_has_no_progress() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        assert!(manager.progress(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn finish_records_terminal_states() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let ok_job = manager.insert_job().await;
        manager
            .finish(ok_job, Ok(vec!["a_ch01.mp4".to_string()]))
            .await;
        let progress = manager.progress(ok_job).await.unwrap();
        assert_eq!(progress.status, ExtractionStatus::Complete);
        assert_eq!(progress.extracted_files, vec!["a_ch01.mp4"]);
        assert!(progress.completed_at.is_some());

        let failed_job = manager.insert_job().await;
        manager
            .finish(failed_job, Err(DvdError::AllChaptersFailed))
            .await;
        let progress = manager.progress(failed_job).await.unwrap();
        assert_eq!(progress.status, ExtractionStatus::Error);
        assert!(
            progress
                .error
                .as_deref()
                .unwrap()
                .contains("failed to extract any chapters")
        );
    }

    #[tokio::test]
    async fn terminal_jobs_are_evicted_past_the_cap() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let first = manager.insert_job().await;
        manager.finish(first, Ok(vec![])).await;
        for _ in 0..MAX_JOB_HISTORY {
            let job = manager.insert_job().await;
            manager.finish(job, Ok(vec![])).await;
        }

        assert!(manager.progress(first).await.is_none());
        assert_eq!(manager.jobs.read().await.len(), MAX_JOB_HISTORY);
    }

    #[tokio::test]
    async fn live_jobs_survive_pruning() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let live = manager.insert_job().await;
        for _ in 0..(MAX_JOB_HISTORY + 10) {
            let job = manager.insert_job().await;
            manager.finish(job, Ok(vec![])).await;
        }

        let progress = manager.progress(live).await.unwrap();
        assert_eq!(progress.status, ExtractionStatus::Analyzing);
    }

    #[tokio::test]
    async fn zip_job_with_missing_spool_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let job_id = manager
            .start_zip_job(
                dir.path().join("no-such-spool.zip"),
                "wedding.zip".to_string(),
            )
            .await;

        let mut status = ExtractionStatus::Analyzing;
        for _ in 0..100 {
            if let Some(progress) = manager.progress(job_id).await {
                status = progress.status;
                if status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, ExtractionStatus::Error);

        // Scratch directory cleaned up with the job.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_name().to_string_lossy().starts_with(".tmp_dvd_")
            })
            .collect();
        assert!(leftovers.is_empty());
    }
}
