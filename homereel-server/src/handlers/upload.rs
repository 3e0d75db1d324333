use std::path::PathBuf;

use axum::{
    Json,
    extract::{
        Path, State,
        multipart::{Field, Multipart},
    },
    http::StatusCode,
};
use homereel_core::{UploadError, dvd::SpooledDvdFile};
use homereel_model::{ApiSuccess, ExtractionProgress, UploadResult};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, errors::AppError, errors::AppResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfigResponse {
    pub max_size_mb: u64,
    pub supported_types: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DvdJobStarted {
    pub job_id: Uuid,
}

/// Upload limits and accepted types, for the frontend's pre-flight checks.
pub async fn get_config(
    State(state): State<AppState>,
) -> Json<ApiSuccess<UploadConfigResponse>> {
    let config = UploadConfigResponse {
        max_size_mb: state.uploads.max_video_mb(),
        supported_types: state
            .uploads
            .supported_types()
            .iter()
            .map(|mime| mime.to_string())
            .collect(),
    };
    Json(ApiSuccess::new(config, "Upload configuration retrieved"))
}

/// Upload a single video file (multipart `file` field).
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiSuccess<UploadResult>>> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".to_string());
        let mime = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let (spool_path, size) = spool_field(&state, field).await?;
        let result = state
            .uploads
            .store_video(&spool_path, &original, size, &mime)
            .await?;

        let message =
            format!("Successfully uploaded \"{}\"", result.filename);
        return Ok(Json(ApiSuccess::new(result, message)));
    }

    Err(AppError::bad_request(
        "No file uploaded",
        "Expected a multipart \"file\" field.",
    ))
}

/// Upload a DVD as a ZIP of its VIDEO_TS folder. Extraction runs in the
/// background; poll the returned job id for progress.
pub async fn upload_dvd(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiSuccess<DvdJobStarted>>)> {
    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() != Some("file") {
            continue;
        }

        let original = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload.zip".to_string());
        let mime = field.content_type().unwrap_or_default().to_string();

        let is_zip = mime == "application/zip"
            || mime == "application/x-zip-compressed"
            || original.to_lowercase().ends_with(".zip");
        if !is_zip {
            return Err(AppError::bad_request(
                "Invalid DVD upload",
                "DVD upload must be a ZIP file containing a VIDEO_TS folder.",
            ));
        }

        let (spool_path, size) = spool_field(&state, field).await?;
        let max = state.config.upload.max_dvd_bytes();
        if size > max {
            discard(&spool_path).await;
            return Err(UploadError::TooLarge {
                size_mb: size / (1024 * 1024),
                max_mb: state.config.upload.max_dvd_mb,
            }
            .into());
        }

        info!(
            original = %original,
            mb = size / (1024 * 1024),
            "processing DVD ZIP upload"
        );
        let job_id =
            state.extraction.start_zip_job(spool_path, original).await;

        return Ok((
            StatusCode::ACCEPTED,
            Json(ApiSuccess::new(
                DvdJobStarted { job_id },
                "DVD extraction started",
            )),
        ));
    }

    Err(AppError::bad_request(
        "No file uploaded",
        "Expected a multipart \"file\" field.",
    ))
}

/// Upload a VIDEO_TS folder as individual files (multipart repeated
/// `files` parts whose filenames carry their path inside the folder, plus
/// a `folderName` text field).
pub async fn upload_dvd_folder(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiSuccess<DvdJobStarted>>)> {
    let mut files: Vec<SpooledDvdFile> = Vec::new();
    let mut folder_name: Option<String> = None;

    loop {
        let field = match next_field(&mut multipart).await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(discard_all(&files, e).await),
        };
        match field.name() {
            Some("files") => {
                let original = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_default();
                let spool_path = match spool_field(&state, field).await {
                    Ok((spool_path, _size)) => spool_path,
                    Err(e) => return Err(discard_all(&files, e).await),
                };
                files.push(SpooledDvdFile {
                    spool_path,
                    original_name: original,
                });
            }
            Some("folderName") => match field.text().await {
                Ok(text) => folder_name = Some(text),
                Err(e) => {
                    let err = AppError::bad_request(
                        "Invalid multipart body",
                        e.to_string(),
                    );
                    return Err(discard_all(&files, err).await);
                }
            },
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::bad_request(
            "No files uploaded",
            "Expected repeated multipart \"files\" parts.",
        ));
    }

    let Some(folder_name) =
        folder_name.filter(|name| !name.trim().is_empty())
    else {
        let err = AppError::bad_request(
            "Folder name is required",
            "Include a \"folderName\" field naming the DVD.",
        );
        return Err(discard_all(&files, err).await);
    };

    let looks_like_dvd = files.iter().any(|file| {
        let name = file.original_name.to_lowercase();
        name.ends_with(".vob")
            || name.ends_with(".ifo")
            || name.ends_with(".bup")
    });
    if !looks_like_dvd {
        let err = AppError::bad_request(
            "Invalid DVD folder",
            "Missing VOB/IFO files. Select a VIDEO_TS folder.",
        );
        return Err(discard_all(&files, err).await);
    }

    info!(
        folder = %folder_name,
        parts = files.len(),
        "processing DVD folder upload"
    );
    let job_id = state
        .extraction
        .start_folder_job(files, folder_name)
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiSuccess::new(
            DvdJobStarted { job_id },
            "DVD extraction started",
        )),
    ))
}

/// Poll an extraction job started by one of the DVD upload endpoints.
pub async fn dvd_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<ApiSuccess<ExtractionProgress>>> {
    let progress =
        state.extraction.progress(job_id).await.ok_or_else(|| {
            AppError::not_found(
                "Extraction job not found",
                format!("No extraction job with id {job_id}"),
            )
        })?;

    let message = match progress.extracted_files.len() {
        0 => "Extraction in progress".to_string(),
        n => format!("Extracted {n} chapters"),
    };
    Ok(Json(ApiSuccess::new(progress, message)))
}

async fn next_field<'a>(
    multipart: &'a mut Multipart,
) -> AppResult<Option<Field<'a>>> {
    multipart.next_field().await.map_err(|e| {
        AppError::bad_request("Invalid multipart body", e.to_string())
    })
}

/// Stream one multipart field to a spool file under the media root.
async fn spool_field(
    state: &AppState,
    mut field: Field<'_>,
) -> AppResult<(PathBuf, u64)> {
    let spool_path = state
        .uploads
        .spool_dir()
        .join(format!("upload-{}", Uuid::new_v4()));

    let mut file = tokio::fs::File::create(&spool_path)
        .await
        .map_err(|e| AppError::from(UploadError::Io(e)))?;

    let mut size: u64 = 0;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                size += chunk.len() as u64;
                if let Err(e) = file.write_all(&chunk).await {
                    drop(file);
                    discard(&spool_path).await;
                    return Err(UploadError::Io(e).into());
                }
            }
            Ok(None) => break,
            Err(e) => {
                drop(file);
                discard(&spool_path).await;
                return Err(AppError::bad_request(
                    "Upload interrupted",
                    e.to_string(),
                ));
            }
        }
    }

    if let Err(e) = file.flush().await {
        discard(&spool_path).await;
        return Err(UploadError::Io(e).into());
    }

    Ok((spool_path, size))
}

async fn discard(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "spool cleanup failed");
    }
}

/// Drop every spooled part of a rejected folder upload, then hand the
/// rejection back.
async fn discard_all(files: &[SpooledDvdFile], err: AppError) -> AppError {
    for file in files {
        discard(&file.spool_path).await;
    }
    err
}
