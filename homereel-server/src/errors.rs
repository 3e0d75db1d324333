use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use homereel_core::{
    DvdError, JellyfinError, NfoError, ToolError, UploadError,
};
use homereel_model::{ApiError, ValidationError};
use std::fmt;

pub type AppResult<T> = Result<T, AppError>;

/// API failure: an HTTP status plus the `{error, details}` envelope body.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<String>,
}

impl AppError {
    pub fn new(
        status: StatusCode,
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            status,
            error: error.into(),
            details: Some(details.into()),
        }
    }

    pub fn bad_request(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, details)
    }

    pub fn unauthorized(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error, details)
    }

    pub fn forbidden(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::FORBIDDEN, error, details)
    }

    pub fn not_found(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, details)
    }

    pub fn internal(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, details)
    }

    pub fn service_unavailable(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error, details)
    }

    pub fn insufficient_storage(
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(StatusCode::INSUFFICIENT_STORAGE, error, details)
    }

    fn from_io(error: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::PermissionDenied => Self::forbidden(
                "Permission denied",
                "Cannot write to media directory. Check file permissions.",
            ),
            ErrorKind::StorageFull => Self::insufficient_storage(
                "Disk full",
                "No space left on device.",
            ),
            _ => Self::internal("Filesystem error", error.to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {details}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiError {
            error: self.error,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}

// Convert from the engine error types

impl From<JellyfinError> for AppError {
    fn from(err: JellyfinError) -> Self {
        if err.is_auth() {
            return Self::unauthorized(
                "Jellyfin authentication failed",
                "Invalid API key or insufficient permissions.",
            );
        }
        if err.is_connection() {
            return Self::service_unavailable(
                "Failed to connect to Jellyfin",
                "Could not connect to Jellyfin server. Check your connection.",
            );
        }
        match err {
            JellyfinError::NoUsers => Self::service_unavailable(
                "Jellyfin has no users",
                "Create a user in Jellyfin before using Homereel.",
            ),
            other => {
                Self::internal("Failed to reach Jellyfin", other.to_string())
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request("Invalid metadata", err.to_string())
    }
}

impl From<NfoError> for AppError {
    fn from(err: NfoError) -> Self {
        match err {
            NfoError::PathOutsideRoot(_) => {
                Self::bad_request("Invalid path", err.to_string())
            }
            NfoError::Io(io) => Self::from_io(&io),
        }
    }
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Unavailable { .. } => Self::service_unavailable(
                "DVD tools not available",
                "Server is missing required tools (lsdvd, ffmpeg, unzip) for DVD processing.",
            ),
            other => Self::internal("External tool failed", other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Invalid(details) => {
                Self::bad_request("Upload rejected", details)
            }
            UploadError::TooLarge { .. } => {
                Self::bad_request("File too large", err.to_string())
            }
            UploadError::ZipSlip(_) => {
                Self::bad_request("Invalid ZIP archive", err.to_string())
            }
            UploadError::Tool(tool) => tool.into(),
            UploadError::Io(io) => Self::from_io(&io),
        }
    }
}

impl From<DvdError> for AppError {
    fn from(err: DvdError) -> Self {
        match err {
            DvdError::Tool(tool) => tool.into(),
            DvdError::Upload(upload) => upload.into(),
            DvdError::Io(io) => Self::from_io(&io),
            DvdError::MissingVideoTs
            | DvdError::InvalidFolder
            | DvdError::NoChapters
            | DvdError::NoVobFiles => {
                Self::bad_request("Invalid DVD upload", err.to_string())
            }
            other => {
                Self::internal("DVD extraction failed", other.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("Internal error", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_permission_maps_to_forbidden() {
        let err: AppError = NfoError::Io(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        ))
        .into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn io_storage_full_maps_to_507() {
        let err: AppError = UploadError::Io(std::io::Error::from(
            std::io::ErrorKind::StorageFull,
        ))
        .into();
        assert_eq!(err.status, StatusCode::INSUFFICIENT_STORAGE);
    }

    #[test]
    fn missing_tool_maps_to_503() {
        let err: AppError =
            DvdError::Tool(ToolError::Unavailable { tool: "lsdvd" }).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error, "DVD tools not available");
    }

    #[test]
    fn validation_maps_to_400() {
        let err: AppError = ValidationError::RatingOutOfRange(12).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
