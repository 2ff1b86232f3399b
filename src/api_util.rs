use crate::error::{IngestError, StoreError, TrackerError};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{error::Error, fmt::Display};

#[derive(Debug, Clone)]
pub enum ApiError {
    Store(StoreError),
    Ingest(IngestError),
    /// The request itself could not be parsed.
    Rejected { status: StatusCode, message: String },
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<IngestError> for ApiError {
    fn from(value: IngestError) -> Self {
        match value {
            IngestError::Store(e) => Self::Store(e),
            other => Self::Ingest(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => e.fmt(f),
            Self::Ingest(e) => e.fmt(f),
            Self::Rejected { message, .. } => f.write_str(message),
        }
    }
}

impl Error for ApiError {}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::NameConflict(_)) => StatusCode::CONFLICT,
            Self::Store(StoreError::ServiceNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Unavailable(_)) | Self::Ingest(IngestError::ActorUnavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Store(StoreError::OutageNotFound(_) | StoreError::NoOpenOutage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Ingest(IngestError::Tracker(TrackerError::InvalidTimeOrdering { .. })) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Ingest(IngestError::InactiveService(_)) => StatusCode::CONFLICT,
            Self::Ingest(IngestError::Store(e)) => Self::Store(e.clone()).status_code(),
            Self::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
