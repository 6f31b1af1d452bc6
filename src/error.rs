use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

/// Every failure a handler can report. The status each kind maps to lives in
/// `status_code`; the body is always the `{success: false, error}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid YouTube URL format")]
    InvalidUrl,

    #[error("{0}")]
    MetadataFetch(String),

    #[error("{0}")]
    Download(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File too large")]
    PayloadTooLarge,

    #[error("Internal server error")]
    Internal,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUrl | Self::MetadataFetch(_) | Self::Download(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "error": self.to_string()
        }))
    }
}
