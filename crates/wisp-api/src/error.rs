//! Error mapping for the API boundary

use serde::Serialize;
use wisp_core::WispError;

/// Error codes surfaced to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "M_BAD_JSON")]
    BadJson,
    #[serde(rename = "M_UNAVAILABLE")]
    Unavailable,
    #[serde(rename = "M_UNKNOWN")]
    Unknown,
}

impl ErrorCode {
    pub fn of(err: &WispError) -> Self {
        match err {
            WispError::MalformedRequest(_) | WispError::InvalidId { .. } => ErrorCode::BadJson,
            WispError::MembershipUnavailable(_) => ErrorCode::Unavailable,
            WispError::Config(_) => ErrorCode::Unknown,
        }
    }

    /// HTTP status code
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::BadJson => 400,
            ErrorCode::Unavailable => 503,
            ErrorCode::Unknown => 500,
        }
    }
}

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub errcode: ErrorCode,
    pub error: String,
}

impl From<&WispError> for ErrorBody {
    fn from(err: &WispError) -> Self {
        ErrorBody {
            errcode: ErrorCode::of(err),
            error: err.to_string(),
        }
    }
}

/// Status code and body for a failed request
pub fn error_response(err: &WispError) -> (u16, ErrorBody) {
    let body = ErrorBody::from(err);
    (body.errcode.status(), body)
}
