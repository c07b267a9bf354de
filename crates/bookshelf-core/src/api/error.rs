use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Detected locally, before any request is dispatched.
    #[error("Authentication required - please login first")]
    AuthRequired,

    #[error("Unauthorized - please login again")]
    Unauthorized,

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Local pre-network validation or server-side per-field errors,
    /// joined into one composite message.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Server error body: an optional `message` plus an optional array of
/// per-field validation errors, with the field spellings the API has
/// been seen to use.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<RawFieldError>,
}

#[derive(Debug, Deserialize)]
struct RawFieldError {
    #[serde(default, alias = "param")]
    field: Option<String>,
    #[serde(default, alias = "msg")]
    message: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data in
    /// error messages. The cut point backs up to a char boundary so
    /// multi-byte text never splits mid-character.
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..cut],
            body.len()
        )
    }

    /// Classify a non-success response.
    ///
    /// Structured per-field validation errors win over the `message`
    /// field, which wins over a generic message keyed by status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return ApiError::Unauthorized;
        }

        let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();

        if !parsed.errors.is_empty() {
            let composite = parsed
                .errors
                .iter()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.field.as_deref().unwrap_or("field"),
                        e.message.as_deref().unwrap_or("Invalid")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ");
            return ApiError::Validation(composite);
        }

        let message = parsed.message;
        match status.as_u16() {
            403 => ApiError::Forbidden(
                message.unwrap_or_else(|| "the server refused this operation".to_string()),
            ),
            404 => {
                ApiError::NotFound(message.unwrap_or_else(|| "resource not found".to_string()))
            }
            400 => ApiError::Validation(
                message.unwrap_or_else(|| "validation error".to_string()),
            ),
            500..=599 => {
                ApiError::Server(message.unwrap_or_else(|| Self::truncate_body(body)))
            }
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                message.unwrap_or_else(|| Self::truncate_body(body))
            )),
        }
    }
}
