use reqwest::StatusCode;
use thiserror::Error;

/// Maximum length of response body quoted in error messages.
/// Keeps a misbehaving endpoint from flooding logs with full HTML error pages.
const MAX_ERROR_BODY_LENGTH: usize = 300;

/// Errors crossing the remote API boundary.
///
/// Cloneable so one settled refresh outcome can be handed to every caller
/// attached to the same in-flight session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a usable response (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with an explicit in-body error.
    #[error("API error {code}: {message}")]
    Api { code: u32, message: String },

    /// A response arrived but could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Build an error from a non-success HTTP status plus its body.
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        ApiError::InvalidResponse(format!("HTTP {}: {}", status.as_u16(), truncate_body(body)))
    }

    /// True when the Torn key itself is unusable and the user has to supply a
    /// new one. Codes: 1 key empty, 2 incorrect key, 10 owner in federal
    /// jail, 13 key disabled through inactivity.
    pub fn is_key_invalid(&self) -> bool {
        matches!(self, ApiError::Api { code: 1 | 2 | 10 | 13, .. })
    }
}

/// reqwest errors are not cloneable, so flatten them to text at the boundary.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= MAX_ERROR_BODY_LENGTH {
        trimmed.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... ({} bytes total)", &trimmed[..end], trimmed.len())
    }
}

// ============================================================================
// Tests
// ============================================================================
