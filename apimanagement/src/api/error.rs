use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("Operation cancelled before completion")]
    Cancelled,
}

impl ApiError {
    /// HTTP status behind the error, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::AuthError(_) => Some(401),
            ApiError::RateLimited => Some(429),
            ApiError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_precondition_failed(&self) -> bool {
        self.status() == Some(412)
    }

    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(400)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    fn api(status: u16) -> ApiError {
        ApiError::Api {
            status,
            code: "Code".to_string(),
            message: "message".to_string(),
        }
    }

    #[test]
    fn status_helpers_match_http_codes() {
        assert!(api(404).is_not_found());
        assert!(api(409).is_conflict());
        assert!(api(412).is_precondition_failed());
        assert!(api(400).is_bad_request());
        assert!(api(403).is_forbidden());
        assert!(!api(500).is_not_found());
    }

    #[test]
    fn non_http_errors_have_no_status() {
        assert_eq!(ApiError::Cancelled.status(), None);
        assert_eq!(ApiError::Timeout(30).status(), None);
        assert_eq!(ApiError::RateLimited.status(), Some(429));
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = ApiError::Api {
            status: 404,
            code: "ResourceNotFound".to_string(),
            message: "Api not found.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API returned error (HTTP 404) ResourceNotFound: Api not found."
        );
    }
}
