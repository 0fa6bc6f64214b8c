//! API error types for The Odds API client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {status_code} - {message}")]
    Http {
        status_code: u16,
        error_code: String,
        message: String,
    },

    #[error("Rate limited (retry after {retry_after}s)")]
    RateLimited { retry_after: u64 },

    #[error("Usage quota exhausted ({used} requests used)")]
    QuotaExhausted { used: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl ApiError {
    /// Parse an error response body: `{"message": ..., "error_code": ...}`.
    pub fn from_response(status_code: u16, body: &str, requests_used: u64) -> Self {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
            let code = json
                .get("error_code")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            let message = json
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or(body)
                .to_string();

            return match code.as_str() {
                "OUT_OF_USAGE_CREDITS" => Self::QuotaExhausted {
                    used: requests_used,
                },
                "EXCEEDED_FREQ_LIMIT" => Self::RateLimited { retry_after: 1 },
                _ => Self::Http {
                    status_code,
                    error_code: code,
                    message,
                },
            };
        }

        Self::Http {
            status_code,
            error_code: "UNKNOWN".to_string(),
            message: body.to_string(),
        }
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Network(_)
                | Self::Timeout(_)
                | Self::Http {
                    status_code: 500..=599,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_code() {
        let body = r#"{"message":"Usage quota has been reached","error_code":"OUT_OF_USAGE_CREDITS"}"#;
        let err = ApiError::from_response(401, body, 500);
        assert!(matches!(err, ApiError::QuotaExhausted { used: 500 }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unknown_sport_is_not_retryable() {
        let body = r#"{"message":"Unknown sport","error_code":"UNKNOWN_SPORT"}"#;
        let err = ApiError::from_response(404, body, 0);
        match &err {
            ApiError::Http { error_code, message, .. } => {
                assert_eq!(error_code, "UNKNOWN_SPORT");
                assert_eq!(message, "Unknown sport");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_plain_text_body_and_server_errors() {
        let err = ApiError::from_response(503, "Service Unavailable", 0);
        assert!(err.is_retryable());
        assert!(ApiError::RateLimited { retry_after: 2 }.is_retryable());
    }
}
