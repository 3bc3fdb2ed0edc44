use std::fmt;

use thiserror::Error;

use crate::result_code;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("request blocked by CORS policy: {message}")]
    CorsBlocked { message: String },
    #[error("network unavailable: {message}")]
    NetworkUnavailable { message: String },
    #[error("gateway returned HTTP {status}: {body}")]
    GatewayHttp {
        status: u16,
        result_code: Option<String>,
        body: String,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unknown API template: {0}")]
    UnknownTemplate(String),
    #[error("failed to decode gateway response: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unexpected error: {message}")]
    Unknown { message: String },
}

impl GatewayError {
    /// Message for the dismissible error banner.
    pub fn banner(&self) -> String {
        match self {
            Self::CorsBlocked { .. } => "CORS error: the server does not allow access from this origin. \
                Check the server's CORS configuration or use the local proxy."
                .to_string(),
            Self::NetworkUnavailable { .. } => "Network error: check the internet connection; \
                the API domain may be unavailable."
                .to_string(),
            Self::GatewayHttp {
                result_code: Some(code),
                ..
            } => result_code::classify(code).banner(),
            Self::GatewayHttp { status, body, .. } => {
                if body.trim().is_empty() {
                    format!("Gateway error (HTTP {})", status)
                } else {
                    format!("Gateway error (HTTP {}): {}", status, body.trim())
                }
            }
            Self::Validation(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

/// Local validation failure, raised before anything is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub missing_fields: Vec<String>,
    pub too_long: Vec<(String, usize)>,
}

impl ValidationError {
    pub fn require(&mut self, field: &str, value: Option<&str>) {
        if value.is_none_or(|v| v.trim().is_empty()) {
            self.missing_fields.push(field.to_string());
        }
    }

    pub fn limit(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.too_long.push((field.to_string(), max));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty() && self.too_long.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing_fields.is_empty() {
            parts.push(format!(
                "missing required fields: {}",
                self.missing_fields.join(", ")
            ));
        }
        for (field, max) in &self.too_long {
            parts.push(format!("{} must not exceed {} characters", field, max));
        }
        write!(f, "Please fill in all required fields ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_collects_all_problems() {
        let mut v = ValidationError::default();
        v.require("channelCode", Some("DLC"));
        v.require("secretKey", Some("  "));
        v.require("studentId", None);
        v.limit("channelCode", &"x".repeat(256), 255);

        let err = v.into_result().unwrap_err();
        assert_eq!(err.missing_fields, vec!["secretKey", "studentId"]);
        assert_eq!(err.too_long, vec![("channelCode".to_string(), 255)]);
        let message = err.to_string();
        assert!(message.contains("secretKey, studentId"));
        assert!(message.contains("channelCode must not exceed 255"));
    }

    #[test]
    fn test_banner_uses_result_code() {
        let err = GatewayError::GatewayHttp {
            status: 400,
            result_code: Some("02".into()),
            body: "{}".into(),
        };
        assert!(err.banner().ends_with("(code: 02)"));

        let err = GatewayError::GatewayHttp {
            status: 502,
            result_code: None,
            body: "Bad Gateway".into(),
        };
        assert_eq!(err.banner(), "Gateway error (HTTP 502): Bad Gateway");
    }
}
