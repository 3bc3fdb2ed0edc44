//! Heuristic classification of transport-level failures.
//!
//! Neither browsers nor HTTP stacks hand back a structured reason when a call
//! dies before the gateway answers, so the kind is inferred from the error
//! code and message. Rules are checked in order; the first match wins.
//!
//! | # | condition                                          | kind                 |
//! |---|----------------------------------------------------|----------------------|
//! | 1 | message mentions `CORS` / `Access-Control`         | `CorsBlocked`        |
//! | 2 | code `ERR_FAILED`, no response                     | `CorsBlocked`        |
//! | 3 | code `ERR_NETWORK`, no response                    | `CorsBlocked`        |
//! | 4 | network-ish code or message                        | `NetworkUnavailable` |
//! | 5 | anything else                                      | `Unknown`            |

use std::error::Error as StdError;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::GatewayError;

static CORS_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CORS|Access-Control|blocked by CORS policy").expect("valid CORS pattern")
});

static NETWORK_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)network error|failed to fetch|error sending request|connection refused|dns error|timed out",
    )
    .expect("valid network pattern")
});

const NETWORK_CODES: [&str; 6] = [
    "ERR_NETWORK",
    "ERR_CONNECT",
    "ERR_TIMEOUT",
    "ECONNREFUSED",
    "ENOTFOUND",
    "ETIMEDOUT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    CorsBlocked,
    NetworkUnavailable,
    Unknown,
}

/// What is known about a failed call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportFailure {
    pub code: Option<String>,
    pub message: String,
    /// Whether any HTTP response arrived before the failure
    pub has_response: bool,
}

struct Rule {
    kind: TransportErrorKind,
    matches: fn(&TransportFailure) -> bool,
}

const RULES: [Rule; 4] = [
    Rule {
        kind: TransportErrorKind::CorsBlocked,
        matches: |f| CORS_MESSAGE.is_match(&f.message),
    },
    Rule {
        kind: TransportErrorKind::CorsBlocked,
        matches: |f| !f.has_response && f.code_is("ERR_FAILED"),
    },
    Rule {
        kind: TransportErrorKind::CorsBlocked,
        matches: |f| !f.has_response && f.code_is("ERR_NETWORK"),
    },
    Rule {
        kind: TransportErrorKind::NetworkUnavailable,
        matches: |f| {
            NETWORK_CODES.iter().any(|code| f.code_is(code)) || NETWORK_MESSAGE.is_match(&f.message)
        },
    },
];

impl TransportFailure {
    pub fn new(code: Option<&str>, message: impl Into<String>, has_response: bool) -> Self {
        Self {
            code: code.map(str::to_string),
            message: message.into(),
            has_response,
        }
    }

    fn code_is(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }

    pub fn kind(&self) -> TransportErrorKind {
        classify_transport_failure(self)
    }

    pub fn into_error(self) -> GatewayError {
        match self.kind() {
            TransportErrorKind::CorsBlocked => GatewayError::CorsBlocked {
                message: self.message,
            },
            TransportErrorKind::NetworkUnavailable => GatewayError::NetworkUnavailable {
                message: self.message,
            },
            TransportErrorKind::Unknown => GatewayError::Unknown {
                message: self.message,
            },
        }
    }
}

impl From<&reqwest::Error> for TransportFailure {
    fn from(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            Some("ERR_TIMEOUT")
        } else if err.is_connect() {
            Some("ERR_CONNECT")
        } else {
            None
        };

        // reqwest's Display omits the cause chain, which is where "connection refused" lives
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::new(code, message, err.status().is_some())
    }
}

/// Apply the rule table to a failure.
pub fn classify_transport_failure(failure: &TransportFailure) -> TransportErrorKind {
    RULES
        .iter()
        .find(|rule| (rule.matches)(failure))
        .map(|rule| rule.kind)
        .unwrap_or(TransportErrorKind::Unknown)
}
