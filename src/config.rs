//! Environment configuration.
//!
//! | variable            | meaning                                      |
//! |---------------------|----------------------------------------------|
//! | `EHUB_BASE_URL`     | gateway base URL (default gateway if unset)  |
//! | `EHUB_CHANNEL_CODE` | channel code                                 |
//! | `EHUB_SECRET_KEY`   | channel secret                               |
//! | `EHUB_VERBOSE`      | `1`/`true` logs every outgoing request       |
//! | `EHUB_TEMPLATES`    | JSON file with extra API templates           |

use std::env;
use std::path::PathBuf;

use crate::credential::Credential;
use crate::error::GatewayError;
use crate::template::TemplateRegistry;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub channel_code: Option<String>,
    pub secret_key: Option<String>,
    pub verbose: bool,
    pub templates_path: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            base_url: non_empty("EHUB_BASE_URL"),
            channel_code: non_empty("EHUB_CHANNEL_CODE"),
            // Whitespace may be part of the secret
            secret_key: lookup("EHUB_SECRET_KEY").filter(|v| !v.is_empty()),
            verbose: non_empty("EHUB_VERBOSE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            templates_path: non_empty("EHUB_TEMPLATES").map(PathBuf::from),
        }
    }

    /// The configured credential. Blank parts are left for request validation to report.
    pub fn credential(&self) -> Credential {
        Credential::new(
            self.channel_code.clone().unwrap_or_default(),
            self.secret_key.clone().unwrap_or_default(),
        )
    }

    pub fn templates(&self) -> Result<TemplateRegistry, GatewayError> {
        match &self.templates_path {
            Some(path) => TemplateRegistry::load_file(path),
            None => Ok(TemplateRegistry::builtin()),
        }
    }
}
