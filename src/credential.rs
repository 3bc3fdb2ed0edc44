//! Gateway credential types.
//!
//! A channel code and secret key are issued out-of-band to each payment
//! channel. The secret only ever feeds the request checksum.

use std::fmt;

/// Channel credentials for signing gateway requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub channel_code: String,
    pub secret_key: String,
}

impl Credential {
    pub fn new(channel_code: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            channel_code: channel_code.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("channel_code", &self.channel_code)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// True for any casing of `secretKey`. Such fields are never put on the wire.
pub fn is_secret_field(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("secretKey")
}
