//! Request checksum generation.
//!
//! Every gateway call is authenticated by an MD5 digest over a pipe-delimited
//! canonical string. For the fixed operations that string is
//! `studentId|timestamp|channelCode|secretKey`. The gateway recomputes it on
//! its side, so token order and value rendering must match exactly; any
//! deviation comes back as ResultCode `02`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};
use serde_json::Value;

use crate::types::FieldMap;

/// Canonical token order shared by getbills, pay and callback.
///
/// The gateway documentation spells the third token `chanelCode`; the value
/// that actually verifies is the channel code itself.
pub const STUDENT_CANONICAL: [&str; 4] = ["studentId", "timestamp", "channelCode", "secretKey"];

const SEPARATOR: char = '|';
const TIMESTAMP_TOKEN: &str = "timestamp";
const SECRET_TOKEN: &str = "secretKey";

/// Milliseconds since the Unix epoch, taken once per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split a configured format such as `"StudentId|timestamp|channelCode|secretKey"`.
pub fn parse_format(format: &str) -> Vec<String> {
    format
        .split(SEPARATOR)
        .map(|part| part.trim().to_string())
        .collect()
}

/// Render a field value the way it appears in the canonical string.
///
/// Objects contribute their nested `code` (the `bills: {code}` field).
pub fn canonical_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => match map.get("code") {
            Some(code) => canonical_value(code),
            None => value.to_string(),
        },
        Value::Array(_) => value.to_string(),
    }
}

fn lookup<'a>(values: &'a FieldMap, token: &str) -> Option<&'a Value> {
    values
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map(|(_, value)| value)
}

/// Resolve a single token: field value, then `timestamp`, then `secretKey`,
/// otherwise the token itself.
pub fn resolve_token(token: &str, values: &FieldMap, secret: &str, timestamp: Timestamp) -> String {
    let token = token.trim();
    if let Some(value) = lookup(values, token) {
        canonical_value(value)
    } else if token.eq_ignore_ascii_case(TIMESTAMP_TOKEN) {
        timestamp.to_string()
    } else if token.eq_ignore_ascii_case(SECRET_TOKEN) {
        secret.to_string()
    } else {
        token.to_string()
    }
}

/// Build the pipe-joined string that gets hashed.
pub fn canonical_string<S: AsRef<str>>(
    tokens: &[S],
    values: &FieldMap,
    secret: &str,
    timestamp: Timestamp,
) -> String {
    tokens
        .iter()
        .map(|token| resolve_token(token.as_ref(), values, secret, timestamp))
        .collect::<Vec<_>>()
        .join("|")
}

/// Lowercase hex MD5 of the canonical string.
pub fn compute_checksum<S: AsRef<str>>(
    tokens: &[S],
    values: &FieldMap,
    secret: &str,
    timestamp: Timestamp,
) -> String {
    md5_hex(&canonical_string(tokens, values, secret, timestamp))
}

pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
