//! Request assembly for the fixed gateway operations.
//!
//! Bodies are built from a per-operation whitelist. The secret key only ever
//! reaches [`checksum::compute_checksum`]; it is not a body field of any
//! operation and is filtered out of caller-supplied extras.

use serde_json::{Value, json};

use crate::checksum::{self, STUDENT_CANONICAL, Timestamp};
use crate::credential::{Credential, is_secret_field};
use crate::error::{GatewayError, ValidationError};
use crate::types::{FieldMap, HttpMethod};

pub const DEFAULT_BASE_URL: &str = "https://tailieuso.hub.edu.vn";
pub const PAY_ENDPOINT: &str = "/ehub/payment/pay";
pub const GET_BILLS_ENDPOINT: &str = "/ehub/payment/getbills";
pub const CALLBACK_ENDPOINT: &str = "/ehub/payment/callback";

const MAX_CHANNEL_CODE_LEN: usize = 255;
const MAX_SECRET_KEY_LEN: usize = 255;
const MAX_STUDENT_ID_LEN: usize = 50;

/// Where the request fields go on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Body(FieldMap),
    Query(FieldMap),
}

impl Payload {
    pub fn fields(&self) -> &FieldMap {
        match self {
            Self::Body(fields) | Self::Query(fields) => fields,
        }
    }
}

/// A signed request, ready for the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub payload: Payload,
}

impl PreparedRequest {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.fields().get(name)
    }

    pub fn checksum(&self) -> Option<&str> {
        self.field("checkSum").and_then(Value::as_str)
    }
}

/// The fixed gateway operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Look up one bill (`/ehub/payment/pay`)
    GetBillInfo {
        student_id: String,
        bill_id: Option<String>,
    },
    /// List a student's bills (`/ehub/payment/getbills`)
    GetBills { student_id: String },
    /// Settle a bill (`/ehub/payment/callback`)
    PayBill {
        student_id: String,
        bill_id: String,
        amount: String,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetBillInfo { .. } => "getBillInfo",
            Self::GetBills { .. } => "getBills",
            Self::PayBill { .. } => "payBill",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::GetBillInfo { .. } => PAY_ENDPOINT,
            Self::GetBills { .. } => GET_BILLS_ENDPOINT,
            Self::PayBill { .. } => CALLBACK_ENDPOINT,
        }
    }

    pub fn method(&self) -> HttpMethod {
        HttpMethod::Post
    }

    pub fn student_id(&self) -> &str {
        match self {
            Self::GetBillInfo { student_id, .. }
            | Self::GetBills { student_id }
            | Self::PayBill { student_id, .. } => student_id,
        }
    }

    /// Whether the body carries the timestamp that went into the checksum.
    /// getbills hashes it but does not send it.
    fn sends_timestamp(&self) -> bool {
        !matches!(self, Self::GetBills { .. })
    }
}

/// Caller overrides for a single call
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Replaces [`DEFAULT_BASE_URL`] when non-empty
    pub base_url: Option<String>,
    /// Replaces the operation's endpoint when non-empty
    pub endpoint: Option<String>,
    /// Extra body fields; `secretKey`, nulls and empty strings are skipped
    pub additional_fields: FieldMap,
}

/// Join a base URL and endpoint path, falling back to the default gateway.
pub fn resolve_url(base_url: Option<&str>, endpoint: &str) -> String {
    let base = base_url
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/');
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        base.to_string()
    } else if endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// True for `null` and blank strings, which never count as a supplied value.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Fields derived while signing; extras never replace them.
const SIGNED_FIELDS: [&str; 2] = ["checkSum", "timestamp"];

/// Merge caller extras into an outgoing field map.
pub fn merge_additional_fields(fields: &mut FieldMap, extra: &FieldMap) {
    for (name, value) in extra {
        if is_secret_field(name) || SIGNED_FIELDS.contains(&name.as_str()) || is_blank(value) {
            continue;
        }
        fields.insert(name.clone(), value.clone());
    }
}

fn validate(operation: &Operation, credential: &Credential) -> Result<(), ValidationError> {
    let mut v = ValidationError::default();
    v.require("channelCode", Some(&credential.channel_code));
    v.require("secretKey", Some(&credential.secret_key));
    v.require("studentId", Some(operation.student_id()));
    if let Operation::PayBill {
        bill_id, amount, ..
    } = operation
    {
        v.require("billId", Some(bill_id));
        v.require("amount", Some(amount));
    }
    v.limit("channelCode", &credential.channel_code, MAX_CHANNEL_CODE_LEN);
    v.limit("secretKey", &credential.secret_key, MAX_SECRET_KEY_LEN);
    v.limit("studentId", operation.student_id(), MAX_STUDENT_ID_LEN);
    v.into_result()
}

/// Validate, sign and shape one fixed operation.
pub fn build_request(
    operation: &Operation,
    credential: &Credential,
    options: &RequestOptions,
    timestamp: Timestamp,
) -> Result<PreparedRequest, GatewayError> {
    validate(operation, credential)?;

    let student_id = operation.student_id().trim();
    let channel_code = credential.channel_code.trim();

    let mut canonical = FieldMap::new();
    canonical.insert("studentId".into(), json!(student_id));
    canonical.insert("channelCode".into(), json!(channel_code));
    let check_sum = checksum::compute_checksum(
        &STUDENT_CANONICAL,
        &canonical,
        &credential.secret_key,
        timestamp,
    );

    let mut body = FieldMap::new();
    body.insert("channelCode".into(), json!(channel_code));
    match operation {
        Operation::GetBillInfo { bill_id, .. } => {
            if let Some(bill_id) = bill_id.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
                body.insert("bills".into(), json!({ "code": bill_id }));
            }
        }
        Operation::GetBills { .. } => {}
        Operation::PayBill {
            bill_id, amount, ..
        } => {
            body.insert("bills".into(), json!({ "code": bill_id.trim() }));
            body.insert("amount".into(), json!(amount.trim()));
        }
    }
    body.insert("studentId".into(), json!(student_id));
    body.insert("checkSum".into(), json!(check_sum));
    if operation.sends_timestamp() {
        body.insert("timestamp".into(), json!(timestamp.to_string()));
    }

    merge_additional_fields(&mut body, &options.additional_fields);

    let endpoint = options
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(operation.default_endpoint());

    Ok(PreparedRequest {
        method: operation.method(),
        url: resolve_url(options.base_url.as_deref(), endpoint),
        payload: Payload::Body(body),
    })
}
