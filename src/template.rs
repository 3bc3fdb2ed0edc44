//! Configurable API templates.
//!
//! A template describes an endpoint the way the fixed operations are
//! described in [`crate::request`]: method, path, the fields it sends and how
//! its checksum is formed. This lets new or changed gateway endpoints be
//! probed without code changes. Templates are plain JSON:
//!
//! ```json
//! {
//!   "id": "getbills",
//!   "name": "List student bills",
//!   "method": "POST",
//!   "endpoint": "/ehub/payment/getbills",
//!   "fields": [
//!     {"name": "channelCode", "label": "Channel Code", "required": true, "defaultValue": "DLC"},
//!     {"name": "studentId", "label": "Student ID", "required": true},
//!     {"name": "checkSum", "label": "CheckSum (auto)"}
//!   ],
//!   "checksum": {"format": "StudentId|timestamp|channelCode|secretKey",
//!                "fields": ["studentId", "channelCode"]}
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::checksum::{self, Timestamp};
use crate::credential::is_secret_field;
use crate::error::{GatewayError, ValidationError};
use crate::request::{
    self, CALLBACK_ENDPOINT, GET_BILLS_ENDPOINT, PAY_ENDPOINT, Payload, PreparedRequest,
    is_blank, merge_additional_fields,
};
use crate::types::{FieldMap, HttpMethod};

const CHECKSUM_FIELD: &str = "checkSum";
const TIMESTAMP_FIELD: &str = "timestamp";
const BILLS_FIELD: &str = "bills";
const BILL_ID_INPUT: &str = "billId";
const STUDENT_FORMAT: &str = "StudentId|timestamp|channelCode|secretKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    String,
    Number,
    Boolean,
    Object,
    Array,
}

/// One field a template sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApiField {
    fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: FieldKind::String,
            required: false,
            default_value: None,
            placeholder: None,
            description: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn is_generated(&self) -> bool {
        is_generated_field(&self.name)
    }
}

/// Output slots are filled by the engine, never by the caller.
fn is_generated_field(name: &str) -> bool {
    name == CHECKSUM_FIELD || name == TIMESTAMP_FIELD
}

/// How a template's checksum is formed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumSpec {
    /// Pipe-separated tokens, e.g. `StudentId|timestamp|channelCode|secretKey`
    pub format: String,
    /// Payload fields that may be substituted. Empty means any.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl ChecksumSpec {
    fn allows(&self, name: &str) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub fields: Vec<ApiField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumSpec>,
}

/// Input for one template call
#[derive(Debug, Clone, Default)]
pub struct TemplateCall {
    /// Form values keyed by field name
    pub values: FieldMap,
    /// Replaces the template's base URL when non-empty
    pub base_url: Option<String>,
    /// Merged last, with the same exclusions as fixed-operation extras
    pub overrides: FieldMap,
}

/// Resolve a template's outgoing fields from caller values.
///
/// An explicit non-blank caller value always wins over the template default.
pub fn resolve_payload(
    template: &ApiTemplate,
    values: &FieldMap,
    secret: Option<&str>,
    timestamp: Timestamp,
) -> Result<FieldMap, GatewayError> {
    let explicit = |name: &str| {
        values
            .get(name)
            .filter(|v| !is_secret_field(name) && !is_blank(v))
    };

    let mut payload = FieldMap::new();
    for field in &template.fields {
        if is_secret_field(&field.name) || field.name == CHECKSUM_FIELD {
            continue;
        }
        // The sent timestamp is always the one that gets signed
        if field.name == TIMESTAMP_FIELD {
            payload.insert(field.name.clone(), json!(timestamp.to_string()));
            continue;
        }
        if field.name == BILLS_FIELD
            && let Some(bill_id) = explicit(BILL_ID_INPUT)
        {
            payload.insert(BILLS_FIELD.into(), json!({ "code": bill_id }));
            continue;
        }
        if let Some(value) = explicit(&field.name) {
            payload.insert(field.name.clone(), value.clone());
        } else if let Some(default) = field.default_value.as_ref().filter(|v| !is_blank(v)) {
            payload.insert(field.name.clone(), default.clone());
        }
    }

    let mut v = ValidationError::default();
    for field in template.fields.iter().filter(|f| f.required && !f.is_generated()) {
        if !payload.contains_key(&field.name) {
            v.missing_fields.push(field.name.clone());
        }
    }
    let secret = secret.filter(|s| !s.trim().is_empty());
    if template.checksum.is_some() && secret.is_none() {
        v.missing_fields.push("secretKey".to_string());
    }
    v.into_result()?;

    if let (Some(spec), Some(secret)) = (&template.checksum, secret) {
        let canonical: FieldMap = payload
            .iter()
            .filter(|(name, _)| spec.allows(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let tokens = checksum::parse_format(&spec.format);
        let digest = checksum::compute_checksum(&tokens, &canonical, secret, timestamp);
        payload.insert(CHECKSUM_FIELD.into(), json!(digest));
    }

    Ok(payload)
}

/// Resolve, sign and shape a template call.
pub fn prepare(
    template: &ApiTemplate,
    call: &TemplateCall,
    secret: Option<&str>,
    timestamp: Timestamp,
) -> Result<PreparedRequest, GatewayError> {
    let mut fields = resolve_payload(template, &call.values, secret, timestamp)?;
    merge_additional_fields(&mut fields, &call.overrides);

    let base_url = call
        .base_url
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .or(template.base_url.as_deref());

    let payload = if template.method.has_body() {
        Payload::Body(fields)
    } else {
        Payload::Query(fields)
    };

    Ok(PreparedRequest {
        method: template.method,
        url: request::resolve_url(base_url, &template.endpoint),
        payload,
    })
}

fn channel_code_field() -> ApiField {
    ApiField::new("channelCode", "Channel Code")
        .required()
        .default_value(json!("DLC"))
        .placeholder("DLC")
}

fn student_id_field() -> ApiField {
    ApiField::new("studentId", "Student ID")
        .required()
        .placeholder("030740240067")
}

fn checksum_field() -> ApiField {
    ApiField::new(CHECKSUM_FIELD, "CheckSum (auto)")
        .description("Generated from StudentId|timestamp|channelCode|secretKey")
}

fn timestamp_field() -> ApiField {
    ApiField::new(TIMESTAMP_FIELD, "Timestamp (auto)")
        .description("Current time in milliseconds")
}

fn student_checksum() -> Option<ChecksumSpec> {
    Some(ChecksumSpec {
        format: STUDENT_FORMAT.to_string(),
        fields: vec!["studentId".to_string(), "channelCode".to_string()],
    })
}

/// The three gateway operations expressed as templates.
pub fn builtin_templates() -> Vec<ApiTemplate> {
    vec![
        ApiTemplate {
            id: "getbills".into(),
            name: "List bills (getbills)".into(),
            description: "List a student's outstanding bills".into(),
            method: HttpMethod::Post,
            endpoint: GET_BILLS_ENDPOINT.into(),
            base_url: None,
            fields: vec![channel_code_field(), student_id_field(), checksum_field()],
            checksum: student_checksum(),
        },
        ApiTemplate {
            id: "getBillInfo".into(),
            name: "Bill details (pay)".into(),
            description: "Look up a single bill".into(),
            method: HttpMethod::Post,
            endpoint: PAY_ENDPOINT.into(),
            base_url: None,
            fields: vec![
                channel_code_field(),
                ApiField::new(BILLS_FIELD, "Bills (code)")
                    .kind(FieldKind::Object)
                    .description("Object whose \"code\" is the bill id"),
                student_id_field(),
                timestamp_field(),
                checksum_field(),
            ],
            checksum: student_checksum(),
        },
        ApiTemplate {
            id: "payBill".into(),
            name: "Pay bill (callback)".into(),
            description: "Settle a bill".into(),
            method: HttpMethod::Post,
            endpoint: CALLBACK_ENDPOINT.into(),
            base_url: None,
            fields: vec![
                channel_code_field(),
                ApiField::new(BILLS_FIELD, "Bills (code)")
                    .kind(FieldKind::Object)
                    .required()
                    .placeholder("0d6a5f25-a110-49f4-8d40-6cfaa06668bf"),
                student_id_field(),
                ApiField::new("amount", "Amount")
                    .required()
                    .placeholder("1000000"),
                timestamp_field(),
                checksum_field(),
            ],
            checksum: student_checksum(),
        },
    ]
}

/// Built-in templates plus any loaded from configuration
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<ApiTemplate>,
}

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self {
            templates: builtin_templates(),
        }
    }

    /// Add a template, replacing any existing one with the same id.
    pub fn insert(&mut self, template: ApiTemplate) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    /// Load extra templates from a JSON array file on top of the built-ins.
    pub fn load_file(path: &Path) -> Result<Self, GatewayError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let custom: Vec<ApiTemplate> = serde_json::from_str(&text).map_err(|e| {
            GatewayError::Config(format!("invalid templates in {}: {}", path.display(), e))
        })?;

        let mut registry = Self::builtin();
        for template in custom {
            tracing::debug!(id = %template.id, "loaded API template");
            registry.insert(template);
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Result<&ApiTemplate, GatewayError> {
        self.templates
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| GatewayError::UnknownTemplate(id.to_string()))
    }

    pub fn all(&self) -> &[ApiTemplate] {
        &self.templates
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn values(pairs: &[(&str, Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn probe_template() -> ApiTemplate {
        ApiTemplate {
            id: "probe".into(),
            name: "Probe".into(),
            description: String::new(),
            method: HttpMethod::Post,
            endpoint: "/probe".into(),
            base_url: None,
            fields: vec![
                ApiField::new("studentId", "Student").default_value(json!("y")),
                ApiField::new("note", "Note"),
            ],
            checksum: None,
        }
    }

    #[test]
    fn test_explicit_value_beats_default() {
        let template = probe_template();
        let payload = resolve_payload(
            &template,
            &values(&[("studentId", json!("x"))]),
            None,
            Timestamp::now(),
        )
        .unwrap();
        assert_eq!(payload["studentId"], "x");
    }

    #[test]
    fn test_default_fills_absent_or_blank() {
        let template = probe_template();
        let ts = Timestamp::now();
        let payload = resolve_payload(&template, &FieldMap::new(), None, ts).unwrap();
        assert_eq!(payload["studentId"], "y");
        assert!(!payload.contains_key("note"));

        let payload =
            resolve_payload(&template, &values(&[("studentId", json!(""))]), None, ts).unwrap();
        assert_eq!(payload["studentId"], "y");
    }

    #[test]
    fn test_undeclared_values_ignored() {
        let payload = resolve_payload(
            &probe_template(),
            &values(&[("extra", json!("1"))]),
            None,
            Timestamp::now(),
        )
        .unwrap();
        assert!(!payload.contains_key("extra"));
    }

    #[test]
    fn test_builtin_pay_bill_matches_fixed_operation() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("payBill").unwrap();
        let ts = Timestamp::from_millis(1700000000000);
        let call = TemplateCall {
            values: values(&[
                ("billId", json!("abc")),
                ("amount", json!("1000")),
                ("studentId", json!("s1")),
                ("secretKey", json!("k")),
            ]),
            ..Default::default()
        };
        let req = prepare(template, &call, Some("k"), ts).unwrap();

        assert_eq!(req.url, "https://tailieuso.hub.edu.vn/ehub/payment/callback");
        assert_eq!(req.field("bills"), Some(&json!({"code": "abc"})));
        assert_eq!(req.field("channelCode"), Some(&json!("DLC")));
        assert_eq!(req.field("timestamp"), Some(&json!("1700000000000")));
        assert_eq!(req.checksum(), Some("3a5a0cfe4e84aa3bcea0ed1a54daa2d4"));
        assert!(req.field("secretKey").is_none());
    }

    #[test]
    fn test_builtin_getbills_known_vector() {
        let registry = TemplateRegistry::builtin();
        let call = TemplateCall {
            values: values(&[("studentId", json!("030740240067"))]),
            ..Default::default()
        };
        let req = prepare(
            registry.get("getbills").unwrap(),
            &call,
            Some("DLC@!2345"),
            Timestamp::from_millis(1765420693000),
        )
        .unwrap();
        assert_eq!(req.checksum(), Some("7807085b565a024fc3b58476ce4e712d"));
        assert!(req.field("timestamp").is_none());
    }

    #[test]
    fn test_secret_never_emitted() {
        let registry = TemplateRegistry::builtin();
        let mut overrides = FieldMap::new();
        overrides.insert("secretkey".into(), json!("DLC@!2345"));
        for template in registry.all() {
            let call = TemplateCall {
                values: values(&[
                    ("studentId", json!("s1")),
                    ("billId", json!("abc")),
                    ("amount", json!("1")),
                    ("secretKey", json!("DLC@!2345")),
                ]),
                base_url: None,
                overrides: overrides.clone(),
            };
            let req = prepare(template, &call, Some("DLC@!2345"), Timestamp::now()).unwrap();
            let text = serde_json::to_string(req.payload.fields()).unwrap();
            assert!(!text.contains("DLC@!2345"), "{}: {}", template.id, text);
        }
    }

    #[test]
    fn test_explicit_checksum_input_is_replaced() {
        let registry = TemplateRegistry::builtin();
        let call = TemplateCall {
            values: values(&[("studentId", json!("s1")), ("checkSum", json!("forged"))]),
            ..Default::default()
        };
        let req = prepare(registry.get("getbills").unwrap(), &call, Some("k"), Timestamp::now())
            .unwrap();
        assert_ne!(req.checksum(), Some("forged"));
    }

    #[test]
    fn test_caller_timestamp_cannot_diverge_from_signed_one() {
        let registry = TemplateRegistry::builtin();
        let template = registry.get("payBill").unwrap();
        let ts = Timestamp::from_millis(1700000000000);
        let mut overrides = FieldMap::new();
        overrides.insert("timestamp".into(), json!("1699999999998"));
        overrides.insert("checkSum".into(), json!("forged"));
        let call = TemplateCall {
            values: values(&[
                ("billId", json!("abc")),
                ("amount", json!("1000")),
                ("studentId", json!("s1")),
                ("timestamp", json!("1699999999999")),
            ]),
            base_url: None,
            overrides,
        };
        let req = prepare(template, &call, Some("k"), ts).unwrap();

        assert_eq!(req.field("timestamp"), Some(&json!("1700000000000")));
        assert_eq!(
            req.checksum(),
            Some(checksum::md5_hex("s1|1700000000000|DLC|k").as_str())
        );
    }

    #[test]
    fn test_checksum_requires_secret() {
        let registry = TemplateRegistry::builtin();
        let call = TemplateCall {
            values: values(&[("studentId", json!("s1"))]),
            ..Default::default()
        };
        let err = prepare(registry.get("getbills").unwrap(), &call, None, Timestamp::now())
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Validation(ref v) if v.missing_fields == vec!["secretKey".to_string()]
        ));
    }

    #[test]
    fn test_required_fields() {
        let registry = TemplateRegistry::builtin();
        let call = TemplateCall {
            values: values(&[("studentId", json!("s1"))]),
            ..Default::default()
        };
        let err = prepare(registry.get("payBill").unwrap(), &call, Some("k"), Timestamp::now())
            .unwrap_err();
        match err {
            GatewayError::Validation(v) => assert_eq!(v.missing_fields, vec!["bills", "amount"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_get_template_uses_query() {
        let template = ApiTemplate {
            method: HttpMethod::Get,
            base_url: Some("http://template.example".into()),
            ..probe_template()
        };
        let call = TemplateCall {
            values: values(&[("note", json!("hi"))]),
            base_url: Some("http://override.example".into()),
            ..Default::default()
        };
        let req = prepare(&template, &call, None, Timestamp::now()).unwrap();
        assert_eq!(req.url, "http://override.example/probe");
        match req.payload {
            Payload::Query(fields) => assert_eq!(fields["note"], "hi"),
            other => panic!("expected query payload, got {:?}", other),
        }

        let req = prepare(&template, &TemplateCall::default(), None, Timestamp::now()).unwrap();
        assert_eq!(req.url, "http://template.example/probe");
    }

    #[test]
    fn test_load_file_overrides_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "getbills", "method": "POST", "endpoint": "/v2/getbills",
                  "fields": [{{"name": "studentId", "required": true}}]}},
                {{"id": "ping", "method": "GET", "endpoint": "/ping"}}
            ]"#
        )
        .unwrap();

        let registry = TemplateRegistry::load_file(file.path()).unwrap();
        assert_eq!(registry.all().len(), 4);
        assert_eq!(registry.get("getbills").unwrap().endpoint, "/v2/getbills");
        assert_eq!(registry.get("ping").unwrap().method, HttpMethod::Get);
        assert!(matches!(
            registry.get("missing"),
            Err(GatewayError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_load_file_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            TemplateRegistry::load_file(file.path()),
            Err(GatewayError::Config(_))
        ));
    }
}
