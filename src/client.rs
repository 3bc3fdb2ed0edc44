use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::checksum::Timestamp;
use crate::config::GatewayConfig;
use crate::credential::Credential;
use crate::error::GatewayError;
use crate::request::{self, Operation, Payload, PreparedRequest, RequestOptions};
use crate::template::{self, ApiTemplate, TemplateCall};
use crate::transport::TransportFailure;
use crate::types::{BillInfoResponse, GetBillsResponse, PayResult};

/// Body of a gateway response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }

    /// Plain text of the body; JSON strings are unquoted.
    pub fn as_text(&self) -> String {
        match self {
            Self::Json(Value::String(s)) => s.clone(),
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    pub fn result_code(&self) -> Option<String> {
        match self {
            Self::Json(value) => value.get("ResultCode").map(|code| match code {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            Self::Text(_) => None,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, GatewayError> {
        match self {
            Self::Json(value) => {
                T::deserialize(value).map_err(|e| GatewayError::Decode(e.to_string()))
            }
            Self::Text(text) => Err(GatewayError::Decode(format!(
                "expected JSON, got: {}",
                text
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ResponseBody,
}

/// Configuration for PaymentClient
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Base URL used when a call does not override it
    pub base_url: Option<String>,
    /// Log method, URL and payload of every outgoing request
    pub verbose: bool,
}

impl From<&GatewayConfig> for ClientConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            verbose: config.verbose,
        }
    }
}

/// Signs and sends gateway requests. One network call per operation, no retries.
#[derive(Clone)]
pub struct PaymentClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl PaymentClient {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn options_with_default_base(&self, options: &RequestOptions) -> RequestOptions {
        let mut options = options.clone();
        if options.base_url.as_deref().is_none_or(|b| b.trim().is_empty()) {
            options.base_url = self.config.base_url.clone();
        }
        options
    }

    /// Send a prepared request.
    ///
    /// Non-2xx answers become [`GatewayError::GatewayHttp`]; failures before any
    /// answer are classified by [`crate::transport`].
    pub async fn dispatch(&self, request: &PreparedRequest) -> Result<GatewayResponse, GatewayError> {
        if self.config.verbose {
            match &request.payload {
                Payload::Body(body) => {
                    let payload = Value::Object(body.clone());
                    tracing::debug!(
                        method = %request.method,
                        url = %request.url,
                        payload = %payload,
                        "gateway request"
                    )
                }
                Payload::Query(_) => {
                    tracing::debug!(method = %request.method, url = %request.url, "gateway request")
                }
            }
        }

        let builder = self
            .http_client
            .request(request.method.into(), &request.url);
        let builder = match &request.payload {
            Payload::Body(body) => builder.json(body),
            Payload::Query(params) => {
                let pairs: Vec<(&str, String)> = params
                    .iter()
                    .map(|(name, value)| (name.as_str(), query_value(value)))
                    .collect();
                builder.query(&pairs)
            }
        };

        let response = builder.send().await.map_err(|e| {
            let failure = TransportFailure::from(&e);
            tracing::warn!("Request failed: {}", failure.message);
            failure.into_error()
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = response.text().await.map_err(|e| {
            TransportFailure::new(None, e.to_string(), true).into_error()
        })?;
        let body = ResponseBody::parse(text);

        if !status.is_success() {
            tracing::warn!("Gateway returned {} for {}", status, request.url);
            return Err(GatewayError::GatewayHttp {
                status: status.as_u16(),
                result_code: body.result_code(),
                body: body.as_text(),
            });
        }

        Ok(GatewayResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }

    /// Build, sign and send one fixed operation.
    pub async fn execute(
        &self,
        operation: &Operation,
        credential: &Credential,
        options: &RequestOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        let options = self.options_with_default_base(options);
        let request = request::build_request(operation, credential, &options, Timestamp::now())?;
        self.dispatch(&request).await
    }

    /// Look up a bill. A non-`00` ResultCode is returned, not raised;
    /// see [`BillInfoResponse::classification`].
    pub async fn get_bill_info(
        &self,
        credential: &Credential,
        student_id: &str,
        bill_id: Option<&str>,
        options: &RequestOptions,
    ) -> Result<BillInfoResponse, GatewayError> {
        let operation = Operation::GetBillInfo {
            student_id: student_id.to_string(),
            bill_id: bill_id.map(str::to_string),
        };
        self.execute(&operation, credential, options)
            .await?
            .body
            .decode()
    }

    pub async fn get_bills(
        &self,
        credential: &Credential,
        student_id: &str,
        options: &RequestOptions,
    ) -> Result<GetBillsResponse, GatewayError> {
        let operation = Operation::GetBills {
            student_id: student_id.to_string(),
        };
        self.execute(&operation, credential, options)
            .await?
            .body
            .decode()
    }

    /// Settle a bill. The gateway signals success with HTTP 200 and a text body.
    pub async fn pay_bill(
        &self,
        credential: &Credential,
        student_id: &str,
        bill_id: &str,
        amount: &str,
        options: &RequestOptions,
    ) -> Result<PayResult, GatewayError> {
        let operation = Operation::PayBill {
            student_id: student_id.to_string(),
            bill_id: bill_id.to_string(),
            amount: amount.to_string(),
        };
        let response = self.execute(&operation, credential, options).await?;
        Ok(PayResult {
            status: response.status,
            body: response.body.as_text(),
        })
    }

    /// Call a configured template.
    pub async fn call_template(
        &self,
        template: &ApiTemplate,
        call: &TemplateCall,
        secret: Option<&str>,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut call = call.clone();
        if call.base_url.as_deref().is_none_or(|b| b.trim().is_empty())
            && template.base_url.is_none()
        {
            call.base_url = self.config.base_url.clone();
        }
        let request = template::prepare(template, &call, secret, Timestamp::now())?;
        self.dispatch(&request).await
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_code::ResultKind;
    use crate::template::TemplateRegistry;
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::json;

    async fn spawn_gateway(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fake_gateway() -> Router {
        Router::new()
            .route(
                "/ehub/payment/pay",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "ResultCode": "00",
                        "Data": {
                            "StudentName": "Nguyen Van A",
                            "StudentId": body["studentId"],
                            "Bills": {
                                "Id": "abc",
                                "Description": "Library fee",
                                "DebtAmount": "1000000",
                                "CreateDate": "1765420693000"
                            }
                        },
                        "echo": body
                    }))
                }),
            )
            .route(
                "/ehub/payment/getbills",
                post(|| async { Json(json!({"ResultCode": "01"})) }),
            )
            .route(
                "/ehub/payment/callback",
                post(|| async { "Payment success" }),
            )
            .route(
                "/rejects",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"ResultCode": "02", "message": "bad checksum"})),
                    )
                }),
            )
            .route(
                "/echo-query",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!(params))
                }),
            )
    }

    fn client_for(base_url: &str) -> PaymentClient {
        PaymentClient::with_config(ClientConfig {
            base_url: Some(base_url.to_string()),
            verbose: true,
        })
        .unwrap()
    }

    fn credential() -> Credential {
        Credential::new("DLC", "DLC@!2345")
    }

    #[tokio::test]
    async fn test_get_bill_info() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let response = client
            .get_bill_info(&credential(), "030740240067", None, &RequestOptions::default())
            .await
            .unwrap();
        assert!(response.is_success());
        let bill = response.bill().unwrap();
        assert_eq!(bill.student_id, "030740240067");
        assert_eq!(bill.debt_amount, "1000000");
    }

    #[tokio::test]
    async fn test_sent_body_has_no_secret() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let response = client
            .execute(
                &Operation::GetBillInfo {
                    student_id: "s1".into(),
                    bill_id: Some("abc".into()),
                },
                &credential(),
                &RequestOptions::default(),
            )
            .await
            .unwrap();
        let ResponseBody::Json(body) = response.body else {
            panic!("expected JSON body");
        };
        let echo = &body["echo"];
        assert_eq!(echo["bills"]["code"], "abc");
        assert_eq!(echo["checkSum"].as_str().map(str::len), Some(32));
        assert!(!echo.to_string().contains("DLC@!2345"));
    }

    #[tokio::test]
    async fn test_result_code_failure_is_not_an_error() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let response = client
            .get_bill_info(
                &credential(),
                "s1",
                None,
                &RequestOptions {
                    endpoint: Some("/ehub/payment/getbills".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            response.classification().kind,
            ResultKind::StudentNotFound
        );
    }

    #[tokio::test]
    async fn test_get_bills_failure_code_is_reported() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let response = client
            .get_bills(&credential(), "s1", &RequestOptions::default())
            .await
            .unwrap();
        assert!(response.bills.is_empty());
        assert_eq!(
            response.failure().map(|f| f.kind),
            Some(ResultKind::StudentNotFound)
        );
    }

    #[tokio::test]
    async fn test_pay_bill_text_response() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let result = client
            .pay_bill(&credential(), "s1", "abc", "1000", &RequestOptions::default())
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.body, "Payment success");
    }

    #[tokio::test]
    async fn test_http_error_keeps_result_code() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let err = client
            .execute(
                &Operation::GetBills {
                    student_id: "s1".into(),
                },
                &credential(),
                &RequestOptions {
                    endpoint: Some("/rejects".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        match err {
            GatewayError::GatewayHttp {
                status,
                result_code,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(result_code.as_deref(), Some("02"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}", addr));
        let err = client
            .get_bills(&credential(), "s1", &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, GatewayError::NetworkUnavailable { .. }),
            "unexpected {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_validation_fails_without_dispatch() {
        // Nothing listens on port 9; validation must fail first.
        let client = client_for("http://127.0.0.1:9");
        let err = client
            .get_bills(&Credential::new("DLC", ""), "s1", &RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[tokio::test]
    async fn test_template_get_sends_query() {
        let base = spawn_gateway(fake_gateway()).await;
        let client = client_for(&base);

        let mut registry = TemplateRegistry::builtin();
        registry.insert(
            serde_json::from_value(json!({
                "id": "echo",
                "method": "GET",
                "endpoint": "/echo-query",
                "fields": [{"name": "studentId", "defaultValue": "y"}, {"name": "checkSum"}],
                "checksum": {"format": "studentId|timestamp|secretKey"}
            }))
            .unwrap(),
        );
        let mut call = TemplateCall::default();
        call.values.insert("studentId".into(), json!("x"));

        let response = client
            .call_template(registry.get("echo").unwrap(), &call, Some("k"))
            .await
            .unwrap();
        let ResponseBody::Json(params) = response.body else {
            panic!("expected JSON body");
        };
        assert_eq!(params["studentId"], "x");
        assert_eq!(params["checkSum"].as_str().map(str::len), Some(32));
        assert!(params.get("secretKey").is_none());
    }

    #[test]
    fn test_response_body_parse() {
        assert_eq!(
            ResponseBody::parse("Payment success".into()),
            ResponseBody::Text("Payment success".into())
        );
        let body = ResponseBody::parse(r#"{"ResultCode": 3}"#.into());
        assert_eq!(body.result_code().as_deref(), Some("3"));
        assert_eq!(ResponseBody::Json(json!("ok")).as_text(), "ok");
        assert!(matches!(
            ResponseBody::Text("x".into()).decode::<GetBillsResponse>(),
            Err(GatewayError::Decode(_))
        ));
    }
}
