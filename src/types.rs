use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::result_code::{self, Classification};

/// JSON object carried in request bodies and query strings.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// HTTP method of a gateway call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// POST, PUT and PATCH carry a JSON body; GET and DELETE send query parameters.
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    pub fn parse(method: &str) -> Option<Self> {
        match method.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Response of `/ehub/payment/pay` (single bill lookup)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BillInfoResponse {
    #[serde(rename = "ResultCode", default, deserialize_with = "string_or_number")]
    pub result_code: String,
    #[serde(rename = "Data", default)]
    pub data: Option<BillInfoData>,
}

impl BillInfoResponse {
    pub fn classification(&self) -> Classification {
        result_code::classify(&self.result_code)
    }

    pub fn is_success(&self) -> bool {
        self.classification().is_success()
    }

    /// The bill as a flat record, if the gateway returned one.
    pub fn bill(&self) -> Option<BillRecord> {
        self.data.as_ref().map(BillRecord::from)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BillInfoData {
    #[serde(default, deserialize_with = "string_or_number")]
    pub student_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub student_id: String,
    pub bills: BillDetails,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BillDetails {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub debt_amount: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub create_date: String,
}

/// Response of `/ehub/payment/getbills`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetBillsResponse {
    /// Only present on failures; a successful listing carries no code
    #[serde(
        rename = "ResultCode",
        default,
        deserialize_with = "optional_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub result_code: Option<String>,
    #[serde(default)]
    pub bills: Vec<BillSummary>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub student_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub total_amount: String,
}

impl GetBillsResponse {
    pub fn classification(&self) -> Option<Classification> {
        self.result_code.as_deref().map(result_code::classify)
    }

    /// The classified code when the gateway reported something other than `00`.
    pub fn failure(&self) -> Option<Classification> {
        self.classification().filter(|c| !c.is_success())
    }

    pub fn records(&self) -> Vec<BillRecord> {
        self.bills.iter().map(BillRecord::from).collect()
    }
}

/// Bill entry in a getbills listing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    #[serde(default, deserialize_with = "string_or_number")]
    pub bill_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub description: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub create_date: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub customer_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub customer_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub check_sum: String,
}

/// Read-only bill as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillRecord {
    pub id: String,
    pub description: String,
    pub debt_amount: String,
    pub create_date: String,
    pub student_id: String,
    pub student_name: String,
}

impl From<&BillInfoData> for BillRecord {
    fn from(data: &BillInfoData) -> Self {
        Self {
            id: data.bills.id.clone(),
            description: data.bills.description.clone(),
            debt_amount: data.bills.debt_amount.clone(),
            create_date: data.bills.create_date.clone(),
            student_id: data.student_id.clone(),
            student_name: data.student_name.clone(),
        }
    }
}

impl From<&BillSummary> for BillRecord {
    fn from(bill: &BillSummary) -> Self {
        Self {
            id: bill.bill_id.clone(),
            description: bill.description.clone(),
            debt_amount: bill.amount.clone(),
            create_date: bill.create_date.clone(),
            student_id: bill.customer_id.clone(),
            student_name: bill.customer_name.clone(),
        }
    }
}

/// Outcome of the pay/settle callback. The gateway answers with plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayResult {
    pub status: u16,
    pub body: String,
}

impl PayResult {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// The gateway is loose about types: ids and amounts arrive as strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = string_or_number(deserializer)?;
    Ok(Some(value).filter(|v| !v.trim().is_empty()))
}
