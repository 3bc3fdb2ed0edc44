//! Front-end application state.
//!
//! The form emits [`Action`]s and [`AppState::apply`] is the only mutator.
//! Each started request gets a sequence number, but completions are applied
//! in arrival order: if the user fires the same action twice, whichever
//! response resolves last is what ends up displayed.

use std::collections::HashMap;

use crate::request::{DEFAULT_BASE_URL, GET_BILLS_ENDPOINT};
use crate::types::{BillInfoResponse, BillRecord, GetBillsResponse, PayResult};

/// Credentials of the gateway's test channel
pub const TEST_CHANNEL_CODE: &str = "DLC";
pub const TEST_SECRET_KEY: &str = "DLC@!2345";
pub const TEST_STUDENT_ID: &str = "030740240067";
const QUICK_ID: &str = "28623f65-426a-41e8-ad29-cdfee1ddb9f5";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormData {
    pub domain: String,
    pub endpoint: String,
    pub channel_code: String,
    pub secret_key: String,
    pub bill_id: String,
    pub student_id: String,
}

impl Default for FormData {
    fn default() -> Self {
        Self {
            domain: DEFAULT_BASE_URL.to_string(),
            endpoint: GET_BILLS_ENDPOINT.to_string(),
            channel_code: TEST_CHANNEL_CODE.to_string(),
            secret_key: TEST_SECRET_KEY.to_string(),
            bill_id: String::new(),
            student_id: TEST_STUDENT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Domain,
    Endpoint,
    ChannelCode,
    SecretKey,
    BillId,
    StudentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Standard,
    Mock,
    ApiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    GetBill,
    GetBills,
    PayBill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    Error(String),
    Success(String),
}

#[derive(Debug, Clone)]
pub enum Action {
    SetField(FormField, String),
    SetTab(Tab),
    ShowBillPreview(bool),
    ClearMessages,
    LoadTestData,
    LoadQuickData,
    Reset,
    RequestStarted(ActionKind),
    BillReceived { seq: u64, response: BillInfoResponse },
    BillsReceived { seq: u64, response: GetBillsResponse },
    PaymentCompleted { seq: u64, result: PayResult },
    RequestFailed {
        kind: ActionKind,
        seq: u64,
        message: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub form: FormData,
    pub banner: Option<Banner>,
    pub tab: Tab,
    pub show_bill_preview: bool,
    pub bill: Option<BillRecord>,
    pub bills: Vec<BillRecord>,
    /// Latest sequence number started per action
    in_flight: HashMap<ActionKind, u64>,
    last_seq: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number handed out by the most recent `RequestStarted`.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// The UI disables an action's control while this is true.
    pub fn is_busy(&self, kind: ActionKind) -> bool {
        self.in_flight.contains_key(&kind)
    }

    fn finish(&mut self, kind: ActionKind, seq: u64) {
        if self.in_flight.get(&kind) == Some(&seq) {
            self.in_flight.remove(&kind);
        }
    }

    pub fn apply(mut self, action: Action) -> Self {
        match action {
            Action::SetField(field, value) => {
                let slot = match field {
                    FormField::Domain => &mut self.form.domain,
                    FormField::Endpoint => &mut self.form.endpoint,
                    FormField::ChannelCode => &mut self.form.channel_code,
                    FormField::SecretKey => &mut self.form.secret_key,
                    FormField::BillId => &mut self.form.bill_id,
                    FormField::StudentId => &mut self.form.student_id,
                };
                *slot = value;
            }
            Action::SetTab(tab) => self.tab = tab,
            Action::ShowBillPreview(show) => self.show_bill_preview = show,
            Action::ClearMessages => self.banner = None,
            Action::LoadTestData => {
                self.form.channel_code = TEST_CHANNEL_CODE.to_string();
                self.form.secret_key = TEST_SECRET_KEY.to_string();
                self.form.student_id = TEST_STUDENT_ID.to_string();
                self.banner = None;
            }
            Action::LoadQuickData => {
                self.form.channel_code = TEST_CHANNEL_CODE.to_string();
                self.form.secret_key = TEST_SECRET_KEY.to_string();
                self.form.bill_id = QUICK_ID.to_string();
                self.form.student_id = QUICK_ID.to_string();
                self.banner = None;
            }
            Action::Reset => return Self::default(),
            Action::RequestStarted(kind) => {
                self.last_seq += 1;
                self.in_flight.insert(kind, self.last_seq);
                self.banner = None;
            }
            Action::BillReceived { seq, response } => {
                self.finish(ActionKind::GetBill, seq);
                let classification = response.classification();
                if classification.is_success() {
                    self.bill = response.bill();
                    self.banner = Some(Banner::Success("Bill information loaded".to_string()));
                } else {
                    self.bill = None;
                    self.banner = Some(Banner::Error(classification.banner()));
                }
            }
            Action::BillsReceived { seq, response } => {
                self.finish(ActionKind::GetBills, seq);
                if let Some(failure) = response.failure() {
                    self.bills.clear();
                    self.banner = Some(Banner::Error(failure.banner()));
                } else {
                    self.bills = response.records();
                    self.banner = Some(Banner::Success(format!(
                        "Found {} bill(s)",
                        self.bills.len()
                    )));
                }
            }
            Action::PaymentCompleted { seq, result } => {
                self.finish(ActionKind::PayBill, seq);
                self.banner = Some(if result.is_success() {
                    Banner::Success("Payment successful".to_string())
                } else {
                    Banner::Error(format!("Payment failed: {}", result.body))
                });
            }
            Action::RequestFailed { kind, seq, message } => {
                self.finish(kind, seq);
                self.banner = Some(Banner::Error(message));
            }
        }
        self
    }
}
