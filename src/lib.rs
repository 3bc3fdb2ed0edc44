pub mod checksum;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod local_proxy;
pub mod request;
pub mod result_code;
pub mod state;
pub mod template;
pub mod transport;
pub mod types;

pub use checksum::{Timestamp, compute_checksum};
pub use client::{ClientConfig, GatewayResponse, PaymentClient, ResponseBody};
pub use config::GatewayConfig;
pub use credential::Credential;
pub use error::{GatewayError, ValidationError};
pub use request::{Operation, PreparedRequest, RequestOptions, build_request};
pub use result_code::{Classification, ResultKind, classify};
pub use template::{ApiTemplate, TemplateCall, TemplateRegistry};
pub use transport::{TransportErrorKind, classify_transport_failure};
pub use types::{BillInfoResponse, BillRecord, GetBillsResponse, PayResult};
