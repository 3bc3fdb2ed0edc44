use serde::Serialize;
use std::fmt;

/// Gateway `ResultCode` meaning
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Success,
    StudentNotFound,
    BadRequest,
    SystemError,
    Failed,
    DebtNotFound,
    /// Unrecognised code, kept verbatim for diagnosis
    Unknown(String),
}

impl ResultKind {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "00" => Self::Success,
            "01" => Self::StudentNotFound,
            "02" => Self::BadRequest,
            "03" => Self::SystemError,
            "04" => Self::Failed,
            "05" => Self::DebtNotFound,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Slug used by the gateway documentation
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::StudentNotFound => "student_not_found",
            Self::BadRequest => "bad_request",
            Self::SystemError => "system_error",
            Self::Failed => "failed",
            Self::DebtNotFound => "not_found_debt",
            Self::Unknown(_) => "unknown",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::StudentNotFound => "Student not found",
            Self::BadRequest => "Bad request (check the checksum and required fields)",
            Self::SystemError => "Gateway system error",
            Self::Failed => "Request failed",
            Self::DebtNotFound => "No outstanding debt found",
            Self::Unknown(_) => "Unknown error",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A classified result code ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub code: String,
    pub kind: ResultKind,
    pub message: &'static str,
}

impl Classification {
    pub fn is_success(&self) -> bool {
        self.kind == ResultKind::Success
    }

    /// Banner text, e.g. `No outstanding debt found (code: 05)`
    pub fn banner(&self) -> String {
        format!("{} (code: {})", self.message, self.code)
    }
}

impl Serialize for Classification {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Classification", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("kind", self.kind.slug())?;
        state.serialize_field("message", self.message)?;
        state.end()
    }
}

/// Map a gateway `ResultCode` to its kind and human message.
pub fn classify(code: &str) -> Classification {
    let kind = ResultKind::from_code(code);
    Classification {
        code: code.trim().to_string(),
        message: kind.message(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        let cases = [
            ("00", ResultKind::Success),
            ("01", ResultKind::StudentNotFound),
            ("02", ResultKind::BadRequest),
            ("03", ResultKind::SystemError),
            ("04", ResultKind::Failed),
            ("05", ResultKind::DebtNotFound),
        ];
        for (code, kind) in cases {
            assert_eq!(classify(code).kind, kind, "code {}", code);
        }
        assert!(classify("00").is_success());
    }

    #[test]
    fn test_unknown_preserves_code() {
        let c = classify("99");
        assert_eq!(c.kind, ResultKind::Unknown("99".to_string()));
        assert_eq!(c.code, "99");
        assert_eq!(c.banner(), "Unknown error (code: 99)");
        assert!(!c.is_success());
    }

    #[test]
    fn test_banner_and_json() {
        let c = classify("05");
        assert_eq!(c.banner(), "No outstanding debt found (code: 05)");

        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["kind"], "not_found_debt");
        assert_eq!(json["code"], "05");
    }
}
