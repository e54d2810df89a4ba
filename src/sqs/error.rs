use axum::http::StatusCode;

/// The error taxonomy from the wire contract. Deliberately small:
/// this core does not attempt byte-for-byte parity with a real SQS service's
/// much larger error catalog, only the kinds clients actually branch on.
#[derive(Debug, Clone)]
pub enum SqsError {
    MissingParameter(String),
    InvalidParameterValue(String),
    InvalidAction(String),
    NonExistentQueue(String),
    ReceiptHandleIsInvalid(String),
    InternalError(String),
}

impl SqsError {
    pub fn code(&self) -> &'static str {
        match self {
            SqsError::MissingParameter(_) => "MissingParameter",
            SqsError::InvalidParameterValue(_) => "InvalidParameterValue",
            SqsError::InvalidAction(_) => "InvalidAction",
            SqsError::NonExistentQueue(_) => "NonExistentQueue",
            SqsError::ReceiptHandleIsInvalid(_) => "ReceiptHandleIsInvalid",
            SqsError::InternalError(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SqsError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SqsError::MissingParameter(m)
            | SqsError::InvalidParameterValue(m)
            | SqsError::InvalidAction(m)
            | SqsError::NonExistentQueue(m)
            | SqsError::ReceiptHandleIsInvalid(m)
            | SqsError::InternalError(m) => m,
        }
    }
}

impl std::fmt::Display for SqsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for SqsError {}
