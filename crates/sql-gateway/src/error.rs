use actix_web::http::StatusCode;
use serde_json::json;

use crate::bindings::BindingError;
use crate::db::ExecutionError;
use crate::gate::Violation;
use crate::payload::PayloadError;

/// Which stage of the pipeline rejected the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed body, missing statement, unknown binding
    ClientInput,
    /// Statement failed gating
    PolicyViolation,
    MethodNotAllowed,
    /// The database reported a failure
    Execution,
    /// Anything else that went wrong while handling the request
    Unexpected,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::ClientInput => StatusCode::BAD_REQUEST,
            ErrorKind::PolicyViolation => StatusCode::FORBIDDEN,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Execution | ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::ClientInput => "client_input",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::Execution => "execution",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Method Not Allowed. This endpoint only accepts {0} requests.")]
    MethodNotAllowed(String),

    #[error("Request must be application/json")]
    UnsupportedMediaType,

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    /// Gating rejection with its caller-facing message.
    #[error("{message}")]
    Forbidden { violation: Violation, message: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            GatewayError::UnsupportedMediaType
            | GatewayError::Payload(_)
            | GatewayError::Binding(_) => ErrorKind::ClientInput,
            GatewayError::Forbidden { .. } => ErrorKind::PolicyViolation,
            GatewayError::Execution(_) => ErrorKind::Execution,
            GatewayError::Internal(_) => ErrorKind::Unexpected,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> serde_json::Value {
        match self.kind() {
            ErrorKind::Execution | ErrorKind::Unexpected => json!({
                "error": "Database Error",
                "details": self.to_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}
