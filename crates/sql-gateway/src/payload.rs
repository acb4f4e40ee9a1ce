use serde::Deserialize;
use serde_json::Value;

/// A parsed query request body.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPayload {
    /// Statement text exactly as sent by the client.
    pub statement: String,
    /// Ordered bind values, passed through untouched.
    pub parameters: Vec<Value>,
    pub target_binding: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Invalid request: body must be a JSON object.")]
    NotAnObject,

    #[error("Invalid request: \"statement\" property must be a non-empty string.")]
    MissingStatement,

    #[error("Invalid request: \"parameters\" property must be an array.")]
    InvalidParameters,

    #[error("Invalid request: \"targetBinding\" property must be a string.")]
    InvalidBinding,

    #[error("Request body exceeds the {0} byte limit")]
    TooLarge(usize),

    #[error("Failed to read request body: {0}")]
    Unreadable(String),
}

/// Wire shape before validation. `sql`/`query` and `params` are accepted
/// for clients written against older versions of the endpoint.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default, alias = "sql", alias = "query")]
    statement: Option<Value>,
    #[serde(default, alias = "params")]
    parameters: Option<Value>,
    #[serde(default)]
    target_binding: Option<Value>,
}

impl QueryPayload {
    pub fn from_slice(body: &[u8]) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;
        if !value.is_object() {
            return Err(PayloadError::NotAnObject);
        }
        let raw: RawPayload =
            serde_json::from_value(value).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

        let statement = match raw.statement {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(PayloadError::MissingStatement),
        };

        let parameters = match raw.parameters {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(PayloadError::InvalidParameters),
        };

        let target_binding = match raw.target_binding {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name),
            Some(_) => return Err(PayloadError::InvalidBinding),
        };

        Ok(Self {
            statement,
            parameters,
            target_binding,
        })
    }
}
