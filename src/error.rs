use thiserror::Error;

/// Failures raised while turning loosely typed tool parameters into
/// API-compliant requests.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid value '{value}' for {field}; expected one of: {expected}")]
    InvalidEnumValue {
        field: &'static str,
        value: String,
        expected: String,
    },
    #[error("invalid format for {field}: {message}")]
    InvalidFormat {
        field: &'static str,
        message: String,
    },
    #[error("invalid number '{value}' for {field}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("{field} out of range: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl ValidationError {
    pub(crate) fn invalid_enum(field: &'static str, value: &str, expected: &[&str]) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
            expected: expected.join(", "),
        }
    }

    pub(crate) fn format(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn out_of_range(field: &'static str, message: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("API request failed: HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request error: {0}")]
    Network(String),
    #[error("API response invalid: {0}")]
    Decode(String),
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("tool schema must be a JSON object")]
    SchemaNotObject,
    #[error("tool schema must declare type=object")]
    RootTypeMustBeObject,
    #[error("required must be an array of strings")]
    InvalidRequired,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid tool arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("dependency missing: {0}")]
    MissingDependency(&'static str),
    #[error("duplicate tool registered: {0}")]
    Duplicate(String),
    #[error("tool handler not configured: {0}")]
    Unconfigured(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
