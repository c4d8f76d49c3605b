use std::fmt;

/// Error types that can occur while running the playground.
#[derive(Debug)]
pub enum LLMError {
    /// HTTP request/response errors
    HttpError(String),
    /// Authentication and authorization errors
    AuthError(String),
    /// Invalid request parameters or settings
    InvalidRequest(String),
    /// The provider answered with something we could not use
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// JSON serialization/deserialization errors
    JsonError(String),
    /// Configuration file errors
    ConfigError(String),
    /// Filesystem errors (exports, config files)
    IoError(String),
    /// Generic error
    Generic(String),
}

impl fmt::Display for LLMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMError::HttpError(e) => write!(f, "HTTP Error: {e}"),
            LLMError::AuthError(e) => write!(f, "Auth Error: {e}"),
            LLMError::InvalidRequest(e) => write!(f, "Invalid Request: {e}"),
            LLMError::ResponseFormatError {
                message,
                raw_response,
            } => write!(f, "Response Format Error: {message}. Raw response: {raw_response}"),
            LLMError::JsonError(e) => write!(f, "JSON Parse Error: {e}"),
            LLMError::ConfigError(e) => write!(f, "Config Error: {e}"),
            LLMError::IoError(e) => write!(f, "IO Error: {e}"),
            LLMError::Generic(e) => write!(f, "Generic Error: {e}"),
        }
    }
}

impl std::error::Error for LLMError {}

/// Converts reqwest HTTP errors into LLMErrors
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<serde_yaml::Error> for LLMError {
    fn from(err: serde_yaml::Error) -> Self {
        LLMError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for LLMError {
    fn from(err: std::io::Error) -> Self {
        LLMError::IoError(err.to_string())
    }
}
