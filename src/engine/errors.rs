use std::time::Duration;

/// Failure reaching the external model.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model endpoint answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("api key is missing, set the {0} environment variable")]
    MissingApiKey(String),
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("classifier unavailable: {0}")]
    Transport(#[from] TransportError),

    #[error("could not read {expected} from classifier reply {raw:?}")]
    Parse { expected: &'static str, raw: String },

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Coarse error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Parse,
    Timeout,
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn parse(expected: &'static str, raw: impl Into<String>) -> Self {
        Self::Parse {
            expected,
            raw: raw.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::Request(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Rejects source text that is empty after trimming.
pub fn require_text<'a>(field: &str, text: &'a str) -> EngineResult<&'a str> {
    if text.trim().is_empty() {
        return Err(EngineError::validation(format!("{field} must not be empty")));
    }
    Ok(text)
}
