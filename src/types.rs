use serde::{Deserialize, Serialize};

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Auth,
    SessionExpired,
    Storage,
    Config,
    NotRetriable,
}

/// Serializable error so command results cross the bridge as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SbError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub at: i64, // epoch ms
}

pub type SbResult<T> = Result<T, SbError>;

impl SbError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> SbError {
        SbError {
            kind,
            message: message.into(),
            context: None,
            at: now_ms(),
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> SbError {
        self.context = Some(context);
        self
    }
}

impl std::fmt::Display for SbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for SbError {}

pub fn err_auth(msg: impl Into<String>) -> SbError {
    SbError::new(ErrorKind::Auth, msg)
}

pub fn err_storage(msg: impl Into<String>) -> SbError {
    SbError::new(ErrorKind::Storage, msg)
}

pub fn err_config(msg: impl Into<String>) -> SbError {
    SbError::new(ErrorKind::Config, msg)
}

pub fn err_not_retriable(msg: impl Into<String>) -> SbError {
    SbError::new(ErrorKind::NotRetriable, msg)
}

/// The signed-in identity as handed back by the identity provider.
/// The bootstrap hook only ever reads `email` from it, for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}
