//! Typed errors for alias storage, activation, launching and the RPC boundary.
//!
//! Locator failures never show up here: they degrade to "not running"
//! inside the backends. Activation and launch errors stop at the
//! dispatcher, which turns them into a failed `LaunchOutcome`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::MAX_KEY_LEN;

/// Alias field constraints violated at add/update time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("alias key must not be empty")]
    EmptyKey,

    #[error("alias key is longer than {max} characters", max = MAX_KEY_LEN)]
    KeyTooLong,

    #[error("alias target must not be empty")]
    EmptyTarget,

    #[error("alias key conflicts with existing alias \"{0}\"")]
    DuplicateKey(String),

    #[error("alias prefix must not be empty")]
    EmptyPrefix,

    #[error("invalid alias id {0}")]
    InvalidId(i64),

    #[error("activation delay must be between {min} and {max} ms, got {value}")]
    DelayOutOfRange { value: u64, min: u64, max: u64 },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("alias {0} not found")]
    NotFound(i64),

    #[error("no alias matches \"{0}\"")]
    KeyNotFound(String),

    #[error("alias database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt alias row {id}: unknown action type \"{action_type}\"")]
    CorruptRow { id: i64, action_type: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    /// Neither activation tool is present, or neither found a matching window.
    #[error("no activation method available for {process}")]
    NoActivationMethodAvailable { process: String },

    /// The process is running but exposes no usable top-level window.
    #[error("no window found for {process}")]
    WindowNotFound { process: String },

    #[error("platform call failed: {0}")]
    PlatformCallFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("target not found: {0}")]
    NotFound(String),

    #[error("target is not executable: {0}")]
    NotExecutable(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),
}

impl LaunchError {
    /// Classify an io error from the spawn primitive.
    pub fn from_spawn(target: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => LaunchError::NotFound(target.to_string()),
            std::io::ErrorKind::PermissionDenied => LaunchError::NotExecutable(target.to_string()),
            _ => LaunchError::SpawnFailed(format!("{}: {}", target, err)),
        }
    }
}

/// An OS helper tool (pgrep, osascript, wmctrl, ...) that did not produce output.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Usually: not installed.
    #[error("failed to start: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("failed while waiting: {0}")]
    Wait(#[source] std::io::Error),
}

/// Error category carried in RPC error responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RpcErrorKind {
    Validation,
    NotFound,
    Storage,
    BadRequest,
    Platform,
}

/// Error half of an RPC response, also what `rpc::client` hands back.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct RpcError {
    pub kind: RpcErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: RpcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorKind::BadRequest, message)
    }
}

impl From<ValidationError> for RpcError {
    fn from(err: ValidationError) -> Self {
        Self::new(RpcErrorKind::Validation, err.to_string())
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Validation(_) => RpcErrorKind::Validation,
            StoreError::NotFound(_) | StoreError::KeyNotFound(_) => RpcErrorKind::NotFound,
            StoreError::Sqlite(_) | StoreError::CorruptRow { .. } => RpcErrorKind::Storage,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_errors_are_classified_by_kind() {
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(
            LaunchError::from_spawn("/opt/app", missing),
            LaunchError::NotFound("/opt/app".into())
        );

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(
            LaunchError::from_spawn("/opt/app", denied),
            LaunchError::NotExecutable("/opt/app".into())
        );

        let other = std::io::Error::other("boom");
        assert!(matches!(
            LaunchError::from_spawn("/opt/app", other),
            LaunchError::SpawnFailed(detail) if detail.contains("boom")
        ));
    }

    #[test]
    fn store_errors_map_to_rpc_kinds() {
        let err = RpcError::from(StoreError::NotFound(3));
        assert_eq!(err.kind, RpcErrorKind::NotFound);
        assert_eq!(err.message, "alias 3 not found");

        let err = RpcError::from(StoreError::from(ValidationError::EmptyKey));
        assert_eq!(err.kind, RpcErrorKind::Validation);

        let json = serde_json::to_value(RpcError::bad_request("nope")).unwrap();
        assert_eq!(json["kind"], "badRequest");
    }

    #[test]
    fn tool_errors_keep_their_io_source() {
        use std::error::Error as _;

        let err = ToolError::Spawn(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("failed to start: "));
        assert!(err.source().is_some());

        let err = ToolError::TimedOut(std::time::Duration::from_secs(5));
        assert_eq!(err.to_string(), "timed out after 5s");
        assert!(err.source().is_none());
    }

    #[test]
    fn validation_messages_are_readable() {
        assert_eq!(
            ValidationError::DuplicateKey("code".into()).to_string(),
            "alias key conflicts with existing alias \"code\""
        );
        assert_eq!(
            ValidationError::KeyTooLong.to_string(),
            "alias key is longer than 50 characters"
        );
    }
}
