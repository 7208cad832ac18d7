use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Longest accepted alias key, in characters.
pub const MAX_KEY_LEN: usize = 50;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    LaunchApp,
    RunCommand,
    ExecuteScript,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::LaunchApp => "launch-app",
            ActionKind::RunCommand => "run-command",
            ActionKind::ExecuteScript => "execute-script",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launch-app" => Ok(ActionKind::LaunchApp),
            "run-command" => Ok(ActionKind::RunCommand),
            "execute-script" => Ok(ActionKind::ExecuteScript),
            other => Err(format!("unknown action kind \"{}\"", other)),
        }
    }
}

/// A persisted alias: trigger key mapped to an action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasBinding {
    pub id: i64,
    pub key: String,
    pub action_kind: ActionKind,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// `AliasBinding` before the store assigns an id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlias {
    pub key: String,
    pub action_kind: ActionKind,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl NewAlias {
    pub fn with_id(self, id: i64) -> AliasBinding {
        AliasBinding {
            id,
            key: self.key,
            action_kind: self.action_kind,
            target: self.target,
            comment: self.comment,
        }
    }
}

/// Keys compare with whitespace removed and case folded, so "c o d e" == "Code".
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Launched,
    ActivatedExisting,
    Failed,
    /// Same alias dispatched again inside the cooldown window; nothing was done.
    Debounced,
}

/// Result of one dispatch attempt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl LaunchOutcome {
    pub fn launched() -> Self {
        Self {
            outcome: Outcome::Launched,
            error_detail: None,
        }
    }

    pub fn activated() -> Self {
        Self {
            outcome: Outcome::ActivatedExisting,
            error_detail: None,
        }
    }

    pub fn debounced() -> Self {
        Self {
            outcome: Outcome::Debounced,
            error_detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Pushed to subscribers of the alias service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasEvent {
    AliasesChanged(Vec<AliasBinding>),
    DispatchFailed {
        id: i64,
        key: String,
        detail: String,
    },
}

/// Tray event-loop messages.
#[cfg(any(target_os = "macos", target_os = "windows"))]
#[derive(Clone, Debug)]
pub enum UserEvent {
    AliasesChanged(Vec<AliasBinding>),
    MenuAction(MenuAction),
    DispatchFeedback(DispatchFeedback),
    ConfigReloaded(crate::config::Config),
    ConfigReloadFailed(String),
}

#[derive(Clone, Debug)]
pub enum MenuAction {
    Dispatch { id: i64 },
    EditConfig,
    LaunchAtLogin,
    Quit,
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
#[derive(Clone, Debug)]
pub enum WorkerCommand {
    Dispatch { id: i64 },
}

#[derive(Clone, Debug)]
pub struct DispatchFeedback {
    pub message: String,
    pub severity: FeedbackSeverity,
}

impl DispatchFeedback {
    pub fn new(message: String, severity: FeedbackSeverity) -> Self {
        Self { message, severity }
    }

    pub fn info(message: String) -> Self {
        Self::new(message, FeedbackSeverity::Info)
    }

    pub fn warning(message: String) -> Self {
        Self::new(message, FeedbackSeverity::Warning)
    }

    pub fn error(message: String) -> Self {
        Self::new(message, FeedbackSeverity::Error)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackSeverity {
    Info,
    Warning,
    Error,
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub aliases: Vec<AliasBinding>,
    pub last_feedback: Option<DispatchFeedback>,
    pub config: crate::config::Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_spaces_and_case() {
        assert_eq!(normalize_key("c o d e"), "code");
        assert_eq!(normalize_key("  CoDe\t"), "code");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn action_kind_uses_persisted_tokens() {
        let json = serde_json::to_string(&ActionKind::ExecuteScript).unwrap();
        assert_eq!(json, "\"execute-script\"");
        assert_eq!("run-command".parse::<ActionKind>(), Ok(ActionKind::RunCommand));
        assert!("open-url".parse::<ActionKind>().is_err());
    }

    #[test]
    fn binding_serializes_camel_case() {
        let binding = AliasBinding {
            id: 7,
            key: "c o d e".into(),
            action_kind: ActionKind::LaunchApp,
            target: "/usr/bin/code".into(),
            comment: None,
        };
        let value = serde_json::to_value(&binding).unwrap();
        assert_eq!(value["actionKind"], "launch-app");
        assert!(value.get("comment").is_none());
    }

    #[test]
    fn failed_outcome_carries_detail() {
        let outcome = LaunchOutcome::failed("no window");
        assert!(outcome.is_failure());
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "Failed");
        assert_eq!(value["errorDetail"], "no window");
        assert!(!LaunchOutcome::launched().is_failure());
    }
}
