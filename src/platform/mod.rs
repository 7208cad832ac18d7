//! Platform abstraction layer
//!
//! Each OS provides one `Backend` covering:
//! - Process lookup (is the target already running?)
//! - Foreground activation of a running instance
//! - Detached launching of apps, commands and scripts
//!
//! plus desktop notifications and launch-at-login, re-exported through
//! `current`. The backend is chosen once at startup.

use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::error::{ActivationError, LaunchError};
use crate::model::ActionKind;

pub mod process;
pub mod target;

#[cfg(unix)]
pub mod posix;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

// Re-export the current platform's modules
#[cfg(target_os = "linux")]
pub use linux as current;

#[cfg(target_os = "macos")]
pub use macos as current;

#[cfg(target_os = "windows")]
pub use windows as current;

/// OS capabilities the dispatcher needs.
pub trait Backend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether a process for `target` is running. Tool failures read as `false`.
    fn is_running(&self, target: &str) -> bool;

    /// Bring the running instance of `target` to the foreground. Must never
    /// start a new process.
    fn activate(&self, target: &str) -> Result<(), ActivationError>;

    /// Start `target` detached according to `kind`.
    fn launch(&self, kind: ActionKind, target: &str) -> Result<(), LaunchError>;
}

/// Backend for the host OS.
pub fn current_backend(config: &DispatchConfig) -> Arc<dyn Backend> {
    let runner = process::ToolRunner::new(config.tool_timeout());
    Arc::new(current::PlatformBackend::new(runner))
}
