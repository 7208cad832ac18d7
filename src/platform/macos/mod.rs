//! macOS backend: pgrep, AppleScript activation, `open -a` for bundles.

pub mod activate;
pub mod locate;
pub mod login;
pub mod notify;
pub mod spawn;

use crate::error::{ActivationError, LaunchError};
use crate::model::ActionKind;
use crate::platform::Backend;
use crate::platform::process::ToolRunner;

pub struct PlatformBackend {
    runner: ToolRunner,
}

impl PlatformBackend {
    pub fn new(runner: ToolRunner) -> Self {
        Self { runner }
    }
}

impl Backend for PlatformBackend {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn is_running(&self, target: &str) -> bool {
        locate::is_running(&self.runner, target)
    }

    fn activate(&self, target: &str) -> Result<(), ActivationError> {
        activate::bring_to_foreground(&self.runner, target)
    }

    fn launch(&self, kind: ActionKind, target: &str) -> Result<(), LaunchError> {
        spawn::launch(kind, target)
    }
}
