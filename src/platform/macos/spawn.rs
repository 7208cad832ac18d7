//! macOS launching: bundles through `open -a`, everything else directly

use std::path::Path;
use std::process::Command;

use crate::error::LaunchError;
use crate::model::ActionKind;
use crate::platform::posix::{spawn_program, spawn_shell};
use crate::platform::process::spawn_detached;
use crate::platform::target::is_app_bundle;

pub fn launch(kind: ActionKind, target: &str) -> Result<(), LaunchError> {
    match kind {
        ActionKind::LaunchApp if is_app_bundle(target) => open_bundle(target),
        ActionKind::LaunchApp | ActionKind::ExecuteScript => spawn_program(target),
        ActionKind::RunCommand => spawn_shell(target),
    }
}

fn open_bundle(target: &str) -> Result<(), LaunchError> {
    // `open -a` also accepts a bare bundle name, so only check paths.
    if target.contains('/') && !Path::new(target).exists() {
        return Err(LaunchError::NotFound(target.to_string()));
    }
    let mut command = Command::new("open");
    command.args(["-a", target]);
    spawn_detached(command, "open").map(|_| ())
}
