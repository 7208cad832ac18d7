//! Windows launching: executables directly, documents and shortcuts through
//! the shell's `start`, commands through `cmd /C`.

use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::Command;

use crate::error::LaunchError;
use crate::model::ActionKind;
use crate::platform::process::spawn_detached;
use crate::platform::target::{basename, is_windows_executable, resolve_program};

pub fn launch(kind: ActionKind, target: &str) -> Result<(), LaunchError> {
    match kind {
        ActionKind::LaunchApp | ActionKind::ExecuteScript => launch_file(target),
        ActionKind::RunCommand => run_command(target),
    }
}

fn launch_file(target: &str) -> Result<(), LaunchError> {
    // Anything other than an .exe (or a bare program name) goes to the shell
    // so file associations apply: .lnk, .bat, .ps1, documents.
    let base = basename(target);
    let direct = is_windows_executable(base) || !base.contains('.');
    if direct {
        let path = resolve_program(target).ok_or_else(|| LaunchError::NotFound(target.into()))?;
        return spawn_detached(Command::new(&path), target).map(|_| ());
    }

    if !Path::new(target).exists() {
        return Err(LaunchError::NotFound(target.into()));
    }
    // `start` treats the first quoted argument as the window title, hence "".
    let mut command = Command::new("cmd");
    command.raw_arg(format!("/C start \"\" \"{}\"", target));
    spawn_detached(command, target).map(|_| ())
}

fn run_command(command_line: &str) -> Result<(), LaunchError> {
    let mut command = Command::new("cmd");
    command.raw_arg(format!("/C {}", command_line));
    spawn_detached(command, command_line).map(|_| ())
}
