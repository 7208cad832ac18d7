//! Linux launching: desktop entries through gtk-launch, everything else directly

use std::process::Command;

use crate::error::LaunchError;
use crate::model::ActionKind;
use crate::platform::posix::{spawn_program, spawn_shell};
use crate::platform::process::spawn_detached;
use crate::platform::target::{is_desktop_entry, linux_process_name};

pub fn launch(kind: ActionKind, target: &str) -> Result<(), LaunchError> {
    match kind {
        ActionKind::LaunchApp if is_desktop_entry(target) => launch_desktop_entry(target),
        ActionKind::LaunchApp | ActionKind::ExecuteScript => spawn_program(target),
        ActionKind::RunCommand => spawn_shell(target),
    }
}

fn launch_desktop_entry(target: &str) -> Result<(), LaunchError> {
    // gtk-launch takes the entry id, i.e. the file name without ".desktop"
    let entry = linux_process_name(target);
    let mut command = Command::new("gtk-launch");
    command.arg(&entry);
    spawn_detached(command, "gtk-launch").map(|_| ())
}
