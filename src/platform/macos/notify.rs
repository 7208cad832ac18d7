//! macOS notifications using terminal-notifier

use std::process::Command;

use crate::platform::process::spawn_detached;
use crate::utils::find_command;

const BUNDLE_ID: &str = "com.spaceboot.app";

pub fn notify_dispatch_failure(key: &str, detail: &str) {
    let title = format!("Alias \"{}\" failed", key);
    // terminal-notifier only; an osascript notification would mean splicing
    // target names into AppleScript.
    let Some(cmd) = find_command("terminal-notifier") else {
        log::debug!("terminal-notifier not installed, skipping notification");
        return;
    };

    let mut command = Command::new(cmd);
    command.args([
        "-title", &title, "-message", detail, "-sender", BUNDLE_ID, "-sound", "Basso",
    ]);
    if let Err(e) = spawn_detached(command, "terminal-notifier") {
        log::debug!("terminal-notifier failed: {}", e);
    }
}
