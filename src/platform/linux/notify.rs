//! Linux desktop notifications using notify-send

use std::process::Command;

use crate::platform::process::spawn_detached;

const APP_NAME: &str = "Spaceboot";

pub fn notify_dispatch_failure(key: &str, detail: &str) {
    let title = format!("Alias \"{}\" failed", key);
    let mut command = Command::new("notify-send");
    command.args(["--app-name", APP_NAME, "--urgency", "normal", &title, detail]);
    if let Err(e) = spawn_detached(command, "notify-send") {
        log::debug!("notify-send unavailable: {}", e);
    }
}
