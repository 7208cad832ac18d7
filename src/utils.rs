use std::path::{Path, PathBuf};

use crate::platform::target::resolve_program;

/// Homebrew prefixes first (GUI apps launched from Finder don't inherit the
/// shell PATH), then PATH.
#[cfg(target_os = "macos")]
const EXTRA_PATHS: &[&str] = &[
    "/opt/homebrew/bin", // Apple Silicon
    "/usr/local/bin",    // Intel Mac
];

#[cfg(not(target_os = "macos"))]
const EXTRA_PATHS: &[&str] = &[];

/// Locate an optional helper tool such as `terminal-notifier`.
pub fn find_command(name: &str) -> Option<PathBuf> {
    find_in_paths(name, EXTRA_PATHS).or_else(|| resolve_program(name))
}

fn find_in_paths(name: &str, prefix_paths: &[&str]) -> Option<PathBuf> {
    prefix_paths
        .iter()
        .map(|prefix| Path::new(prefix).join(name))
        .find(|path| path.is_file())
}

/// Open the config file in the user's editor, detached.
pub fn open_in_editor(path: &Path) -> Result<(), crate::error::LaunchError> {
    #[cfg(target_os = "macos")]
    let command = {
        let mut command = std::process::Command::new("open");
        command.arg("-t").arg(path);
        command
    };

    #[cfg(target_os = "windows")]
    let command = {
        let mut command = std::process::Command::new("notepad");
        command.arg(path);
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = {
        let mut command = std::process::Command::new("xdg-open");
        command.arg(path);
        command
    };

    crate::platform::process::spawn_detached(command, "editor").map(|_| ())
}
