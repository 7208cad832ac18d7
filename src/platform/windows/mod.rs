//! Windows backend: tasklist, user32 focus workaround, detached CreateProcess.

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
        "windows"
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

/// Encode a PowerShell script for `-EncodedCommand` (base64 of UTF-16LE),
/// which sidesteps every quoting rule between us and powershell.exe.
pub(crate) fn encode_powershell(script: &str) -> String {
    use base64::Engine;
    let utf16: Vec<u8> = script.encode_utf16().flat_map(u16::to_le_bytes).collect();
    base64::engine::general_purpose::STANDARD.encode(utf16)
}

pub(crate) const POWERSHELL_ARGS: [&str; 5] = [
    "-NoProfile",
    "-NonInteractive",
    "-ExecutionPolicy",
    "Bypass",
    "-EncodedCommand",
];

#[cfg(test)]
mod tests {
    use super::encode_powershell;

    #[test]
    fn encodes_utf16le_base64() {
        // "a" -> [0x61, 0x00]
        assert_eq!(encode_powershell("a"), "YQA=");
    }
}
