//! macOS window activation using AppleScript

use crate::error::ActivationError;
use crate::platform::process::{ToolRunner, ToolStep};
use crate::platform::target::{applescript_quote, macos_process_name};

pub fn bring_to_foreground(runner: &ToolRunner, target: &str) -> Result<(), ActivationError> {
    let name = macos_process_name(target);
    activate_with(runner, &name, &activation_steps(&name))
}

/// `tell application .. to activate`, then System Events for apps that
/// don't answer the activate event.
fn activation_steps(name: &str) -> Vec<ToolStep> {
    // Names are quoted: process names are user-controlled and could carry AppleScript.
    let quoted = applescript_quote(name);
    let activate = format!("tell application {} to activate", quoted);
    let frontmost = format!(
        "tell application \"System Events\" to set frontmost of (first process whose name is {}) to true",
        quoted
    );
    vec![
        ToolStep::new("osascript", "osascript", ["-e".to_string(), activate]),
        ToolStep::new("System Events", "osascript", ["-e".to_string(), frontmost]),
    ]
}

fn activate_with(
    runner: &ToolRunner,
    name: &str,
    steps: &[ToolStep],
) -> Result<(), ActivationError> {
    match runner.first_success(steps) {
        Some(label) => {
            log::info!("Brought to foreground via {}: {}", label, name);
            Ok(())
        }
        None => {
            log::error!("Failed to bring {} to foreground", name);
            Err(ActivationError::NoActivationMethodAvailable {
                process: name.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn recording(step: &ToolStep, log: &std::path::Path, code: u8) -> ToolStep {
        let script = format!("echo {} >> '{}'; exit {}", step.label, log.display(), code);
        ToolStep::new(step.label, "sh", ["-c".to_string(), script])
    }

    #[test]
    fn activate_event_comes_before_system_events() {
        let steps = activation_steps("Visual Studio Code");
        assert_eq!(steps[0].args[1], "tell application \"Visual Studio Code\" to activate");
        assert!(steps[1].args[1].starts_with("tell application \"System Events\""));
        assert!(steps[1].args[1].contains("whose name is \"Visual Studio Code\""));
    }

    #[test]
    fn quotes_in_names_stay_inside_the_string() {
        let steps = activation_steps("a\" to quit");
        assert!(steps[0].args[1].contains("\"a\\\" to quit\""));
    }

    #[test]
    fn falls_back_then_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let runner = ToolRunner::new(Duration::from_secs(5));
        let real = activation_steps("Code");

        let steps = [recording(&real[0], &log, 1), recording(&real[1], &log, 0)];
        assert_eq!(activate_with(&runner, "Code", &steps), Ok(()));

        let steps = [recording(&real[0], &log, 1), recording(&real[1], &log, 1)];
        assert_eq!(
            activate_with(&runner, "Code", &steps),
            Err(ActivationError::NoActivationMethodAvailable {
                process: "Code".into()
            })
        );
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "osascript\nSystem Events\nosascript\nSystem Events\n"
        );
    }
}
