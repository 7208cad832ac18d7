//! Linux window activation using wmctrl, falling back to xdotool

use crate::error::ActivationError;
use crate::platform::process::{ToolRunner, ToolStep};
use crate::platform::target::linux_process_name;

pub fn bring_to_foreground(runner: &ToolRunner, target: &str) -> Result<(), ActivationError> {
    let name = linux_process_name(target);
    activate_with(runner, &name, &activation_steps(&name))
}

/// wmctrl first (matches on window title substring), then xdotool.
fn activation_steps(name: &str) -> Vec<ToolStep> {
    vec![
        ToolStep::new("wmctrl", "wmctrl", ["-a", name]),
        ToolStep::new(
            "xdotool",
            "xdotool",
            ["search", "--name", name, "windowactivate"],
        ),
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
            log::error!(
                "Failed to bring {} to foreground (tried wmctrl and xdotool)",
                name
            );
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

    fn runner() -> ToolRunner {
        ToolRunner::new(Duration::from_secs(5))
    }

    /// Same label as the real step, but runs a shell snippet that records the call.
    fn recording(step: &ToolStep, log: &std::path::Path, code: u8) -> ToolStep {
        let script = format!("echo {} >> '{}'; exit {}", step.label, log.display(), code);
        ToolStep::new(step.label, "sh", ["-c".to_string(), script])
    }

    #[test]
    fn wmctrl_is_tried_before_xdotool() {
        let steps = activation_steps("code");
        let programs: Vec<&str> = steps.iter().map(|s| s.program.as_str()).collect();
        assert_eq!(programs, ["wmctrl", "xdotool"]);
        assert_eq!(steps[0].args, ["-a", "code"]);
        assert_eq!(steps[1].args, ["search", "--name", "code", "windowactivate"]);
    }

    #[test]
    fn xdotool_covers_a_wmctrl_miss() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let real = activation_steps("code");
        let steps = [recording(&real[0], &log, 1), recording(&real[1], &log, 0)];

        assert_eq!(activate_with(&runner(), "code", &steps), Ok(()));
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "wmctrl\nxdotool\n"
        );
    }

    #[test]
    fn wmctrl_success_skips_xdotool() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let real = activation_steps("code");
        let steps = [recording(&real[0], &log, 0), recording(&real[1], &log, 0)];

        assert_eq!(activate_with(&runner(), "code", &steps), Ok(()));
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "wmctrl\n");
    }

    #[test]
    fn both_tools_failing_means_no_activation_method() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let real = activation_steps("code");
        let steps = [recording(&real[0], &log, 1), recording(&real[1], &log, 1)];

        assert_eq!(
            activate_with(&runner(), "code", &steps),
            Err(ActivationError::NoActivationMethodAvailable {
                process: "code".into()
            })
        );
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "wmctrl\nxdotool\n"
        );
    }

    #[test]
    fn absent_tools_mean_no_activation_method() {
        let steps = [
            ToolStep::new("wmctrl", "/nonexistent/wmctrl", ["-a", "code"]),
            ToolStep::new("xdotool", "/nonexistent/xdotool", ["search"]),
        ];
        assert!(matches!(
            activate_with(&runner(), "code", &steps),
            Err(ActivationError::NoActivationMethodAvailable { .. })
        ));
    }
}
