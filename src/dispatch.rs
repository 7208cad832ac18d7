//! Executes one alias binding against the platform backend.

use std::sync::Arc;

use crate::model::{ActionKind, AliasBinding, LaunchOutcome};
use crate::platform::Backend;

/// Stateless between calls; safe to share across threads.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn Backend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run `binding`. Every failure is folded into the returned outcome.
    ///
    /// A `LaunchApp` target that is already running is only ever activated:
    /// if activation fails the dispatch fails, a second instance is never
    /// started.
    pub fn dispatch(&self, binding: &AliasBinding) -> LaunchOutcome {
        let outcome = match binding.action_kind {
            ActionKind::LaunchApp => self.launch_or_activate(binding),
            kind => {
                log::info!(
                    "Dispatch {} ({}): {} {}",
                    binding.id,
                    binding.key,
                    kind,
                    binding.target
                );
                self.launch(kind, binding)
            }
        };

        if let Some(detail) = &outcome.error_detail {
            log::error!(
                "Dispatch {} -> {:?}: {} ({})",
                binding.id,
                outcome.outcome,
                binding.target,
                detail
            );
        } else {
            log::info!(
                "Dispatch {} -> {:?}: {}",
                binding.id,
                outcome.outcome,
                binding.target
            );
        }
        outcome
    }

    fn launch_or_activate(&self, binding: &AliasBinding) -> LaunchOutcome {
        if self.backend.is_running(&binding.target) {
            log::info!(
                "Dispatch {} ({}): {} is running, activating",
                binding.id,
                binding.key,
                binding.target
            );
            match self.backend.activate(&binding.target) {
                Ok(()) => LaunchOutcome::activated(),
                Err(e) => LaunchOutcome::failed(e.to_string()),
            }
        } else {
            log::info!(
                "Dispatch {} ({}): {} not running, launching",
                binding.id,
                binding.key,
                binding.target
            );
            self.launch(ActionKind::LaunchApp, binding)
        }
    }

    fn launch(&self, kind: ActionKind, binding: &AliasBinding) -> LaunchOutcome {
        match self.backend.launch(kind, &binding.target) {
            Ok(()) => LaunchOutcome::launched(),
            Err(e) => LaunchOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{ActivationError, LaunchError};
    use crate::model::Outcome;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Call {
        IsRunning(String),
        Activate(String),
        Launch(ActionKind, String),
    }

    /// Scripted backend that records every call it receives.
    pub(crate) struct RecordingBackend {
        pub running: bool,
        pub activate_result: Result<(), ActivationError>,
        pub launch_result: Result<(), LaunchError>,
        pub calls: Mutex<Vec<Call>>,
    }

    impl RecordingBackend {
        pub fn new(running: bool) -> Self {
            Self {
                running,
                activate_result: Ok(()),
                launch_result: Ok(()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }

        pub fn launches(&self) -> usize {
            self.count(|c| matches!(c, Call::Launch(..)))
        }

        pub fn activations(&self) -> usize {
            self.count(|c| matches!(c, Call::Activate(_)))
        }
    }

    impl Backend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn is_running(&self, target: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .push(Call::IsRunning(target.to_string()));
            self.running
        }

        fn activate(&self, target: &str) -> Result<(), ActivationError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Activate(target.to_string()));
            self.activate_result.clone()
        }

        fn launch(&self, kind: ActionKind, target: &str) -> Result<(), LaunchError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Launch(kind, target.to_string()));
            self.launch_result.clone()
        }
    }

    fn binding(kind: ActionKind, target: &str) -> AliasBinding {
        AliasBinding {
            id: 1,
            key: "c o d e".into(),
            action_kind: kind,
            target: target.into(),
            comment: None,
        }
    }

    fn run(backend: RecordingBackend, binding: &AliasBinding) -> (LaunchOutcome, Arc<RecordingBackend>) {
        let backend = Arc::new(backend);
        let outcome = Dispatcher::new(backend.clone()).dispatch(binding);
        (outcome, backend)
    }

    #[test]
    fn not_running_app_is_launched_once() {
        let (outcome, backend) = run(
            RecordingBackend::new(false),
            &binding(ActionKind::LaunchApp, "/usr/bin/code"),
        );
        assert_eq!(outcome, LaunchOutcome::launched());
        assert_eq!(
            backend.calls(),
            vec![
                Call::IsRunning("/usr/bin/code".into()),
                Call::Launch(ActionKind::LaunchApp, "/usr/bin/code".into()),
            ]
        );
    }

    #[test]
    fn running_app_is_activated_not_relaunched() {
        let (outcome, backend) = run(
            RecordingBackend::new(true),
            &binding(ActionKind::LaunchApp, "/usr/bin/code"),
        );
        assert_eq!(outcome.outcome, Outcome::ActivatedExisting);
        assert_eq!(backend.activations(), 1);
        assert_eq!(backend.launches(), 0);
    }

    #[test]
    fn command_is_launched_without_process_lookup() {
        let (outcome, backend) = run(
            RecordingBackend::new(true),
            &binding(ActionKind::RunCommand, "echo hi"),
        );
        assert_eq!(outcome, LaunchOutcome::launched());
        assert_eq!(
            backend.calls(),
            vec![Call::Launch(ActionKind::RunCommand, "echo hi".into())]
        );
    }

    #[test]
    fn failed_activation_never_falls_back_to_launch() {
        let mut backend = RecordingBackend::new(true);
        backend.activate_result = Err(ActivationError::NoActivationMethodAvailable {
            process: "code".into(),
        });
        let (outcome, backend) = run(backend, &binding(ActionKind::LaunchApp, "/usr/bin/code"));

        assert!(outcome.is_failure());
        assert_eq!(
            outcome.error_detail.as_deref(),
            Some("no activation method available for code")
        );
        assert_eq!(backend.activations(), 1);
        assert_eq!(backend.launches(), 0);
    }

    #[test]
    fn launch_error_becomes_failed_outcome() {
        let mut backend = RecordingBackend::new(false);
        backend.launch_result = Err(LaunchError::NotFound("/opt/missing".into()));
        let (outcome, _) = run(backend, &binding(ActionKind::ExecuteScript, "/opt/missing"));
        assert_eq!(outcome, LaunchOutcome::failed("target not found: /opt/missing"));
    }

    #[test]
    fn dispatcher_stays_usable_after_failure() {
        let mut failing = RecordingBackend::new(false);
        failing.launch_result = Err(LaunchError::SpawnFailed("boom".into()));
        let backend = Arc::new(failing);
        let dispatcher = Dispatcher::new(backend.clone());
        let b = binding(ActionKind::RunCommand, "false");

        assert!(dispatcher.dispatch(&b).is_failure());
        assert!(dispatcher.dispatch(&b).is_failure());
        assert_eq!(backend.launches(), 2);
    }
}
