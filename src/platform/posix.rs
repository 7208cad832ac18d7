//! Pieces shared by the macOS and Linux backends.

use std::path::{Path, PathBuf};
use std::process::Command;

use nix::unistd::{AccessFlags, access};

use crate::error::LaunchError;
use crate::platform::process::{ToolRunner, spawn_detached};
use crate::platform::target::{
    is_invocation_of, pgrep_pattern, pgrep_pids, ps_listing, resolve_program,
};

/// `pgrep -f`: any process whose command line contains `name` literally,
/// other than us and other spaceboot invocations.
pub fn pgrep_running(runner: &ToolRunner, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let pattern = pgrep_pattern(name);
    let pids = match runner.run("pgrep", ["-f", "--", pattern.as_str()]) {
        // pgrep exits 1 when nothing matched; anything above is a real error.
        Ok(out) if out.success() => pgrep_pids(&out.stdout, std::process::id()),
        Ok(out) => {
            if out.status.code() != Some(1) {
                log::warn!("pgrep -f {} failed: {}", name, out.stderr.trim());
            }
            return false;
        }
        Err(err) => {
            log::warn!("pgrep unavailable while checking {}: {}", name, err);
            return false;
        }
    };
    if pids.is_empty() {
        return false;
    }
    !without_own_invocations(runner, &pids).is_empty()
}

/// Drop PIDs running our own binary, e.g. the `spaceboot trigger <key>`
/// client that is waiting on this very lookup.
fn without_own_invocations(runner: &ToolRunner, pids: &[u32]) -> Vec<u32> {
    let own_name = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|n| n.to_string_lossy().into_owned()));
    let Some(own_name) = own_name else {
        return pids.to_vec();
    };

    let list = pids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let args = ["-ww", "-o", "pid=", "-o", "args=", "-p", list.as_str()];
    let listing = match runner.run("ps", args) {
        // ps exits 1 when some PIDs are gone; the rest are still listed.
        Ok(out) if out.success() || !out.stdout.trim().is_empty() => ps_listing(&out.stdout),
        Ok(out) => {
            log::debug!("ps listed none of {}: {}", list, out.stderr.trim());
            return pids.to_vec();
        }
        Err(err) => {
            log::warn!("ps unavailable, keeping pgrep matches: {}", err);
            return pids.to_vec();
        }
    };

    listing
        .into_iter()
        .filter(|(pid, args)| {
            let own = is_invocation_of(args, &own_name);
            if own {
                log::debug!("Ignoring pid {} (our own invocation): {}", pid, args);
            }
            pids.contains(pid) && !own
        })
        .map(|(pid, _)| pid)
        .collect()
}

/// Resolve `target` and make sure we are allowed to execute it.
pub fn executable_path(target: &str) -> Result<PathBuf, LaunchError> {
    let path = resolve_program(target).ok_or_else(|| LaunchError::NotFound(target.to_string()))?;
    ensure_executable(&path)?;
    Ok(path)
}

fn ensure_executable(path: &Path) -> Result<(), LaunchError> {
    if path.is_dir() {
        return Err(LaunchError::NotExecutable(path.display().to_string()));
    }
    access(path, AccessFlags::X_OK)
        .map_err(|_| LaunchError::NotExecutable(path.display().to_string()))
}

/// Spawn an executable file directly, detached.
pub fn spawn_program(target: &str) -> Result<(), LaunchError> {
    let path = executable_path(target)?;
    spawn_detached(Command::new(&path), target).map(|_| ())
}

/// Hand a command line to `sh -c`, detached and not awaited.
pub fn spawn_shell(command_line: &str) -> Result<(), LaunchError> {
    let mut command = Command::new("sh");
    command.args(["-c", command_line]);
    spawn_detached(command, command_line).map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    /// A sleeping `sh` whose command line ends with `args`; killed on drop.
    struct StandIn(std::process::Child);

    impl StandIn {
        fn start(args: &[&str]) -> Self {
            let child = Command::new("sh")
                .args(["-c", "sleep 5; true"])
                .args(args)
                .spawn()
                .unwrap();
            std::thread::sleep(std::time::Duration::from_millis(200));
            StandIn(child)
        }
    }

    impl Drop for StandIn {
        fn drop(&mut self) {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }

    fn runner() -> ToolRunner {
        ToolRunner::new(std::time::Duration::from_secs(5))
    }

    #[test]
    fn hotkey_client_does_not_count_as_the_target() {
        let own_exe = std::env::current_exe().unwrap();
        let own_exe = own_exe.to_str().unwrap();
        let _client = StandIn::start(&[own_exe, "trigger", "zzselfclientapp"]);
        assert!(!pgrep_running(&runner(), "zzselfclientapp"));

        let _target = StandIn::start(&["/usr/bin/zzselfclientapp"]);
        assert!(pgrep_running(&runner(), "zzselfclientapp"));
    }

    #[test]
    fn names_match_literally() {
        let _other = StandIn::start(&["zzXdotmatch"]);
        assert!(!pgrep_running(&runner(), "zz.dotmatch"));

        let _plus = StandIn::start(&["zzg++match"]);
        assert!(pgrep_running(&runner(), "zzg++match"));

        let _dash = StandIn::start(&["-zzdashmatch"]);
        assert!(pgrep_running(&runner(), "-zzdashmatch"));
    }

    #[test]
    fn missing_script_is_not_found() {
        assert_eq!(
            executable_path("/nonexistent/script.sh"),
            Err(LaunchError::NotFound("/nonexistent/script.sh".into()))
        );
    }

    #[test]
    fn script_without_exec_bit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hello.sh");
        fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();

        let target = script.to_string_lossy().to_string();
        // Holds for root too: access(2) needs at least one x bit.
        assert!(matches!(
            executable_path(&target),
            Err(LaunchError::NotExecutable(_))
        ));

        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(executable_path(&target), Ok(script));
    }

    #[test]
    fn directories_are_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().to_string_lossy().to_string();
        assert!(matches!(
            executable_path(&target),
            Err(LaunchError::NotExecutable(_))
        ));
    }

    #[test]
    fn shell_commands_are_fire_and_forget() {
        // Exit status of the command itself is never observed.
        assert_eq!(spawn_shell("exit 3"), Ok(()));
    }
}
