//! External tool invocation and detached spawning shared by all backends.

use std::ffi::OsStr;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{LaunchError, ToolError};

const POLL_STEP: Duration = Duration::from_millis(25);

/// Build a `Command` that never flashes a console window on Windows.
pub fn hidden_command<S: AsRef<OsStr>>(program: S) -> Command {
    #[allow(unused_mut)]
    let mut command = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs short-lived OS tools with a hard deadline. A hung tool is killed
/// instead of stalling the dispatch that called it.
#[derive(Clone, Copy, Debug)]
pub struct ToolRunner {
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn run<I, S>(&self, program: &str, args: I) -> Result<ToolOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = hidden_command(program);
        command.args(args);
        self.run_command(command)
    }

    pub fn run_command(&self, mut command: Command) -> Result<ToolOutput, ToolError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ToolError::Spawn)?;

        // Drain pipes on their own threads so a chatty tool can't block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Wait(err));
                }
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("{:?} timed out after {:?}, killed", command, self.timeout);
                return Err(ToolError::TimedOut(self.timeout));
            }
            thread::sleep(POLL_STEP);
        };

        Ok(ToolOutput {
            status,
            stdout: stdout.map(join_drain).unwrap_or_default(),
            stderr: stderr.map(join_drain).unwrap_or_default(),
        })
    }
}

/// One external-tool attempt in a fallback chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolStep {
    pub label: &'static str,
    pub program: String,
    pub args: Vec<String>,
}

impl ToolStep {
    pub fn new<I, S>(label: &'static str, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl ToolRunner {
    /// Try `steps` in order and stop at the first one that exits 0.
    /// Missing tools and non-zero exits both move on to the next step.
    pub fn first_success(&self, steps: &[ToolStep]) -> Option<&'static str> {
        for step in steps {
            match self.run(&step.program, &step.args) {
                Ok(out) if out.success() => return Some(step.label),
                Ok(out) => log::debug!("{} failed: {}", step.label, out.stderr.trim()),
                Err(err) => log::debug!("{} unavailable: {}", step.label, err),
            }
        }
        None
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Start a child that outlives us and shares none of our stdio. Only the
/// spawn itself is reported; the child's exit status is never observed.
pub fn spawn_detached(mut command: Command, label: &str) -> Result<u32, LaunchError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = command
        .spawn()
        .map_err(|err| LaunchError::from_spawn(label, err))?;
    let pid = child.id();
    log::debug!("Spawned detached {} (pid {})", label, pid);

    // Reap on a background thread so exited children don't linger as zombies.
    #[cfg(unix)]
    {
        let mut child = child;
        thread::spawn(move || {
            let _ = child.wait();
        });
    }

    Ok(pid)
}
