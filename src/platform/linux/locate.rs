//! Linux process lookup using pgrep

use crate::platform::posix::pgrep_running;
use crate::platform::process::ToolRunner;
use crate::platform::target::linux_process_name;

pub fn is_running(runner: &ToolRunner, target: &str) -> bool {
    let name = linux_process_name(target);
    let running = pgrep_running(runner, &name);
    log::info!(
        "Process check: {} is {}",
        name,
        if running { "running" } else { "not running" }
    );
    running
}
