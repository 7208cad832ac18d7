//! Windows process lookup using tasklist

use crate::platform::process::ToolRunner;
use crate::platform::target::{tasklist_has_image, windows_image_name};

pub fn is_running(runner: &ToolRunner, target: &str) -> bool {
    let image = windows_image_name(target);
    let filter = format!("IMAGENAME eq {}", image);

    // CSV without header: matches are quoted rows, "INFO:" lines are not
    let running = match runner.run("tasklist", ["/FI", filter.as_str(), "/FO", "CSV", "/NH"]) {
        Ok(out) => {
            if !out.success() {
                log::warn!("tasklist exited with {}: {}", out.status, out.stderr.trim());
            }
            tasklist_has_image(&out.stdout, &image)
        }
        Err(err) => {
            log::warn!("tasklist failed while checking {}: {}", image, err);
            false
        }
    };

    log::info!(
        "Process check: {} is {}",
        image,
        if running { "running" } else { "not running" }
    );
    running
}
