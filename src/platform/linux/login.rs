//! Linux launch-at-login using an XDG autostart entry

use anyhow::Result;
use auto_launch::AutoLaunchBuilder;
use log::{debug, info};

const APP_NAME: &str = "Spaceboot";

fn get_auto_launch() -> Result<auto_launch::AutoLaunch> {
    let exe_path = std::env::current_exe()?;
    let app_path = exe_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid executable path"))?;

    AutoLaunchBuilder::new()
        .set_app_name(APP_NAME)
        .set_app_path(app_path)
        .set_args(&["run"])
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create auto-launch config: {}", e))
}

/// Enables launch-at-login by writing ~/.config/autostart/Spaceboot.desktop
pub fn enable_launch_at_login() -> Result<()> {
    debug!("Enabling launch-at-login via XDG autostart");
    let auto = get_auto_launch()?;
    auto.enable()
        .map_err(|e| anyhow::anyhow!("Failed to enable autostart entry: {}", e))?;
    info!("Enabled launch-at-login");
    Ok(())
}

pub fn disable_launch_at_login() -> Result<()> {
    debug!("Disabling launch-at-login via XDG autostart");
    let auto = get_auto_launch()?;
    auto.disable()
        .map_err(|e| anyhow::anyhow!("Failed to disable autostart entry: {}", e))
}

pub fn is_launch_at_login_enabled() -> Result<bool> {
    let auto = get_auto_launch()?;
    auto.is_enabled()
        .map_err(|e| anyhow::anyhow!("Failed to check autostart status: {}", e))
}
