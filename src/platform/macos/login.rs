//! macOS launch-at-login: SMAppService on 13+, LaunchAgent before that

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use smappservice_rs::{AppService, ServiceStatus, ServiceType};

const APP_NAME: &str = "Spaceboot";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Registrar {
    AppService,
    LaunchAgent,
}

fn macos_major_version() -> Result<u32> {
    let output = std::process::Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .context("failed to run sw_vers")?;
    let version = String::from_utf8(output.stdout)?;
    version
        .trim()
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok())
        .ok_or_else(|| anyhow!("Unable to parse macOS version \"{}\"", version.trim()))
}

fn registrar() -> Registrar {
    match macos_major_version() {
        Ok(major) if major >= 13 => Registrar::AppService,
        Ok(major) => {
            debug!("macOS {} predates SMAppService, using LaunchAgent", major);
            Registrar::LaunchAgent
        }
        Err(e) => {
            warn!("Failed to detect macOS version: {}, using LaunchAgent", e);
            Registrar::LaunchAgent
        }
    }
}

fn launch_agent() -> Result<auto_launch::AutoLaunch> {
    let exe_path = std::env::current_exe()?;
    let app_path = exe_path
        .to_str()
        .ok_or_else(|| anyhow!("Invalid executable path"))?;

    auto_launch::AutoLaunchBuilder::new()
        .set_app_name(APP_NAME)
        .set_app_path(app_path)
        .set_use_launch_agent(true)
        .build()
        .map_err(|e| anyhow!("Failed to create LaunchAgent config: {}", e))
}

pub fn enable_launch_at_login() -> Result<()> {
    match registrar() {
        Registrar::AppService => {
            let service = AppService::new(ServiceType::MainApp);
            service
                .register()
                .map_err(|e| anyhow!("Failed to register with SMAppService: {}", e))?;
            if service.status() == ServiceStatus::RequiresApproval {
                warn!("Launch-at-login requires user approval in System Settings");
                AppService::open_system_settings_login_items();
                return Err(anyhow!(
                    "Please approve {} in System Settings > Login Items",
                    APP_NAME
                ));
            }
        }
        Registrar::LaunchAgent => launch_agent()?
            .enable()
            .map_err(|e| anyhow!("Failed to enable LaunchAgent: {}", e))?,
    }
    info!("Enabled launch-at-login");
    Ok(())
}

pub fn disable_launch_at_login() -> Result<()> {
    match registrar() {
        Registrar::AppService => AppService::new(ServiceType::MainApp)
            .unregister()
            .map_err(|e| anyhow!("Failed to unregister from SMAppService: {}", e)),
        Registrar::LaunchAgent => launch_agent()?
            .disable()
            .map_err(|e| anyhow!("Failed to disable LaunchAgent: {}", e)),
    }
}

pub fn is_launch_at_login_enabled() -> Result<bool> {
    match registrar() {
        Registrar::AppService => {
            // RequiresApproval still counts: the app is registered, only unapproved.
            let status = AppService::new(ServiceType::MainApp).status();
            Ok(status == ServiceStatus::Enabled || status == ServiceStatus::RequiresApproval)
        }
        Registrar::LaunchAgent => launch_agent()?
            .is_enabled()
            .map_err(|e| anyhow!("Failed to check LaunchAgent status: {}", e)),
    }
}
