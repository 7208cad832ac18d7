//! Windows launch-at-login using the registry Run key

use anyhow::Result;
use winreg::RegKey;
use winreg::enums::*;

const APP_NAME: &str = "Spaceboot";
const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

fn run_value() -> Result<String> {
    let exe_path = std::env::current_exe()?;
    Ok(format!("\"{}\" run", exe_path.display()))
}

/// Registers `"<exe>" run` under HKCU\...\Run
pub fn enable_launch_at_login() -> Result<()> {
    let value = run_value()?;
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let (key, _) = hkcu.create_subkey(RUN_KEY)?;
    key.set_value(APP_NAME, &value)?;

    log::info!("Enabled launch-at-login via registry: {}", value);
    Ok(())
}

pub fn disable_launch_at_login() -> Result<()> {
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    match hkcu.open_subkey_with_flags(RUN_KEY, KEY_WRITE) {
        Ok(key) => {
            // a missing value already means disabled
            let _ = key.delete_value(APP_NAME);
            log::info!("Disabled launch-at-login");
            Ok(())
        }
        Err(e) => {
            log::debug!("Run key not found (already disabled): {}", e);
            Ok(())
        }
    }
}

pub fn is_launch_at_login_enabled() -> Result<bool> {
    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let Ok(key) = hkcu.open_subkey(RUN_KEY) else {
        return Ok(false);
    };
    Ok(key.get_value::<String, _>(APP_NAME).is_ok())
}
