//! Windows foreground activation.
//!
//! Windows only lets the foreground thread hand focus to another window, so
//! a background process calling `SetForegroundWindow` usually just flashes
//! the taskbar button. The workaround is to attach our input queue to the
//! target window's thread for the duration of the call. If the window still
//! isn't in front afterwards, `WScript.Shell.AppActivate` gets a try.

use std::mem::size_of;

use windows::Win32::Foundation::{BOOL, CloseHandle, FILETIME, HWND, LPARAM, TRUE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    AttachThreadInput, GetCurrentThreadId, GetProcessTimes, OpenProcess,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BringWindowToTop, EnumWindows, GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindowVisible, SW_RESTORE, SetForegroundWindow,
    ShowWindow,
};

use crate::error::ActivationError;
use crate::platform::process::ToolRunner;
use crate::platform::target::{ProcessCandidate, earliest, windows_image_name};
use crate::platform::windows::{POWERSHELL_ARGS, encode_powershell};

pub fn bring_to_foreground(runner: &ToolRunner, target: &str) -> Result<(), ActivationError> {
    let image = windows_image_name(target);

    // 1. processes with that image that own a main window
    let pids = processes_named(&image);
    let windows = main_windows(&pids);
    if windows.is_empty() {
        log::error!(
            "{} is running ({} process(es)) but has no usable window",
            image,
            pids.len()
        );
        return Err(ActivationError::WindowNotFound { process: image });
    }

    // 2. oldest instance wins
    let candidates: Vec<ProcessCandidate> = windows
        .iter()
        .map(|(pid, _)| ProcessCandidate {
            pid: *pid,
            started: process_start_time(*pid),
        })
        .collect();
    let Some(chosen) = earliest(&candidates) else {
        return Err(ActivationError::WindowNotFound { process: image });
    };
    let Some(hwnd) = windows
        .iter()
        .find(|(pid, _)| *pid == chosen.pid)
        .map(|(_, hwnd)| *hwnd)
    else {
        return Err(ActivationError::WindowNotFound { process: image });
    };
    let title = window_title(hwnd);
    log::debug!(
        "Activating {} (PID {}, window \"{}\") out of {} candidate(s)",
        image,
        chosen.pid,
        title,
        candidates.len()
    );

    // 3-6. restore, attach input, raise, detach
    // SAFETY: hwnd came from EnumWindows in this call; a window destroyed since
    // then only makes the user32 calls fail.
    if unsafe { force_foreground(hwnd) } {
        log::info!("Brought to foreground: {} (PID {})", image, chosen.pid);
        return Ok(());
    }

    // 7. legacy path
    log::warn!(
        "SetForegroundWindow refused for {}, falling back to AppActivate",
        image
    );
    if shell_activate(runner, chosen.pid, &title)? {
        log::info!("Brought to foreground via AppActivate: {}", image);
        Ok(())
    } else {
        log::error!("Failed to bring {} to foreground", image);
        Err(ActivationError::NoActivationMethodAvailable { process: image })
    }
}

fn processes_named(image: &str) -> Vec<u32> {
    let mut pids = Vec::new();
    unsafe {
        let snapshot = match CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("CreateToolhelp32Snapshot failed: {:?}", e);
                return pids;
            }
        };

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                let len = entry
                    .szExeFile
                    .iter()
                    .position(|c| *c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let exe = String::from_utf16_lossy(&entry.szExeFile[..len]);
                if exe.eq_ignore_ascii_case(image) {
                    pids.push(entry.th32ProcessID);
                }
                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
        let _ = CloseHandle(snapshot);
    }
    pids
}

struct WindowSearch<'a> {
    pids: &'a [u32],
    found: Vec<(u32, HWND)>,
}

/// First visible, titled top-level window of each PID, in z-order.
fn main_windows(pids: &[u32]) -> Vec<(u32, HWND)> {
    if pids.is_empty() {
        return Vec::new();
    }
    let mut search = WindowSearch {
        pids,
        found: Vec::new(),
    };
    unsafe {
        if let Err(e) = EnumWindows(
            Some(collect_main_window),
            LPARAM(&mut search as *mut WindowSearch as isize),
        ) {
            log::warn!("EnumWindows failed: {:?}", e);
        }
    }
    search.found
}

unsafe extern "system" fn collect_main_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the &mut WindowSearch passed by main_windows, which
    // outlives the synchronous EnumWindows call.
    let search = unsafe { &mut *(lparam.0 as *mut WindowSearch) };
    let mut pid = 0u32;
    unsafe {
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
    }
    if search.pids.contains(&pid)
        && !search.found.iter().any(|(seen, _)| *seen == pid)
        && unsafe { IsWindowVisible(hwnd).as_bool() && GetWindowTextLengthW(hwnd) > 0 }
    {
        search.found.push((pid, hwnd));
    }
    TRUE
}

fn window_title(hwnd: HWND) -> String {
    let mut buf = [0u16; 512];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

/// Creation time as a FILETIME tick count, `u64::MAX` if unreadable.
fn process_start_time(pid: u32) -> u64 {
    unsafe {
        let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("OpenProcess({}) failed: {:?}", pid, e);
                return u64::MAX;
            }
        };
        let mut created = FILETIME::default();
        let mut exited = FILETIME::default();
        let mut kernel = FILETIME::default();
        let mut user = FILETIME::default();
        let result = GetProcessTimes(handle, &mut created, &mut exited, &mut kernel, &mut user);
        let _ = CloseHandle(handle);
        match result {
            Ok(()) => ((created.dwHighDateTime as u64) << 32) | created.dwLowDateTime as u64,
            Err(e) => {
                log::debug!("GetProcessTimes({}) failed: {:?}", pid, e);
                u64::MAX
            }
        }
    }
}

/// Returns whether `hwnd` ended up as the foreground window. Individual
/// failures are logged and the remaining steps still run.
unsafe fn force_foreground(hwnd: HWND) -> bool {
    unsafe {
        if IsIconic(hwnd).as_bool() {
            log::debug!("Window is minimized, restoring");
            let _ = ShowWindow(hwnd, SW_RESTORE);
        }

        let own_thread = GetCurrentThreadId();
        let window_thread = GetWindowThreadProcessId(hwnd, None);
        let attached = window_thread != 0
            && window_thread != own_thread
            && AttachThreadInput(own_thread, window_thread, true).as_bool();
        if !attached {
            log::debug!("AttachThreadInput to thread {} failed", window_thread);
        }

        if let Err(e) = BringWindowToTop(hwnd) {
            log::debug!("BringWindowToTop failed: {:?}", e);
        }
        if !SetForegroundWindow(hwnd).as_bool() {
            log::debug!("SetForegroundWindow returned false");
        }

        if attached {
            let _ = AttachThreadInput(own_thread, window_thread, false);
        }

        GetForegroundWindow() == hwnd
    }
}

/// `WScript.Shell.AppActivate` by PID, then by window title. Only failure to
/// run the script host at all is an error.
fn shell_activate(runner: &ToolRunner, pid: u32, title: &str) -> Result<bool, ActivationError> {
    let title = title.replace('\'', "''");
    let script = format!(
        r#"
$ErrorActionPreference = 'Stop'
$shell = New-Object -ComObject WScript.Shell
if ($shell.AppActivate({pid})) {{ exit 0 }}
if ('{title}' -ne '' -and $shell.AppActivate('{title}')) {{ exit 0 }}
exit 1
"#
    );
    let encoded = encode_powershell(&script);

    let mut args: Vec<&str> = POWERSHELL_ARGS.to_vec();
    args.push(&encoded);
    match runner.run("powershell.exe", args) {
        Ok(out) if out.success() => Ok(true),
        Ok(out) if out.status.code() == Some(1) => Ok(false),
        Ok(out) => Err(ActivationError::PlatformCallFailed(format!(
            "powershell exited with {}: {}",
            out.status,
            out.stderr.trim()
        ))),
        Err(err) => Err(ActivationError::PlatformCallFailed(format!(
            "powershell: {}",
            err
        ))),
    }
}
