//! Name derivation for alias targets and parsing of process-table tool output.
//!
//! Kept free of OS calls so every backend's string handling is testable on
//! any host.

use std::path::{Path, PathBuf};

/// Last path component, accepting both `/` and `\` separators regardless of host.
pub fn basename(target: &str) -> &str {
    let trimmed = target.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if name.len() > suffix.len() && name.is_char_boundary(name.len() - suffix.len()) {
        let (stem, tail) = name.split_at(name.len() - suffix.len());
        if tail.eq_ignore_ascii_case(suffix) {
            return Some(stem);
        }
    }
    None
}

/// `C:\Tools\Code.EXE` -> `Code.exe`, `notepad` -> `notepad.exe`.
pub fn windows_image_name(target: &str) -> String {
    let base = basename(target);
    let stem = strip_suffix_ignore_case(base, ".exe").unwrap_or(base);
    format!("{}.exe", stem)
}

/// Image name without the extension, as `Get-Process -Name` expects it.
pub fn windows_process_stem(target: &str) -> String {
    let image = windows_image_name(target);
    image[..image.len() - ".exe".len()].to_string()
}

pub fn is_app_bundle(target: &str) -> bool {
    strip_suffix_ignore_case(basename(target), ".app").is_some()
}

pub fn is_desktop_entry(target: &str) -> bool {
    strip_suffix_ignore_case(basename(target), ".desktop").is_some()
}

pub fn is_windows_executable(target: &str) -> bool {
    strip_suffix_ignore_case(basename(target), ".exe").is_some()
}

/// macOS process name: bundle stem for `.app`, otherwise the basename.
pub fn macos_process_name(target: &str) -> String {
    let base = basename(target);
    strip_suffix_ignore_case(base, ".app").unwrap_or(base).to_string()
}

/// Linux process name: desktop-entry stem for `.desktop`, otherwise the basename.
pub fn linux_process_name(target: &str) -> String {
    let base = basename(target);
    strip_suffix_ignore_case(base, ".desktop")
        .unwrap_or(base)
        .to_string()
}

/// A `tasklist /FO CSV /NH` listing matches only when its first line starts
/// with the quoted image name. "INFO: No tasks..." lines are unquoted.
pub fn tasklist_has_image(output: &str, image: &str) -> bool {
    let Some(first) = output.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return false;
    };
    let Some(rest) = first.strip_prefix('"') else {
        return false;
    };
    match rest.split_once('"') {
        Some((name, _)) => name.eq_ignore_ascii_case(image),
        None => false,
    }
}

/// PIDs listed by `pgrep`, excluding `own_pid`.
pub fn pgrep_pids(output: &str, own_pid: u32) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != own_pid)
        .collect()
}

/// Literal match for `pgrep -f`, which reads its pattern as an extended regex.
pub fn pgrep_pattern(name: &str) -> String {
    let mut out = String::with_capacity(name.len() * 2);
    for ch in name.chars() {
        if matches!(
            ch,
            '\\' | '.' | '^' | '$' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `ps -o pid= -o args=` rows as `(pid, command line)`.
pub fn ps_listing(output: &str) -> Vec<(u32, String)> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            Some((pid.parse().ok()?, args.trim().to_string()))
        })
        .collect()
}

/// Whether a command line runs the binary called `own_name`, by path or bare name.
/// Hotkey clients (`spaceboot trigger code`) carry the alias key in their
/// arguments and must not count as the target itself.
pub fn is_invocation_of(args: &str, own_name: &str) -> bool {
    !own_name.is_empty() && args.split_whitespace().any(|word| basename(word) == own_name)
}

/// A running instance that owns a usable window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessCandidate {
    pub pid: u32,
    /// Creation time in OS ticks; `u64::MAX` when it could not be read.
    pub started: u64,
}

/// Oldest-started candidate; equal start times fall back to the lower PID.
pub fn earliest(candidates: &[ProcessCandidate]) -> Option<ProcessCandidate> {
    candidates
        .iter()
        .copied()
        .min_by_key(|c| (c.started, c.pid))
}

/// Escape a value for interpolation inside an AppleScript string literal.
pub fn applescript_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Resolve a bare program name through `PATH`; paths are returned as-is.
pub fn resolve_program(target: &str) -> Option<PathBuf> {
    if target.contains(['/', '\\']) {
        let path = PathBuf::from(target);
        return path.exists().then_some(path);
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .flat_map(|dir| candidates(&dir, target))
        .find(|candidate| candidate.is_file())
}

#[cfg(target_os = "windows")]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    if is_windows_executable(name) {
        vec![dir.join(name)]
    } else {
        vec![dir.join(name), dir.join(format!("{}.exe", name))]
    }
}

#[cfg(not(target_os = "windows"))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}
