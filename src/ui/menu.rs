#[cfg(any(target_os = "macos", target_os = "windows"))]
use anyhow::Result;
#[cfg(any(target_os = "macos", target_os = "windows"))]
use tray_icon::menu::{Menu, MenuId, MenuItem, PredefinedMenuItem};

#[cfg(any(target_os = "macos", target_os = "windows"))]
use crate::model::AppState;
use crate::model::{ActionKind, AliasBinding, DispatchFeedback, FeedbackSeverity, MenuAction};

const MAX_TOOLTIP_ENTRIES: usize = 5;
const MAX_TARGET_LABEL: usize = 40;
const MENU_ID_QUIT: &str = "quit";
const MENU_ID_EDIT_CONFIG: &str = "edit_config";
const MENU_ID_LAUNCH_AT_LOGIN: &str = "launch_at_login";
const MENU_ID_ALIAS_PREFIX: &str = "alias_";
#[cfg(any(target_os = "macos", target_os = "windows"))]
const MENU_ID_EMPTY: &str = "empty";

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub fn build_menu_with_context(state: &AppState) -> Result<Menu> {
    let menu = Menu::new();

    if state.aliases.is_empty() {
        let item = MenuItem::with_id(MENU_ID_EMPTY, "No aliases defined", false, None);
        menu.append(&item)?;
    } else {
        let header = MenuItem::with_id(
            "header_aliases",
            format!("Aliases · {}", state.aliases.len()),
            false,
            None,
        );
        menu.append(&header)?;

        // Clicking an alias dispatches it
        for alias in &state.aliases {
            let item = MenuItem::with_id(
                MenuId::new(alias_menu_id(alias.id)),
                format_alias_label(alias),
                true,
                None,
            );
            menu.append(&item)?;
        }
    }

    menu.append(&PredefinedMenuItem::separator())?;
    let edit_config_item =
        MenuItem::with_id(MENU_ID_EDIT_CONFIG, "Edit Configuration...", true, None);
    menu.append(&edit_config_item)?;

    let launch_enabled = state.config.system.launch_at_login;
    let launch_item = MenuItem::with_id(
        MENU_ID_LAUNCH_AT_LOGIN,
        if launch_enabled {
            "✓ Launch at Login"
        } else {
            "Launch at Login"
        },
        true,
        None,
    );
    menu.append(&launch_item)?;

    let quit_item = MenuItem::with_id(MENU_ID_QUIT, "Quit", true, None);
    menu.append(&quit_item)?;
    Ok(menu)
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub fn parse_menu_action(id: &MenuId) -> Option<MenuAction> {
    parse_menu_id(id.as_ref())
}

pub fn alias_menu_id(id: i64) -> String {
    format!("{}{}", MENU_ID_ALIAS_PREFIX, id)
}

pub fn parse_menu_id(raw: &str) -> Option<MenuAction> {
    match raw {
        MENU_ID_QUIT => Some(MenuAction::Quit),
        MENU_ID_EDIT_CONFIG => Some(MenuAction::EditConfig),
        MENU_ID_LAUNCH_AT_LOGIN => Some(MenuAction::LaunchAtLogin),
        _ => {
            let id = raw.strip_prefix(MENU_ID_ALIAS_PREFIX)?.parse::<i64>().ok()?;
            Some(MenuAction::Dispatch { id })
        }
    }
}

/// "c o d e · Code.exe", "gg · run: git status"
pub fn format_alias_label(alias: &AliasBinding) -> String {
    let what = match alias.action_kind {
        ActionKind::LaunchApp => crate::platform::target::basename(&alias.target).to_string(),
        ActionKind::RunCommand => format!("run: {}", alias.target),
        ActionKind::ExecuteScript => {
            format!("script: {}", crate::platform::target::basename(&alias.target))
        }
    };
    format!("{} · {}", alias.key, truncate(&what, MAX_TARGET_LABEL))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

pub fn build_tooltip(aliases: &[AliasBinding], feedback: Option<&DispatchFeedback>) -> String {
    let mut lines = Vec::new();
    if aliases.is_empty() {
        lines.push("Spaceboot: no aliases defined.".to_string());
    } else {
        lines.push(format!("Spaceboot: {} aliases", aliases.len()));
        for alias in aliases.iter().take(MAX_TOOLTIP_ENTRIES) {
            lines.push(format_alias_label(alias));
        }
        if aliases.len() > MAX_TOOLTIP_ENTRIES {
            lines.push(format!("…and {} more", aliases.len() - MAX_TOOLTIP_ENTRIES));
        }
    }

    if let Some(feedback) = feedback {
        let prefix = match feedback.severity {
            FeedbackSeverity::Info => "",
            FeedbackSeverity::Warning => "⚠️ ",
            FeedbackSeverity::Error => "⛔ ",
        };
        lines.push(format!("Last action: {}{}", prefix, feedback.message));
    }

    lines.join("\n")
}
