//! Windows toast notifications using PowerShell

use crate::platform::process::{hidden_command, spawn_detached};
use crate::platform::windows::{POWERSHELL_ARGS, encode_powershell};

const APP_ID: &str = "Spaceboot.App";

pub fn notify_dispatch_failure(key: &str, detail: &str) {
    let title = xml_escape(&format!("Alias \"{}\" failed", key));
    let body = xml_escape(detail);

    // BurntToast when installed, otherwise the WinRT toast API directly
    let script = format!(
        r#"
$ErrorActionPreference = 'SilentlyContinue'
$title = @'
{title}
'@
$body = @'
{body}
'@
if (Get-Module -ListAvailable -Name BurntToast) {{
    Import-Module BurntToast
    New-BurntToastNotification -Text $title, $body
}} else {{
    [Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null
    [Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null
    $template = "<toast><visual><binding template=""ToastGeneric""><text>$title</text><text>$body</text></binding></visual></toast>"
    $xml = New-Object Windows.Data.Xml.Dom.XmlDocument
    $xml.LoadXml($template)
    $toast = [Windows.UI.Notifications.ToastNotification]::new($xml)
    [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier('{app_id}').Show($toast)
}}
"#,
        title = title,
        body = body,
        app_id = APP_ID,
    );

    let encoded = encode_powershell(&script);
    let mut command = hidden_command("powershell");
    command.args(POWERSHELL_ARGS).arg(&encoded);
    if let Err(e) = spawn_detached(command, "powershell toast") {
        log::debug!("Toast notification failed: {}", e);
    }
}

/// The here-strings above keep quotes literal; only XML needs escaping.
fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
        // a line starting with '@ would end the here-string early
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::xml_escape;

    #[test]
    fn escapes_markup_and_flattens_lines() {
        assert_eq!(
            xml_escape("<a href=\"x\">'&'\n'@"),
            "&lt;a href=&quot;x&quot;&gt;&apos;&amp;&apos; &apos;@"
        );
    }
}
