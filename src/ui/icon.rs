use anyhow::{Result, anyhow};
use tray_icon::Icon;

const ICON_SIZE: u32 = 32;

/// Icon variant for different states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconVariant {
    /// Outline - idle
    Idle,
    /// Filled - the last dispatch failed
    Alert,
}

/// Create a template icon for the menu bar.
/// Drawn procedurally: a rounded key cap with a space-bar stroke.
/// macOS adapts the color to the menu bar appearance.
pub fn create_template_icon(variant: IconVariant) -> Result<Icon> {
    let rgba = draw_keycap(ICON_SIZE, variant);
    Icon::from_rgba(rgba, ICON_SIZE, ICON_SIZE).map_err(|e| anyhow!("failed to create icon: {e}"))
}

fn draw_keycap(size: u32, variant: IconVariant) -> Vec<u8> {
    let mut rgba = vec![0u8; (size * size * 4) as usize];
    let margin = 3i32;
    let radius = 6i32;
    let border = 2i32;
    let (lo, hi) = (margin, size as i32 - 1 - margin);

    for y in 0..size as i32 {
        for x in 0..size as i32 {
            let inside = inside_rounded(x, y, lo, hi, radius);
            let inner = inside_rounded(x, y, lo + border, hi - border, radius - border);
            let bar = y >= hi - 9 && y <= hi - 7 && x >= lo + 7 && x <= hi - 7;

            let opaque = match variant {
                IconVariant::Idle => (inside && !inner) || bar,
                IconVariant::Alert => inside && !bar,
            };
            if opaque {
                let idx = ((y as u32 * size + x as u32) * 4) as usize;
                rgba[idx..idx + 4].copy_from_slice(&[0, 0, 0, 255]);
            }
        }
    }
    rgba
}

fn inside_rounded(x: i32, y: i32, lo: i32, hi: i32, radius: i32) -> bool {
    if x < lo || x > hi || y < lo || y > hi {
        return false;
    }
    let cx = x.clamp(lo + radius, hi - radius);
    let cy = y.clamp(lo + radius, hi - radius);
    let (dx, dy) = (x - cx, y - cy);
    dx * dx + dy * dy <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha(rgba: &[u8], size: u32, x: u32, y: u32) -> u8 {
        rgba[((y * size + x) * 4 + 3) as usize]
    }

    #[test]
    fn idle_icon_is_an_outline() {
        let rgba = draw_keycap(ICON_SIZE, IconVariant::Idle);
        assert_eq!(rgba.len(), (ICON_SIZE * ICON_SIZE * 4) as usize);
        // corner outside the cap, border, hollow center
        assert_eq!(alpha(&rgba, ICON_SIZE, 0, 0), 0);
        assert_eq!(alpha(&rgba, ICON_SIZE, 16, 3), 255);
        assert_eq!(alpha(&rgba, ICON_SIZE, 16, 12), 0);
    }

    #[test]
    fn alert_icon_is_filled() {
        let rgba = draw_keycap(ICON_SIZE, IconVariant::Alert);
        assert_eq!(alpha(&rgba, ICON_SIZE, 16, 12), 255);
        assert_eq!(alpha(&rgba, ICON_SIZE, 0, 0), 0);
    }
}
