//! REPL prompt color palette. Scripts update it via `tui.setDefaultColors`
//! with open-ended string keys (`"prompt"`, `"error"`, `"banner"`, ...) —
//! new role names are accepted, not just the five built-in defaults, so a
//! script can introduce its own roles without a host-side allowlist.
//! Updates with a color name that fails to parse leave the existing entry
//! (if any) untouched rather than erroring the whole call.

use std::collections::HashMap;

use anstyle::{AnsiColor, Color, Style};
use once_cell::sync::Lazy;
use regex::Regex;

/// Color palette keyed by open-ended role names. Falls back to sane
/// defaults for any key never set.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: HashMap<String, Color>,
}

impl Default for Palette {
    fn default() -> Self {
        let mut colors = HashMap::new();
        colors.insert("prompt".to_string(), Color::Ansi(AnsiColor::Cyan));
        colors.insert("error".to_string(), Color::Ansi(AnsiColor::Red));
        colors.insert("warning".to_string(), Color::Ansi(AnsiColor::Yellow));
        colors.insert("banner".to_string(), Color::Ansi(AnsiColor::Magenta));
        colors.insert("hint".to_string(), Color::Ansi(AnsiColor::BrightBlack));
        Self { colors }
    }
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a best-effort update from script-supplied string keys.
    /// Unrecognized color names or keys are silently ignored.
    pub fn set_from_strings(&mut self, updates: &HashMap<String, String>) {
        for (key, color_name) in updates {
            if let Some(color) = parse_color_name(color_name) {
                self.colors.insert(key.clone(), color);
            }
        }
    }

    pub fn style_for(&self, key: &str) -> Style {
        match self.colors.get(key) {
            Some(color) => Style::new().fg_color(Some(*color)),
            None => Style::new(),
        }
    }

    pub fn paint(&self, key: &str, text: &str) -> String {
        if crate::error_format::should_use_color() {
            let style = self.style_for(key);
            format!("{}{}{}", style.render(), text, style.render_reset())
        } else {
            text.to_string()
        }
    }
}

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#([0-9a-fA-F]{6})$").unwrap());

/// Recognizes the 16 named ANSI colors plus `#rrggbb` truecolor hex codes,
/// for scripts/config files that want a color the ANSI palette can't name.
fn parse_color_name(name: &str) -> Option<Color> {
    if let Some(caps) = HEX_COLOR.captures(name) {
        let hex = &caps[1];
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some(Color::Rgb(anstyle::RgbColor(r, g, b)));
    }

    let ansi = match name.to_ascii_lowercase().as_str() {
        "black" => AnsiColor::Black,
        "red" => AnsiColor::Red,
        "green" => AnsiColor::Green,
        "yellow" => AnsiColor::Yellow,
        "blue" => AnsiColor::Blue,
        "magenta" => AnsiColor::Magenta,
        "cyan" => AnsiColor::Cyan,
        "white" => AnsiColor::White,
        "bright-black" | "gray" | "grey" => AnsiColor::BrightBlack,
        "bright-red" => AnsiColor::BrightRed,
        "bright-green" => AnsiColor::BrightGreen,
        "bright-yellow" => AnsiColor::BrightYellow,
        "bright-blue" => AnsiColor::BrightBlue,
        "bright-magenta" => AnsiColor::BrightMagenta,
        "bright-cyan" => AnsiColor::BrightCyan,
        "bright-white" => AnsiColor::BrightWhite,
        _ => return None,
    };
    Some(Color::Ansi(ansi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_role_keys_outside_the_defaults_are_still_accepted() {
        let mut palette = Palette::new();
        let mut updates = HashMap::new();
        updates.insert("totally-unknown-role".to_string(), "red".to_string());
        palette.set_from_strings(&updates);
        assert!(palette.colors.contains_key("totally-unknown-role"));
    }

    #[test]
    fn unknown_color_name_does_not_override_existing() {
        let mut palette = Palette::new();
        let mut updates = HashMap::new();
        updates.insert("prompt".to_string(), "not-a-color".to_string());
        palette.set_from_strings(&updates);
        assert_eq!(palette.colors.get("prompt"), Some(&Color::Ansi(AnsiColor::Cyan)));
    }

    #[test]
    fn recognized_color_name_updates_palette() {
        let mut palette = Palette::new();
        let mut updates = HashMap::new();
        updates.insert("prompt".to_string(), "green".to_string());
        palette.set_from_strings(&updates);
        assert_eq!(palette.colors.get("prompt"), Some(&Color::Ansi(AnsiColor::Green)));
    }

    #[test]
    fn hex_color_code_is_accepted_as_truecolor() {
        let mut palette = Palette::new();
        let mut updates = HashMap::new();
        updates.insert("prompt".to_string(), "#1a2b3c".to_string());
        palette.set_from_strings(&updates);
        assert_eq!(
            palette.colors.get("prompt"),
            Some(&Color::Rgb(anstyle::RgbColor(0x1a, 0x2b, 0x3c)))
        );
    }
}
