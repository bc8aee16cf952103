//! `~/.config/sethael/sethael.conf`: plain `key = value` lines.
//!
//! ```text
//! theme_color = "#c9a227"
//! theme = dark
//! reading_scale = 3
//! data_dir = /home/me/.local/share/sethael
//! ```

use ratatui::style::Color;
use std::path::PathBuf;

pub const MIN_SCALE: u8 = 1;
pub const MAX_SCALE: u8 = 5;
const DEFAULT_SCALE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub accent: Color,
    pub mode: ThemeMode,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            accent: Color::Yellow,
            mode: ThemeMode::Dark,
        }
    }
}

impl Theme {
    pub fn text(&self) -> Color {
        match self.mode {
            ThemeMode::Dark => Color::Gray,
            ThemeMode::Light => Color::Black,
        }
    }

    pub fn muted(&self) -> Color {
        match self.mode {
            ThemeMode::Dark => Color::DarkGray,
            ThemeMode::Light => Color::Gray,
        }
    }

    pub fn background(&self) -> Color {
        match self.mode {
            ThemeMode::Dark => Color::Reset,
            ThemeMode::Light => Color::White,
        }
    }

    pub fn toggled(self) -> Self {
        let mode = match self.mode {
            ThemeMode::Dark => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
        };
        Self { mode, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub theme: Theme,
    pub reading_scale: u8,
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            reading_scale: DEFAULT_SCALE,
            data_dir: default_data_dir(),
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/sethael/sethael.conf"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sethael")
}

/// Missing file, unknown keys and bad values all fall back to defaults.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(_) => Config::default(),
    }
}

pub fn parse_config(content: &str) -> Config {
    let mut config = Config::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        let val = val.trim().trim_matches('"').trim_matches('\'');
        match key.trim() {
            "theme_color" => {
                if let Some(color) = parse_hex(val) {
                    config.theme.accent = color;
                }
            }
            "theme" => match val.to_ascii_lowercase().as_str() {
                "dark" => config.theme.mode = ThemeMode::Dark,
                "light" => config.theme.mode = ThemeMode::Light,
                _ => {}
            },
            "reading_scale" => {
                if let Ok(scale) = val.parse::<u8>() {
                    config.reading_scale = scale.clamp(MIN_SCALE, MAX_SCALE);
                }
            }
            "data_dir" if !val.is_empty() => {
                config.data_dir = expand_home(val);
            }
            _ => {}
        }
    }
    config
}

fn parse_hex(val: &str) -> Option<Color> {
    if !val.starts_with('#') || val.len() != 7 {
        return None;
    }
    let r = u8::from_str_radix(val.get(1..3)?, 16).ok()?;
    let g = u8::from_str_radix(val.get(3..5)?, 16).ok()?;
    let b = u8::from_str_radix(val.get(5..7)?, 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

fn expand_home(val: &str) -> PathBuf {
    match (val.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(val),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let config = parse_config(
            "# comment\ntheme_color = \"#102030\"\ntheme = Light\nreading_scale = 9\ndata_dir = /tmp/sethael\n",
        );
        assert_eq!(config.theme.accent, Color::Rgb(0x10, 0x20, 0x30));
        assert_eq!(config.theme.mode, ThemeMode::Light);
        assert_eq!(config.reading_scale, MAX_SCALE);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sethael"));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = parse_config("theme_color = red\ntheme = sepia\nreading_scale = big\nnonsense\n");
        assert_eq!(config, Config::default());

        for color in ["#aébcd", "#12345", "#12345g", "102030a"] {
            let config = parse_config(&format!("theme_color = \"{color}\"\n"));
            assert_eq!(config.theme.accent, Theme::default().accent, "{color}");
        }
    }

    #[test]
    fn toggling_theme_keeps_accent() {
        let theme = Theme {
            accent: Color::Cyan,
            mode: ThemeMode::Dark,
        };
        let light = theme.toggled();
        assert_eq!(light.mode, ThemeMode::Light);
        assert_eq!(light.accent, Color::Cyan);
        assert_eq!(light.toggled(), theme);
    }
}
