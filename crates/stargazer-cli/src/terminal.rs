//! Terminal styling and color utilities.
//!
//! ANSI escape codes plus color detection, so output code can ask for a
//! [`ColorPalette`] and never check the environment itself.

/// ANSI escape codes for text styling and colors.
pub mod colors {
    /// Reset all styling.
    pub const RESET: &str = "\x1b[0m";
    /// Bright bold white for emphasis (site names).
    pub const WHITE_BOLD: &str = "\x1b[1;97m";
    /// Gray for secondary elements (coordinates, footers).
    pub const GRAY: &str = "\x1b[90m";
    /// Cyan for road information.
    pub const CYAN: &str = "\x1b[36m";
    /// Green for dark skies (Bortle 1-3).
    pub const GREEN: &str = "\x1b[32m";
    /// Yellow for rural/suburban transition skies (Bortle 4-5).
    pub const YELLOW: &str = "\x1b[33m";
    /// Red for bright skies (Bortle 6-9).
    pub const RED: &str = "\x1b[31m";
}

/// Resolved color codes, either ANSI sequences or empty strings when color
/// is disabled.
#[derive(Debug, Clone, Copy)]
pub struct ColorPalette {
    pub reset: &'static str,
    pub white_bold: &'static str,
    pub gray: &'static str,
    pub cyan: &'static str,
    pub green: &'static str,
    pub yellow: &'static str,
    pub red: &'static str,
}

impl ColorPalette {
    #[must_use]
    pub const fn colored() -> Self {
        Self {
            reset: colors::RESET,
            white_bold: colors::WHITE_BOLD,
            gray: colors::GRAY,
            cyan: colors::CYAN,
            green: colors::GREEN,
            yellow: colors::YELLOW,
            red: colors::RED,
        }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self {
            reset: "",
            white_bold: "",
            gray: "",
            cyan: "",
            green: "",
            yellow: "",
            red: "",
        }
    }

    /// `colored()` when the terminal supports ANSI colors, else `plain()`.
    #[must_use]
    pub fn detect() -> Self {
        if supports_color() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    /// Color for a Bortle class; unknown skies are gray.
    #[must_use]
    pub fn bortle(&self, class: Option<u8>) -> &'static str {
        match class {
            Some(1..=3) => self.green,
            Some(4..=5) => self.yellow,
            Some(_) => self.red,
            None => self.gray,
        }
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::detect()
    }
}

/// Whether the terminal accepts ANSI color codes.
///
/// Respects `NO_COLOR` (https://no-color.org/) and `TERM=dumb`.
#[must_use]
pub fn supports_color() -> bool {
    color_allowed(|key| std::env::var(key).ok())
}

fn color_allowed<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    if lookup("NO_COLOR").is_some() {
        return false;
    }
    !lookup("TERM").is_some_and(|term| term.eq_ignore_ascii_case("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn plain_palette_is_empty() {
        let p = ColorPalette::plain();
        assert!(p.reset.is_empty());
        assert!(p.bortle(Some(2)).is_empty());
    }

    #[test]
    fn bortle_classes_map_to_sky_colors() {
        let p = ColorPalette::colored();
        assert_eq!(p.bortle(Some(1)), colors::GREEN);
        assert_eq!(p.bortle(Some(3)), colors::GREEN);
        assert_eq!(p.bortle(Some(5)), colors::YELLOW);
        assert_eq!(p.bortle(Some(9)), colors::RED);
        assert_eq!(p.bortle(None), colors::GRAY);
    }

    #[test]
    fn no_color_disables_ansi() {
        assert!(!color_allowed(env(&[("NO_COLOR", "1")])));
        assert!(!color_allowed(env(&[("NO_COLOR", ""), ("TERM", "xterm")])));
    }

    #[test]
    fn dumb_terminal_disables_ansi() {
        assert!(!color_allowed(env(&[("TERM", "DUMB")])));
    }

    #[test]
    fn regular_terminal_allows_ansi() {
        assert!(color_allowed(env(&[("TERM", "xterm-256color")])));
        assert!(color_allowed(env(&[])));
    }
}
