//! Color utilities for status code presentation.

use owo_colors::{AnsiColors, OwoColorize};

/// Picks the color class for a response status.
///
/// - `>= 500` red
/// - `>= 400` yellow
/// - `>= 300` cyan
/// - anything else green
pub fn status_color(status: u16) -> AnsiColors {
    match status {
        500.. => AnsiColors::Red,
        400.. => AnsiColors::Yellow,
        300.. => AnsiColors::Cyan,
        _ => AnsiColors::Green,
    }
}

/// Formats a status code, wrapped in ANSI color codes when `enabled`.
///
/// The digits are identical either way, so machine consumers only need to
/// strip escape sequences.
pub fn colored_status(status: u16, enabled: bool) -> String {
    if enabled {
        status.color(status_color(status)).to_string()
    } else {
        status.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_color_ranges() {
        let same = |a: AnsiColors, b: AnsiColors| {
            std::mem::discriminant(&a) == std::mem::discriminant(&b)
        };
        assert!(same(status_color(503), AnsiColors::Red));
        assert!(same(status_color(500), AnsiColors::Red));
        assert!(same(status_color(404), AnsiColors::Yellow));
        assert!(same(status_color(301), AnsiColors::Cyan));
        assert!(same(status_color(200), AnsiColors::Green));
        assert!(same(status_color(101), AnsiColors::Green));
    }

    #[test]
    fn test_colored_status_format() {
        assert_eq!(colored_status(404, false), "404");

        let colored = colored_status(404, true);
        assert!(colored.contains("404"));
        assert!(colored.starts_with("\u{1b}["));
        assert_ne!(colored, "404");
    }
}
