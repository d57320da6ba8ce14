//! Colored terminal output

use owo_colors::{OwoColorize, colors::css};

/// Detects whether colored output should be enabled
pub fn supports_color() -> bool {
    supports_color::on(supports_color::Stream::Stdout).is_some()
}

/// Extension trait for colorizing output
pub trait Colorize {
    /// Color as eligible or healthy (green)
    fn success(&self) -> String;
    /// Color as blocked or needing attention (amber)
    fn warning(&self) -> String;
    /// Color as an identifier (blue)
    fn info(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Green>().to_string())
    }

    fn warning(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::Orange>().to_string())
    }

    fn info(&self) -> String {
        paint(self.as_ref(), |s| s.fg::<css::LightBlue>().to_string())
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), |s| s.dimmed().to_string())
    }
}

fn paint(text: &str, style: impl FnOnce(&str) -> String) -> String {
    if supports_color() {
        style(text)
    } else {
        text.to_string()
    }
}
