//! Console styling on top of `owo-colors`.

use owo_colors::OwoColorize;

/// Styles applied to REPL output. A disabled palette returns text untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Palette that never emits escape sequences
    pub fn plain() -> Self {
        Self::new(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn red(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.red().to_string())
    }

    pub fn green(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.green().to_string())
    }

    pub fn yellow(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.yellow().to_string())
    }

    pub fn cyan(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.cyan().to_string())
    }

    pub fn gray(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.bright_black().to_string())
    }

    pub fn dim(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.dimmed().to_string())
    }

    pub fn bold(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.bold().to_string())
    }

    /// Style used by session notices
    pub fn notice(
        &self,
        text: &str,
    ) -> String {
        self.paint(text, |t| t.yellow().italic().to_string())
    }

    fn paint(
        &self,
        text: &str,
        style: impl FnOnce(&str) -> String,
    ) -> String {
        if self.enabled {
            style(text)
        } else {
            text.to_string()
        }
    }
}
