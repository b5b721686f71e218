//! Terminal output surface abstraction.
//!
//! The render loop only needs positioned text with a style, a clear, a
//! flush and a non-blocking key poll. Keeping that behind a trait lets the
//! loop run against a recording surface in tests.

use std::io;

use crate::error::Result;

/// Semantic colors used by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Connected / good (green)
    Affirmative,
    /// Disconnected / bad (red)
    Negative,
    /// Hints and warnings (yellow)
    Caution,
    /// Section headers (cyan)
    Header,
}

/// Text attributes for one draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub tone: Option<Tone>,
    pub bold: bool,
}

impl TextStyle {
    /// Default terminal colors
    pub const PLAIN: TextStyle = TextStyle { tone: None, bold: false };

    /// Colored, not bold
    pub const fn tone(tone: Tone) -> Self {
        TextStyle { tone: Some(tone), bold: false }
    }

    /// Same style in bold
    pub const fn bold(self) -> Self {
        TextStyle { tone: self.tone, bold: true }
    }
}

/// A single buffered keypress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    Char(char),
    /// Ctrl+C, which raw mode delivers as a key instead of SIGINT
    Interrupt,
    Other,
}

/// Terminal-like output surface
pub trait Surface: Send + 'static {
    /// Switch the terminal into dashboard mode
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DashboardError::SurfaceInit`] if the terminal
    /// cannot be set up. The terminal is left as it was.
    fn init(&mut self) -> Result<()>;

    /// Put the terminal back the way `init` found it
    fn restore(&mut self) -> io::Result<()>;

    /// Height of the drawable area in rows
    fn rows(&self) -> u16;

    /// Erase the whole frame
    fn clear(&mut self) -> io::Result<()>;

    /// Draw `text` starting at (`row`, `col`)
    fn draw_text(&mut self, row: u16, col: u16, text: &str, style: TextStyle) -> io::Result<()>;

    /// Make everything drawn since the last flush visible
    fn flush(&mut self) -> io::Result<()>;

    /// Return one buffered keypress without waiting
    fn poll_key(&mut self) -> io::Result<Option<KeyPress>>;
}
