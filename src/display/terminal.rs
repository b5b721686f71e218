//! Crossterm-backed [`Surface`] drawing to stdout on the alternate screen.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use tracing::{debug, warn};

use super::surface::{KeyPress, Surface, TextStyle, Tone};
use crate::error::{DashboardError, Result};

/// Rows assumed when the terminal size cannot be queried
const FALLBACK_ROWS: u16 = 24;

/// The process terminal
pub struct TerminalSurface {
    out: Stdout,
    active: bool,
}

impl std::fmt::Debug for TerminalSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSurface")
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self { out: io::stdout(), active: false }
    }
}

impl Surface for TerminalSurface {
    fn init(&mut self) -> Result<()> {
        enable_raw_mode().map_err(|e| {
            DashboardError::SurfaceInit(format!(
                "Failed to enable raw mode: {}. Ensure you're running in a real terminal (TTY).",
                e
            ))
        })?;

        if let Err(e) = execute!(self.out, EnterAlternateScreen, Hide) {
            // Undo whatever part of the switch took effect
            let _ = execute!(self.out, Show, LeaveAlternateScreen);
            let _ = disable_raw_mode();
            return Err(DashboardError::SurfaceInit(e.to_string()));
        }

        self.active = true;
        debug!("Terminal switched to dashboard mode");
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        let screen = execute!(self.out, ResetColor, Show, LeaveAlternateScreen);
        let raw = disable_raw_mode();
        debug!("Terminal restored");
        screen.and(raw)
    }

    fn rows(&self) -> u16 {
        terminal::size().map(|(_, rows)| rows).unwrap_or(FALLBACK_ROWS)
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn draw_text(&mut self, row: u16, col: u16, text: &str, style: TextStyle) -> io::Result<()> {
        queue!(self.out, MoveTo(col, row))?;
        if let Some(tone) = style.tone {
            queue!(self.out, SetForegroundColor(tone_color(tone)))?;
        }
        if style.bold {
            queue!(self.out, SetAttribute(Attribute::Bold))?;
        }
        queue!(self.out, Print(text), SetAttribute(Attribute::Reset), ResetColor)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn poll_key(&mut self) -> io::Result<Option<KeyPress>> {
        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key_press(key))),
            _ => Ok(None),
        }
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Affirmative => Color::Green,
        Tone::Negative => Color::Red,
        Tone::Caution => Color::Yellow,
        Tone::Header => Color::Cyan,
    }
}

fn key_press(key: KeyEvent) -> KeyPress {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyPress::Interrupt,
        KeyCode::Char(c) => KeyPress::Char(c),
        _ => KeyPress::Other,
    }
}
