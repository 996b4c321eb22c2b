//! Platform driver for the display device
//!
//! The driver owns the physical terminal: acquiring and releasing it,
//! reporting the current grid size, resizing it on request, and tracking
//! cursor visibility. Everything above this layer talks to the device only
//! through [`PlatformDriver`].

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, SetCursorStyle, Show},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetSize},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Display device is not acquired")]
    NotAcquired,

    #[error("Device refused resize to {rows}x{cols}")]
    ResizeRefused { rows: u16, cols: u16 },

    #[error("Display device is unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Cursor visibility as reported by the device
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CursorMode {
    Invisible,
    #[default]
    Normal,
    VeryVisible,
}

/// Arguments handed to the driver when the device is acquired
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverArgs {
    /// Keep whatever the device currently shows instead of switching to a
    /// fresh surface
    pub preserve_existing_content: bool,
}

/// Narrow interface to the physical display device
pub trait PlatformDriver {
    /// Take control of the device.
    fn acquire(&mut self, args: &DriverArgs) -> Result<()>;

    /// Hand the device back in the state it was acquired in.
    fn release(&mut self) -> Result<()>;

    /// Current device height in rows.
    fn current_rows(&self) -> u16;

    /// Current device width in columns.
    fn current_cols(&self) -> u16;

    /// Ask the device to change its grid size. The device may clamp, so
    /// callers re-query `current_rows`/`current_cols` afterwards.
    fn request_resize(&mut self, rows: u16, cols: u16) -> Result<()>;

    /// Cursor visibility currently in effect.
    fn cursor_mode(&self) -> CursorMode;

    /// Switch cursor visibility.
    fn set_cursor_mode(&mut self, mode: CursorMode) -> Result<()>;
}

/// Driver for a real terminal, backed by crossterm
pub struct CrosstermDriver {
    acquired: bool,
    alternate_screen: bool,
    cursor: CursorMode,
    /// Cursor mode in effect when the device was acquired
    cursor_at_acquire: CursorMode,
    /// Last size read from the terminal (cols, rows)
    size: (u16, u16),
}

impl Default for CrosstermDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermDriver {
    pub fn new() -> Self {
        Self {
            acquired: false,
            alternate_screen: false,
            cursor: CursorMode::Normal,
            cursor_at_acquire: CursorMode::Normal,
            size: (0, 0),
        }
    }

    /// Mode to put back on release, if the cursor changed since acquire
    fn cursor_to_restore(&self) -> Option<CursorMode> {
        (self.cursor != self.cursor_at_acquire).then_some(self.cursor_at_acquire)
    }

    /// Re-read the terminal size, keeping the cached value on failure
    fn refresh_size(&mut self) {
        match terminal::size() {
            Ok(size) => self.size = size,
            Err(e) => warn!("terminal size query failed: {}", e),
        }
    }

    fn size_now(&self) -> (u16, u16) {
        terminal::size().unwrap_or(self.size)
    }
}

impl PlatformDriver for CrosstermDriver {
    fn acquire(&mut self, args: &DriverArgs) -> Result<()> {
        if self.acquired {
            return Ok(());
        }

        terminal::enable_raw_mode()
            .map_err(|e| DriverError::Unavailable(format!("raw mode: {}", e)))?;

        let mut stdout = io::stdout();
        if !args.preserve_existing_content {
            if let Err(e) = execute!(stdout, EnterAlternateScreen) {
                let _ = terminal::disable_raw_mode();
                return Err(DriverError::Io(e));
            }
            self.alternate_screen = true;
        }

        self.refresh_size();
        self.cursor_at_acquire = self.cursor;
        self.acquired = true;
        debug!(
            cols = self.size.0,
            rows = self.size.1,
            alternate = self.alternate_screen,
            "terminal acquired"
        );
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if !self.acquired {
            return Err(DriverError::NotAcquired);
        }
        self.acquired = false;

        if let Some(mode) = self.cursor_to_restore() {
            if let Err(e) = self.set_cursor_mode(mode) {
                warn!("cursor restore on release failed: {}", e);
            }
        }

        let mut stdout = io::stdout();
        if self.alternate_screen {
            let _ = execute!(stdout, LeaveAlternateScreen);
            self.alternate_screen = false;
        }

        let _ = stdout.flush();

        // Raw mode goes last so the bytes above are not mangled
        terminal::disable_raw_mode()?;
        debug!("terminal released");
        Ok(())
    }

    fn current_rows(&self) -> u16 {
        self.size_now().1
    }

    fn current_cols(&self) -> u16 {
        self.size_now().0
    }

    fn request_resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        if !self.acquired {
            return Err(DriverError::NotAcquired);
        }
        if rows == 0 || cols == 0 {
            return Err(DriverError::ResizeRefused { rows, cols });
        }

        execute!(io::stdout(), SetSize(cols, rows))?;
        self.refresh_size();
        Ok(())
    }

    fn cursor_mode(&self) -> CursorMode {
        self.cursor
    }

    fn set_cursor_mode(&mut self, mode: CursorMode) -> Result<()> {
        let mut stdout = io::stdout();
        match mode {
            CursorMode::Invisible => execute!(stdout, Hide)?,
            CursorMode::Normal => execute!(stdout, SetCursorStyle::DefaultUserShape, Show)?,
            CursorMode::VeryVisible => execute!(stdout, SetCursorStyle::BlinkingBlock, Show)?,
        }
        self.cursor = mode;
        Ok(())
    }
}

impl Drop for CrosstermDriver {
    fn drop(&mut self) {
        if self.acquired {
            let _ = self.release();
        }
    }
}
