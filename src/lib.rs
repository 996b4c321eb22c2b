//! termscreen - single-session screen management for terminals
//!
//! A [`Screen`] owns one display session: it acquires the terminal, splits
//! it into a main window plus one-row reserved strips, keeps that layout
//! consistent across resizes, and gives the terminal back on close.
//!
//! ```no_run
//! use termscreen::{Anchor, CrosstermDriver, GridFactory, Screen, WindowHandle};
//!
//! let mut screen = Screen::new(CrosstermDriver::new(), GridFactory::new());
//! screen.register_reserved_strip(Anchor::Top, |w: &WindowHandle, _: u16| {
//!     w.with_mut(|w| w.put_str("title"));
//! })?;
//! let main = screen.open()?;
//! main.with_mut(|w| w.put_str("hello"));
//! screen.close()?;
//! screen.delete_session();
//! # Ok::<(), termscreen::ScreenError>(())
//! ```

pub mod config;
pub mod core;
pub mod ui;
pub mod wm;

pub use crate::config::Config;
pub use crate::core::driver::{CrosstermDriver, CursorMode, DriverArgs, DriverError, PlatformDriver};
pub use crate::core::session::{ModeFlags, Session, SessionSlot};
pub use crate::core::window::{AllocError, GridFactory, Window, WindowFactory, WindowHandle};
pub use crate::wm::{Anchor, GeometrySnapshot, Screen, ScreenError, SharedScreen, StripInitializer};

/// Version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_string() -> String {
    format!("termscreen {}", VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string() {
        assert_eq!(version_string(), format!("termscreen {}", env!("CARGO_PKG_VERSION")));
    }
}
