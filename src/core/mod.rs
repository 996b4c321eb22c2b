//! Core display components.
//!
//! This module contains the low-level pieces the session is built from:
//!
//! - **driver**: Platform driver trait and the crossterm-backed terminal driver
//! - **window**: Character-grid windows and the factory that allocates them
//! - **session**: The session record and the slot that holds it
//!
//! # Architecture
//!
//! ```text
//! SessionSlot
//! └── Session
//!     ├── backing window (whole device)
//!     ├── reserved strips (window + initializer)
//!     ├── status strip
//!     └── main window
//! ```

pub mod driver;
pub mod session;
pub mod window;
