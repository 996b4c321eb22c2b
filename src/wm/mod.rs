//! Screen management - layout and lifecycle of the display session.
//!
//! - **manager**: `Screen` lifecycle (open, close, resize, delete) and `SharedScreen`
//! - **strip**: Reserved strips and their initializers
//! - **layout**: Splitting the device into main region and strips
//!
//! # Module Hierarchy
//!
//! ```text
//! wm/
//! ├── mod.rs      - Module exports
//! ├── manager.rs  - Screen (session state machine)
//! ├── strip.rs    - ReservedStrip, StatusStrip
//! └── layout.rs   - Region allocator
//! ```

pub mod layout;
pub mod manager;
pub mod strip;

pub use layout::{allocate, Anchor, Layout, LayoutError, StripPlacement, StripRequest};
pub use manager::{GeometrySnapshot, Screen, ScreenError, SharedScreen};
pub use strip::{PlacedStrip, ReservedStrip, StatusStrip, StripInitializer};
