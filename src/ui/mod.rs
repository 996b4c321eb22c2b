//! User interface rendering.
//!
//! - **renderer**: Paints session windows onto the terminal

pub mod renderer;

pub use renderer::{dump, Renderer};
