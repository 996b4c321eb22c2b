//! Reserved strips - one-row regions claimed by callers before open
//!
//! A strip is registered as an anchor plus an initializer. The initializer
//! is the only way its owner ever receives the strip's window: it runs once
//! the window has been allocated during open (and, for the status strip,
//! again after every resize).

use std::fmt;

use super::layout::{Anchor, StripRequest};
use crate::core::window::WindowHandle;

/// Capability to set up a freshly allocated strip window
pub trait StripInitializer: Send {
    fn initialize(&mut self, window: &WindowHandle, cols: u16);
}

impl<F> StripInitializer for F
where
    F: FnMut(&WindowHandle, u16) + Send,
{
    fn initialize(&mut self, window: &WindowHandle, cols: u16) {
        self(window, cols)
    }
}

/// A caller-registered strip, not yet placed
pub struct ReservedStrip {
    pub anchor: Anchor,
    pub height: u16,
    initializer: Box<dyn StripInitializer>,
}

impl ReservedStrip {
    pub fn new(anchor: Anchor, initializer: impl StripInitializer + 'static) -> Self {
        Self {
            anchor,
            height: 1,
            initializer: Box::new(initializer),
        }
    }

    pub fn request(&self) -> StripRequest {
        StripRequest {
            anchor: self.anchor,
            height: self.height,
        }
    }

    pub fn initialize(&mut self, window: &WindowHandle, cols: u16) {
        self.initializer.initialize(window, cols);
    }
}

impl fmt::Debug for ReservedStrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservedStrip")
            .field("anchor", &self.anchor)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// A reserved strip with its window, owned by the session
#[derive(Debug)]
pub struct PlacedStrip {
    pub strip: ReservedStrip,
    pub row: u16,
    pub window: WindowHandle,
}

impl PlacedStrip {
    pub fn anchor(&self) -> Anchor {
        self.strip.anchor
    }
}

/// The bottom-most label/status region
pub struct StatusStrip {
    initializer: Box<dyn StripInitializer>,
    /// Present once the session has allocated it
    pub window: Option<WindowHandle>,
    pub row: u16,
}

impl StatusStrip {
    pub const HEIGHT: u16 = 1;

    pub fn new(initializer: impl StripInitializer + 'static) -> Self {
        Self::from_boxed(Box::new(initializer))
    }

    pub(crate) fn from_boxed(initializer: Box<dyn StripInitializer>) -> Self {
        Self {
            initializer,
            window: None,
            row: 0,
        }
    }

    /// Run the initializer against the allocated window, if any
    pub fn initialize(&mut self, cols: u16) {
        if let Some(window) = &self.window {
            self.initializer.initialize(window, cols);
        }
    }

    /// Detach the window, keeping the initializer for a later session
    pub(crate) fn take_window(&mut self) -> Option<WindowHandle> {
        self.window.take()
    }

    pub(crate) fn into_initializer(self) -> Box<dyn StripInitializer> {
        self.initializer
    }
}

impl fmt::Debug for StatusStrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusStrip")
            .field("window", &self.window)
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}
