//! Session state
//!
//! The [`Session`] record holds the active display's geometry, mode flags
//! and every window the lifecycle allocated for it. [`SessionSlot`] is the
//! single place a session lives; it never talks to the driver or the window
//! factory itself.

use bitflags::bitflags;

use super::driver::CursorMode;
use super::window::WindowHandle;
use crate::wm::layout::{Layout, StripRequest};
use crate::wm::strip::{PlacedStrip, StatusStrip};

/// Smallest usable device height
pub const MIN_ROWS: u16 = 2;
/// Smallest usable device width
pub const MIN_COLS: u16 = 2;
/// Caller-registered strips a session may carry
pub const MAX_RESERVED_STRIPS: usize = 5;
/// Default tab stop width
pub const DEFAULT_TAB_SIZE: u8 = 8;

bitflags! {
    /// Input/output modes in effect for the session
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ModeFlags: u16 {
        /// Translate CR to LF on input
        const AUTO_CR              = 0b0000_0001;
        const RAW_OUT              = 0b0000_0010;
        const RAW_INP              = 0b0000_0100;
        const CBREAK               = 0b0000_1000;
        const ECHO                 = 0b0001_0000;
        const AUDIBLE              = 0b0010_0000;
        const SAVE_KEY_MODIFIERS   = 0b0100_0000;
        const RETURN_KEY_MODIFIERS = 0b1000_0000;
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::AUTO_CR | ModeFlags::CBREAK | ModeFlags::AUDIBLE
    }
}

/// The active display session
#[derive(Debug)]
pub struct Session {
    pub(crate) raw_rows: u16,
    pub(crate) raw_cols: u16,
    pub(crate) rows: u16,
    pub(crate) cols: u16,
    pub(crate) main_origin_row: u16,
    pub(crate) alive: bool,
    pub(crate) resized: bool,
    pub(crate) strips: Vec<PlacedStrip>,
    pub(crate) status: Option<StatusStrip>,
    pub(crate) main_window: WindowHandle,
    pub(crate) backing_window: WindowHandle,
    pub(crate) preserve: bool,
    /// Cursor mode the device had before the session took control
    pub(crate) orig_cursor: CursorMode,
    /// Cursor mode the program had when control was last suspended
    pub(crate) prog_cursor: CursorMode,
    modes: ModeFlags,
    tab_size: u8,
    delay_tenths: u16,
    line_color: Option<i16>,
}

impl Session {
    pub(crate) fn new(
        layout: &Layout,
        backing_window: WindowHandle,
        main_window: WindowHandle,
        strips: Vec<PlacedStrip>,
        status: Option<StatusStrip>,
        preserve: bool,
        orig_cursor: CursorMode,
    ) -> Self {
        Self {
            raw_rows: layout.raw_rows,
            raw_cols: layout.raw_cols,
            rows: layout.main_rows,
            cols: layout.main_cols,
            main_origin_row: layout.main_origin_row,
            alive: false,
            resized: false,
            strips,
            status,
            main_window,
            backing_window,
            preserve,
            orig_cursor,
            prog_cursor: orig_cursor,
            modes: ModeFlags::default(),
            tab_size: DEFAULT_TAB_SIZE,
            delay_tenths: 0,
            line_color: None,
        }
    }

    /// Full device size as (rows, cols)
    pub fn raw_size(&self) -> (u16, u16) {
        (self.raw_rows, self.raw_cols)
    }

    /// Main window size as (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    pub fn main_origin_row(&self) -> u16 {
        self.main_origin_row
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_resized(&self) -> bool {
        self.resized
    }

    pub fn preserves_content(&self) -> bool {
        self.preserve
    }

    pub fn main_window(&self) -> &WindowHandle {
        &self.main_window
    }

    pub fn backing_window(&self) -> &WindowHandle {
        &self.backing_window
    }

    pub fn strips(&self) -> &[PlacedStrip] {
        &self.strips
    }

    pub fn status_window(&self) -> Option<&WindowHandle> {
        self.status.as_ref().and_then(|s| s.window.as_ref())
    }

    pub fn status_rows(&self) -> u16 {
        if self.status.is_some() {
            StatusStrip::HEIGHT
        } else {
            0
        }
    }

    pub fn original_cursor(&self) -> CursorMode {
        self.orig_cursor
    }

    /// Strip requests in registration order, for re-running the allocator
    pub fn strip_requests(&self) -> Vec<StripRequest> {
        self.strips.iter().map(|p| p.strip.request()).collect()
    }

    /// Rows reserved away from the main window
    pub fn reserved_rows(&self) -> u16 {
        self.strips.iter().map(|p| p.strip.height).sum::<u16>() + self.status_rows()
    }

    pub fn modes(&self) -> ModeFlags {
        self.modes
    }

    pub fn set_modes(&mut self, modes: ModeFlags) {
        self.modes = modes;
    }

    pub fn tab_size(&self) -> u8 {
        self.tab_size
    }

    pub fn set_tab_size(&mut self, tab_size: u8) {
        self.tab_size = tab_size.max(1);
    }

    pub fn delay_tenths(&self) -> u16 {
        self.delay_tenths
    }

    pub fn set_delay_tenths(&mut self, tenths: u16) {
        self.delay_tenths = tenths;
    }

    pub fn line_color(&self) -> Option<i16> {
        self.line_color
    }

    pub fn set_line_color(&mut self, color: Option<i16>) {
        self.line_color = color;
    }

    /// Adopt a new layout. Window storage must already match it.
    pub(crate) fn apply_layout(&mut self, layout: &Layout) {
        self.raw_rows = layout.raw_rows;
        self.raw_cols = layout.raw_cols;
        self.rows = layout.main_rows;
        self.cols = layout.main_cols;
        self.main_origin_row = layout.main_origin_row;
        for (placed, placement) in self.strips.iter_mut().zip(&layout.strips) {
            placed.row = placement.row;
        }
        if let (Some(status), Some(row)) = (self.status.as_mut(), layout.status_row) {
            status.row = row;
        }
    }
}

/// Holder of the one session a screen may have
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<Session>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut Session> {
        self.current.as_mut()
    }

    /// A session exists and holds the device
    pub fn is_alive(&self) -> bool {
        self.current.as_ref().map(|s| s.alive).unwrap_or(false)
    }

    pub(crate) fn install(&mut self, session: Session) {
        self.current = Some(session);
    }

    pub(crate) fn take(&mut self) -> Option<Session> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::window::{GridFactory, WindowFactory};
    use crate::wm::layout::{allocate, Anchor, StripRequest};
    use crate::wm::strip::ReservedStrip;

    fn session_for(layout: &Layout, factory: &mut GridFactory) -> Session {
        let backing = factory.create(layout.raw_rows, layout.raw_cols, 0, 0).unwrap();
        let main = factory
            .create(layout.main_rows, layout.main_cols, layout.main_origin_row, 0)
            .unwrap();
        let strips = layout
            .strips
            .iter()
            .map(|placement| PlacedStrip {
                strip: ReservedStrip::new(placement.anchor, |_: &WindowHandle, _: u16| {}),
                row: placement.row,
                window: factory.create(1, layout.raw_cols, placement.row, 0).unwrap(),
            })
            .collect();
        Session::new(layout, backing, main, strips, None, false, CursorMode::Normal)
    }

    #[test]
    fn test_default_modes() {
        let modes = ModeFlags::default();
        assert!(modes.contains(ModeFlags::AUTO_CR | ModeFlags::CBREAK | ModeFlags::AUDIBLE));
        assert!(!modes.intersects(ModeFlags::ECHO | ModeFlags::RAW_INP | ModeFlags::RAW_OUT));
    }

    #[test]
    fn test_new_session_mirrors_layout() {
        let mut factory = GridFactory::new();
        let layout = allocate(24, 80, &[StripRequest::top(), StripRequest::bottom()], 0).unwrap();
        let session = session_for(&layout, &mut factory);

        assert_eq!(session.raw_size(), (24, 80));
        assert_eq!(session.size(), (22, 80));
        assert_eq!(session.main_origin_row(), 1);
        assert_eq!(session.reserved_rows(), 2);
        assert_eq!(session.strip_requests(), vec![StripRequest::top(), StripRequest::bottom()]);
        assert!(!session.is_alive());
        assert_eq!(session.tab_size(), DEFAULT_TAB_SIZE);
        assert_eq!(session.line_color(), None);
    }

    #[test]
    fn test_apply_layout_moves_strip_rows() {
        let mut factory = GridFactory::new();
        let requests = [StripRequest::bottom()];
        let mut session = session_for(&allocate(24, 80, &requests, 0).unwrap(), &mut factory);

        session.apply_layout(&allocate(30, 100, &requests, 0).unwrap());
        assert_eq!(session.raw_size(), (30, 100));
        assert_eq!(session.size(), (29, 100));
        assert_eq!(session.strips()[0].row, 29);
        assert_eq!(session.strips()[0].anchor(), Anchor::Bottom);
    }

    #[test]
    fn test_mode_and_timing_settings() {
        let mut factory = GridFactory::new();
        let mut session = session_for(&allocate(24, 80, &[], 0).unwrap(), &mut factory);
        assert_eq!(session.original_cursor(), CursorMode::Normal);

        session.set_modes(session.modes() | ModeFlags::ECHO);
        assert!(session.modes().contains(ModeFlags::ECHO | ModeFlags::CBREAK));

        session.set_delay_tenths(5);
        assert_eq!(session.delay_tenths(), 5);

        session.set_line_color(Some(3));
        assert_eq!(session.line_color(), Some(3));
        session.set_line_color(None);
        assert_eq!(session.line_color(), None);
    }

    #[test]
    fn test_slot_liveness() {
        let mut factory = GridFactory::new();
        let mut slot = SessionSlot::new();
        assert!(slot.get().is_none());
        assert!(!slot.is_alive());

        let mut session = session_for(&allocate(24, 80, &[], 0).unwrap(), &mut factory);
        session.alive = true;
        slot.install(session);
        assert!(slot.is_alive());

        slot.get_mut().unwrap().set_tab_size(0);
        assert_eq!(slot.get().unwrap().tab_size(), 1);

        assert!(slot.take().is_some());
        assert!(slot.get().is_none());
    }
}
