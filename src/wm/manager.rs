//! Screen manager - Drives the session lifecycle
//!
//! [`Screen`] is the owned context for one display: it holds the driver,
//! the window factory and the session slot, and moves the session through
//! `Closed -> Open -> (resize)* -> Closed`. [`SharedScreen`] wraps it for
//! callers that reach the display from more than one thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::layout::{allocate, Anchor, Layout, LayoutError};
use super::strip::{PlacedStrip, ReservedStrip, StatusStrip, StripInitializer};
use crate::config::Config;
use crate::core::driver::{DriverArgs, DriverError, PlatformDriver};
use crate::core::session::{Session, SessionSlot, MAX_RESERVED_STRIPS, MIN_COLS, MIN_ROWS};
use crate::core::window::{AllocError, Window, WindowFactory, WindowHandle};

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("A screen session is already open")]
    AlreadyOpen,

    #[error("No screen session has been initialized")]
    NotInitialized,

    #[error("Display device unavailable: {0}")]
    DeviceUnavailable(#[source] DriverError),

    #[error("Screen {rows}x{cols} is too small")]
    ScreenTooSmall { rows: u16, cols: u16 },

    #[error("Device rejected resize: {0}")]
    ResizeRejected(#[source] DriverError),

    #[error("Screen {rows}x{cols} leaves no room for the main window")]
    ResizeTooSmall { rows: u16, cols: u16 },

    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),

    #[error("Window allocation failed: {0}")]
    Alloc(#[from] AllocError),

    #[error("Reserved strips can only be registered while no session is open")]
    RegistrationClosed,

    #[error("At most {0} reserved strips may be registered")]
    TooManyStrips(usize),
}

impl ScreenError {
    /// No usable session can exist after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScreenError::DeviceUnavailable(_)
                | ScreenError::ScreenTooSmall { .. }
                | ScreenError::Driver(_)
        )
    }
}

/// Point-in-time view of the session geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometrySnapshot {
    pub raw_rows: u16,
    pub raw_cols: u16,
    /// Main window rows
    pub rows: u16,
    /// Main window columns
    pub cols: u16,
    pub main_origin_row: u16,
}

/// Windows built by one open attempt
struct Realized {
    backing: WindowHandle,
    main: WindowHandle,
    strips: Vec<(u16, WindowHandle)>,
    status: Option<(u16, WindowHandle)>,
}

/// A window as it was before a resize touched it
struct Undo {
    window: WindowHandle,
    saved: Window,
}

/// Owner of the display session
pub struct Screen<D: PlatformDriver, F: WindowFactory> {
    driver: D,
    factory: F,
    slot: SessionSlot,
    /// Strips registered for the next open
    pending_strips: Vec<ReservedStrip>,
    pending_status: Option<Box<dyn StripInitializer>>,
    preserve: bool,
    tab_size: Option<u8>,
}

impl<D: PlatformDriver, F: WindowFactory> Screen<D, F> {
    pub fn new(driver: D, factory: F) -> Self {
        Self {
            driver,
            factory,
            slot: SessionSlot::new(),
            pending_strips: Vec::new(),
            pending_status: None,
            preserve: false,
            tab_size: None,
        }
    }

    /// Carry configuration into the next open
    pub fn apply_config(&mut self, config: &Config) {
        self.preserve = config.preserve_screen;
        self.tab_size = Some(config.tab_size);
    }

    /// Keep the device's current content instead of starting from a
    /// cleared surface. Takes effect at the next open.
    pub fn set_preserve_existing_content(&mut self, preserve: bool) {
        self.preserve = preserve;
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn session(&self) -> Option<&Session> {
        self.slot.get()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.slot.get_mut()
    }

    pub fn main_window(&self) -> Option<&WindowHandle> {
        self.slot.get().map(Session::main_window)
    }

    /// Claim a one-row strip at the top or bottom of the device. Only
    /// accepted while no session is open; the initializer receives the
    /// strip's window during the next open.
    pub fn register_reserved_strip(
        &mut self,
        anchor: Anchor,
        initializer: impl StripInitializer + 'static,
    ) -> Result<(), ScreenError> {
        if self.slot.is_alive() {
            warn!("strip registration refused: session is open");
            return Err(ScreenError::RegistrationClosed);
        }

        let carried = self.slot.get().map(|s| s.strips.len()).unwrap_or(0);
        if carried + self.pending_strips.len() >= MAX_RESERVED_STRIPS {
            warn!("strip registration refused: limit reached");
            return Err(ScreenError::TooManyStrips(MAX_RESERVED_STRIPS));
        }

        self.pending_strips.push(ReservedStrip::new(anchor, initializer));
        debug!(?anchor, pending = self.pending_strips.len(), "reserved strip registered");
        Ok(())
    }

    /// Reserve the bottom row for a status strip at the next open
    pub fn enable_status_strip(
        &mut self,
        initializer: impl StripInitializer + 'static,
    ) -> Result<(), ScreenError> {
        if self.slot.is_alive() {
            return Err(ScreenError::RegistrationClosed);
        }
        self.pending_status = Some(Box::new(initializer));
        debug!("status strip enabled");
        Ok(())
    }

    /// Bring the device under control and build the session.
    ///
    /// Returns the main window. Fails with `AlreadyOpen` while a session is
    /// alive, leaving that session untouched.
    pub fn open(&mut self) -> Result<WindowHandle, ScreenError> {
        info!("open called");

        if self.slot.is_alive() {
            warn!("open refused: a session is already alive");
            return Err(ScreenError::AlreadyOpen);
        }

        let args = DriverArgs {
            preserve_existing_content: self.preserve,
        };
        self.driver
            .acquire(&args)
            .map_err(ScreenError::DeviceUnavailable)?;

        // A suspended session is only replaced once the device is ours
        let mut strips = Vec::new();
        let mut status_init = None;
        if let Some(old) = self.slot.take() {
            debug!("replacing suspended session");
            let (old_strips, old_status) = self.teardown(old);
            strips = old_strips;
            status_init = old_status;
        }
        strips.append(&mut self.pending_strips);
        if let Some(init) = self.pending_status.take() {
            status_init = Some(init);
        }

        let mut status = status_init.map(StatusStrip::from_boxed);
        match self.build_session(&mut strips, &mut status) {
            Ok(session) => {
                let main = session.main_window().clone();
                let (rows, cols) = session.size();
                info!(rows, cols, strips = session.strips.len(), "session open");
                self.slot.install(session);
                Ok(main)
            }
            Err(e) => {
                error!("open failed: {}", e);
                // Keep the registrations for the next attempt
                self.pending_strips = strips;
                self.pending_status = status.map(StatusStrip::into_initializer);
                Err(e)
            }
        }
    }

    /// Lay out and allocate a session on the already acquired device. The
    /// device is released again if this fails.
    fn build_session(
        &mut self,
        strips: &mut Vec<ReservedStrip>,
        status: &mut Option<StatusStrip>,
    ) -> Result<Session, ScreenError> {
        let raw_rows = self.driver.current_rows();
        let raw_cols = self.driver.current_cols();
        debug!(raw_rows, raw_cols, "device geometry");

        if raw_rows < MIN_ROWS || raw_cols < MIN_COLS {
            self.release_after_failure();
            return Err(ScreenError::ScreenTooSmall {
                rows: raw_rows,
                cols: raw_cols,
            });
        }

        let requests: Vec<_> = strips.iter().map(ReservedStrip::request).collect();
        let status_rows = if status.is_some() { StatusStrip::HEIGHT } else { 0 };
        let layout = match allocate(raw_rows, raw_cols, &requests, status_rows) {
            Ok(layout) => layout,
            Err(LayoutError::TooSmall { rows, cols }) => {
                self.release_after_failure();
                return Err(ScreenError::ScreenTooSmall { rows, cols });
            }
        };

        let mut built = Vec::new();
        let realized = match self.realize(&layout, &mut built) {
            Ok(realized) => realized,
            Err(e) => {
                for window in built {
                    self.factory.destroy(window);
                }
                self.release_after_failure();
                return Err(e.into());
            }
        };

        let mut placed = Vec::with_capacity(strips.len());
        for (mut strip, (row, window)) in strips.drain(..).zip(realized.strips) {
            strip.initialize(&window, raw_cols);
            placed.push(PlacedStrip { strip, row, window });
        }

        let mut status = status.take();
        if let (Some(status), Some((row, window))) = (status.as_mut(), realized.status) {
            status.window = Some(window);
            status.row = row;
            status.initialize(raw_cols);
        }

        self.factory.clear_to_end(&realized.main);
        realized
            .backing
            .with_mut(|w| w.set_clear_on_refresh(false));
        if self.preserve {
            self.factory.mark_untouched(&realized.backing);
            self.factory.mark_untouched(&realized.main);
            realized.main.with_mut(|w| w.set_clear_on_refresh(false));
        } else {
            realized.main.with_mut(|w| w.set_clear_on_refresh(true));
        }

        let orig_cursor = self.driver.cursor_mode();
        let mut session = Session::new(
            &layout,
            realized.backing,
            realized.main,
            placed,
            status,
            self.preserve,
            orig_cursor,
        );
        if let Some(tab_size) = self.tab_size {
            session.set_tab_size(tab_size);
        }
        session.alive = true;
        Ok(session)
    }

    /// Allocate every window for `layout`. Everything allocated is also
    /// pushed to `built` so a failure can be unwound.
    fn realize(
        &mut self,
        layout: &Layout,
        built: &mut Vec<WindowHandle>,
    ) -> Result<Realized, AllocError> {
        let backing = self.factory.create(layout.raw_rows, layout.raw_cols, 0, 0)?;
        built.push(backing.clone());

        let mut strips = Vec::with_capacity(layout.strips.len());
        for placement in &layout.strips {
            let window = self
                .factory
                .create(placement.height, layout.raw_cols, placement.row, 0)?;
            built.push(window.clone());
            strips.push((placement.row, window));
        }

        let status = match layout.status_row {
            Some(row) => {
                let window = self
                    .factory
                    .create(layout.status_rows, layout.raw_cols, row, 0)?;
                built.push(window.clone());
                Some((row, window))
            }
            None => None,
        };

        let main = self.factory.create(
            layout.main_rows,
            layout.main_cols,
            layout.main_origin_row,
            0,
        )?;
        built.push(main.clone());

        Ok(Realized {
            backing,
            main,
            strips,
            status,
        })
    }

    fn release_after_failure(&mut self) {
        if let Err(e) = self.driver.release() {
            warn!("device release after failed open: {}", e);
        }
    }

    /// Suspend control of the device. Windows and strips survive, so the
    /// session can be resumed. Closing an already closed screen succeeds.
    pub fn close(&mut self) -> Result<(), ScreenError> {
        debug!("close called");

        let Some(session) = self.slot.get_mut() else {
            return Ok(());
        };
        if !session.alive {
            return Ok(());
        }

        session.prog_cursor = self.driver.cursor_mode();
        if let Err(e) = self.driver.set_cursor_mode(session.orig_cursor) {
            warn!("cursor restore failed: {}", e);
        }

        let released = self.driver.release();
        session.alive = false;
        info!("session closed");

        released.map_err(|e| {
            error!("device release failed: {}", e);
            ScreenError::Driver(e)
        })
    }

    /// Take the device back for a suspended session
    pub fn resume(&mut self) -> Result<(), ScreenError> {
        let Some(session) = self.slot.get_mut() else {
            return Err(ScreenError::NotInitialized);
        };
        if session.alive {
            return Ok(());
        }

        let args = DriverArgs {
            preserve_existing_content: session.preserve,
        };
        self.driver
            .acquire(&args)
            .map_err(ScreenError::DeviceUnavailable)?;
        if let Err(e) = self.driver.set_cursor_mode(session.prog_cursor) {
            warn!("cursor mode restore failed: {}", e);
        }

        // The device content is unknown after an escape
        session.backing_window.with_mut(|w| w.set_clear_on_refresh(true));
        self.factory.mark_touched(&session.main_window);
        session.alive = true;
        info!("session resumed");
        Ok(())
    }

    /// Destroy every window and forget the session, closing it first if
    /// it still holds the device.
    pub fn delete_session(&mut self) {
        if self.slot.is_alive() {
            if let Err(e) = self.close() {
                warn!("close during delete failed: {}", e);
            }
        }
        if let Some(session) = self.slot.take() {
            let _ = self.teardown(session);
            info!("session deleted");
        }
    }

    /// Destroy a session's windows, handing back its strip registrations
    fn teardown(
        &mut self,
        session: Session,
    ) -> (Vec<ReservedStrip>, Option<Box<dyn StripInitializer>>) {
        let mut strips = Vec::with_capacity(session.strips.len());
        for placed in session.strips {
            self.factory.destroy(placed.window);
            strips.push(placed.strip);
        }

        let status = session.status.map(|mut status| {
            if let Some(window) = status.take_window() {
                self.factory.destroy(window);
            }
            status.into_initializer()
        });

        self.factory.destroy(session.main_window);
        self.factory.destroy(session.backing_window);
        (strips, status)
    }

    /// Resize the device and every session window.
    ///
    /// `resize(0, 0)` adopts a size change already made outside the
    /// program. Either every window is brought to the new geometry or the
    /// session is left exactly as it was.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), ScreenError> {
        info!(rows, cols, "resize called");

        let Some(session) = self.slot.get() else {
            return Err(ScreenError::NotInitialized);
        };
        let requests = session.strip_requests();
        let status_rows = session.status_rows();

        if rows != 0 || cols != 0 {
            self.driver.request_resize(rows, cols).map_err(|e| {
                warn!("resize rejected by device: {}", e);
                ScreenError::ResizeRejected(e)
            })?;
        }

        let raw_rows = self.driver.current_rows();
        let raw_cols = self.driver.current_cols();
        let layout = allocate(raw_rows, raw_cols, &requests, status_rows).map_err(|e| {
            warn!("resize refused: {}", e);
            ScreenError::ResizeTooSmall {
                rows: raw_rows,
                cols: raw_cols,
            }
        })?;

        self.apply_layout(&layout)?;

        let Some(session) = self.slot.get_mut() else {
            return Err(ScreenError::NotInitialized);
        };
        if let Some(status) = session.status.as_mut() {
            if let Some(window) = &status.window {
                window.with_mut(|w| w.erase());
            }
            status.initialize(layout.raw_cols);
        }
        self.factory.mark_touched(&session.main_window);
        session.resized = false;

        info!(
            raw_rows,
            raw_cols,
            rows = layout.main_rows,
            "resize applied"
        );
        Ok(())
    }

    /// Bring every window to `layout`, rolling back on the first failure
    fn apply_layout(&mut self, layout: &Layout) -> Result<(), ScreenError> {
        let Some(session) = self.slot.get() else {
            return Err(ScreenError::NotInitialized);
        };

        let mut targets = vec![
            (session.backing_window.clone(), layout.raw_rows, layout.raw_cols, 0),
            (
                session.main_window.clone(),
                layout.main_rows,
                layout.main_cols,
                layout.main_origin_row,
            ),
        ];
        for (placed, placement) in session.strips.iter().zip(&layout.strips) {
            targets.push((
                placed.window.clone(),
                placement.height,
                layout.raw_cols,
                placement.row,
            ));
        }
        if let (Some(window), Some(row)) = (session.status_window(), layout.status_row) {
            targets.push((window.clone(), layout.status_rows, layout.raw_cols, row));
        }

        let mut undo: Vec<Undo> = Vec::with_capacity(targets.len());
        for (window, rows, cols, origin_row) in targets {
            let saved = window.with(|w| w.clone());
            if let Err(e) = self.factory.resize_in_place(&window, rows, cols) {
                warn!("window resize failed, rolling back: {}", e);
                self.roll_back(undo);
                return Err(e.into());
            }
            self.factory.relocate(&window, origin_row, 0);
            undo.push(Undo { window, saved });
        }

        if let Some(session) = self.slot.get_mut() {
            session.apply_layout(layout);
        }
        Ok(())
    }

    fn roll_back(&mut self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            debug!(id = entry.window.id(), "restoring window");
            self.factory.restore(&entry.window, entry.saved);
        }
    }

    /// Record that the device changed size outside the program
    pub fn notify_resized(&mut self) {
        if let Some(session) = self.slot.get_mut() {
            session.resized = true;
            debug!("device reported a size change");
        }
    }

    /// A device size change is waiting for `resize(0, 0)`
    pub fn is_resize_pending(&self) -> bool {
        self.slot.get().map(Session::is_resized).unwrap_or(false)
    }

    /// No session holds the device
    pub fn is_closed(&self) -> bool {
        !self.slot.is_alive()
    }

    /// Main window size as (rows, cols); (0, 0) without a session
    pub fn current_geometry(&self) -> (u16, u16) {
        self.slot.get().map(Session::size).unwrap_or((0, 0))
    }

    pub fn geometry(&self) -> Option<GeometrySnapshot> {
        self.slot.get().map(|s| GeometrySnapshot {
            raw_rows: s.raw_rows,
            raw_cols: s.raw_cols,
            rows: s.rows,
            cols: s.cols,
            main_origin_row: s.main_origin_row,
        })
    }
}

/// Thread-safe screen: every call runs under one lock
pub struct SharedScreen<D: PlatformDriver, F: WindowFactory> {
    inner: Arc<Mutex<Screen<D, F>>>,
}

impl<D: PlatformDriver, F: WindowFactory> Clone for SharedScreen<D, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: PlatformDriver, F: WindowFactory> SharedScreen<D, F> {
    pub fn new(screen: Screen<D, F>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(screen)),
        }
    }

    /// Exclusive access for multi-step sequences
    pub fn lock(&self) -> MutexGuard<'_, Screen<D, F>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_reserved_strip(
        &self,
        anchor: Anchor,
        initializer: impl StripInitializer + 'static,
    ) -> Result<(), ScreenError> {
        self.lock().register_reserved_strip(anchor, initializer)
    }

    pub fn open(&self) -> Result<WindowHandle, ScreenError> {
        self.lock().open()
    }

    pub fn close(&self) -> Result<(), ScreenError> {
        self.lock().close()
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ScreenError> {
        self.lock().resize(rows, cols)
    }

    pub fn notify_resized(&self) {
        self.lock().notify_resized()
    }

    pub fn is_resize_pending(&self) -> bool {
        self.lock().is_resize_pending()
    }

    pub fn geometry(&self) -> Option<GeometrySnapshot> {
        self.lock().geometry()
    }

    pub fn delete_session(&self) {
        self.lock().delete_session()
    }
}
