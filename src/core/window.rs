//! Window storage and the factory that hands windows out
//!
//! A [`Window`] is a rectangular character grid with an origin on the
//! device, a cursor, per-line touch flags and a clear-on-refresh flag.
//! Windows are shared through [`WindowHandle`], whose identity survives a
//! resize: the factory swaps the storage behind the handle, so every holder
//! keeps seeing the same logical window.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bitflags::bitflags;
use thiserror::Error;
use tracing::trace;
use unicode_width::UnicodeWidthChar;

/// Factory-assigned window identifier
pub type WindowId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("Invalid window size {rows}x{cols}")]
    InvalidSize { rows: u16, cols: u16 },

    #[error("Cell budget exhausted: {requested} cells requested, {available} available")]
    Exhausted { requested: usize, available: usize },

    #[error("Window {0} is not owned by this factory")]
    UnknownWindow(WindowId),
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u16 {
        const BOLD      = 0b0000_0001;
        const DIM       = 0b0000_0010;
        const UNDERLINE = 0b0000_0100;
        const BLINK     = 0b0000_1000;
        const REVERSE   = 0b0001_0000;
        const ITALIC    = 0b0010_0000;
    }
}

/// A single character cell
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    /// Display width; 0 marks the trailing half of a wide character
    pub width: u8,
    pub attrs: AttrFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            width: 1,
            attrs: AttrFlags::empty(),
        }
    }
}

impl Cell {
    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }
}

/// A single line of cells
#[derive(Clone, Debug)]
pub struct Line {
    pub cells: Vec<Cell>,
    /// Changed since the last paint
    pub touched: bool,
}

impl Line {
    fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            touched: false,
        }
    }

    fn blank_from(&mut self, col: usize) {
        for cell in self.cells.iter_mut().skip(col) {
            *cell = Cell::default();
        }
        self.touched = true;
    }
}

/// Rectangular character grid
#[derive(Clone, Debug)]
pub struct Window {
    origin_row: u16,
    origin_col: u16,
    rows: u16,
    cols: u16,
    lines: Vec<Line>,
    cursor_row: u16,
    cursor_col: u16,
    attrs: AttrFlags,
    clear_on_refresh: bool,
}

impl Window {
    pub fn new(rows: u16, cols: u16, origin_row: u16, origin_col: u16) -> Self {
        Self {
            origin_row,
            origin_col,
            rows,
            cols,
            lines: (0..rows).map(|_| Line::new(cols)).collect(),
            cursor_row: 0,
            cursor_col: 0,
            attrs: AttrFlags::empty(),
            clear_on_refresh: false,
        }
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Origin on the device as (row, col)
    pub fn origin(&self) -> (u16, u16) {
        (self.origin_row, self.origin_col)
    }

    pub fn cursor(&self) -> (u16, u16) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.lines
            .get(row as usize)
            .and_then(|line| line.cells.get(col as usize))
    }

    /// Text of a line with trailing blanks trimmed
    pub fn line_text(&self, row: u16) -> String {
        let Some(line) = self.lines.get(row as usize) else {
            return String::new();
        };
        let text: String = line
            .cells
            .iter()
            .filter(|cell| !cell.is_continuation())
            .map(|cell| cell.ch)
            .collect();
        text.trim_end().to_string()
    }

    /// Rebuild the grid at a new size, keeping the overlapping content
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let mut lines: Vec<Line> = (0..rows).map(|_| Line::new(cols)).collect();
        for (new, old) in lines.iter_mut().zip(self.lines.iter()) {
            let keep = (cols as usize).min(old.cells.len());
            new.cells[..keep].clone_from_slice(&old.cells[..keep]);
            // Do not leave half of a wide character at the new right edge
            if keep < old.cells.len() && keep > 0 && old.cells[keep].is_continuation() {
                new.cells[keep - 1] = Cell::default();
            }
        }

        self.lines = lines;
        self.rows = rows;
        self.cols = cols;
        self.cursor_row = self.cursor_row.min(rows.saturating_sub(1));
        self.cursor_col = self.cursor_col.min(cols.saturating_sub(1));
        self.touch_all();
    }

    pub fn move_to(&mut self, origin_row: u16, origin_col: u16) {
        self.origin_row = origin_row;
        self.origin_col = origin_col;
    }

    pub fn move_cursor(&mut self, row: u16, col: u16) {
        self.cursor_row = row.min(self.rows.saturating_sub(1));
        self.cursor_col = col.min(self.cols.saturating_sub(1));
    }

    pub fn set_attrs(&mut self, attrs: AttrFlags) {
        self.attrs = attrs;
    }

    /// Write text at the cursor without wrapping. Returns the number of
    /// columns consumed.
    pub fn put_str(&mut self, text: &str) -> u16 {
        let row = self.cursor_row as usize;
        let attrs = self.attrs;
        let cols = self.cols;
        let Some(line) = self.lines.get_mut(row) else {
            return 0;
        };

        let start = self.cursor_col;
        let mut col = start;
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0) as u16;
            if width == 0 {
                continue;
            }
            if col + width > cols {
                break;
            }

            line.cells[col as usize] = Cell {
                ch,
                width: width as u8,
                attrs,
            };
            for extra in 1..width {
                line.cells[(col + extra) as usize] = Cell {
                    ch: ' ',
                    width: 0,
                    attrs,
                };
            }
            col += width;
        }

        line.touched = true;
        self.cursor_col = col.min(cols.saturating_sub(1));
        col - start
    }

    /// Blank from the cursor to the end of the window
    pub fn clear_to_bottom(&mut self) {
        let row = self.cursor_row as usize;
        let col = self.cursor_col as usize;
        for (idx, line) in self.lines.iter_mut().enumerate().skip(row) {
            line.blank_from(if idx == row { col } else { 0 });
        }
    }

    /// Blank the whole window and home the cursor
    pub fn erase(&mut self) {
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.clear_to_bottom();
    }

    pub fn touch_all(&mut self) {
        for line in &mut self.lines {
            line.touched = true;
        }
    }

    pub fn untouch_all(&mut self) {
        for line in &mut self.lines {
            line.touched = false;
        }
    }

    pub fn is_touched(&self, row: u16) -> bool {
        self.lines
            .get(row as usize)
            .map(|line| line.touched)
            .unwrap_or(false)
    }

    /// Every line needs repainting
    pub fn is_fully_touched(&self) -> bool {
        self.lines.iter().all(|line| line.touched)
    }

    pub fn is_untouched(&self) -> bool {
        self.lines.iter().all(|line| !line.touched)
    }

    pub fn clear_on_refresh(&self) -> bool {
        self.clear_on_refresh
    }

    pub fn set_clear_on_refresh(&mut self, clear: bool) {
        self.clear_on_refresh = clear;
    }
}

/// Shared handle to a window owned by a factory
#[derive(Clone)]
pub struct WindowHandle {
    id: WindowId,
    inner: Arc<Mutex<Window>>,
}

impl WindowHandle {
    fn new(id: WindowId, window: Window) -> Self {
        Self {
            id,
            inner: Arc::new(Mutex::new(window)),
        }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Read the window
    pub fn with<R>(&self, f: impl FnOnce(&Window) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Modify the window
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Window) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Size as (rows, cols)
    pub fn size(&self) -> (u16, u16) {
        self.with(|w| (w.rows(), w.cols()))
    }

    /// Origin as (row, col)
    pub fn origin(&self) -> (u16, u16) {
        self.with(|w| w.origin())
    }

    /// Both handles refer to the same logical window
    pub fn same_window(&self, other: &WindowHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.size();
        let (row, col) = self.origin();
        f.debug_struct("WindowHandle")
            .field("id", &self.id)
            .field("size", &(rows, cols))
            .field("origin", &(row, col))
            .finish()
    }
}

/// Creates, resizes and destroys windows
pub trait WindowFactory {
    fn create(
        &mut self,
        rows: u16,
        cols: u16,
        origin_row: u16,
        origin_col: u16,
    ) -> Result<WindowHandle, AllocError>;

    /// Replace the storage behind `handle` with a grid of the new size. The
    /// returned handle refers to the same logical window.
    fn resize_in_place(
        &mut self,
        handle: &WindowHandle,
        rows: u16,
        cols: u16,
    ) -> Result<WindowHandle, AllocError>;

    fn relocate(&mut self, handle: &WindowHandle, origin_row: u16, origin_col: u16);

    /// Put saved storage back behind `handle`, content and origin included.
    fn restore(&mut self, handle: &WindowHandle, saved: Window);

    fn destroy(&mut self, handle: WindowHandle);

    /// Blank from the window cursor to the end of the window.
    fn clear_to_end(&mut self, handle: &WindowHandle);

    /// Treat the window as already matching the device.
    fn mark_untouched(&mut self, handle: &WindowHandle);

    /// Force a full repaint of the window.
    fn mark_touched(&mut self, handle: &WindowHandle);
}

/// In-memory window factory with an optional cell budget
#[derive(Debug, Default)]
pub struct GridFactory {
    next_id: WindowId,
    /// Cells held by each live window
    live: HashMap<WindowId, usize>,
    cell_budget: Option<usize>,
}

impl GridFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total number of cells all live windows may hold
    pub fn with_cell_budget(budget: usize) -> Self {
        Self {
            cell_budget: Some(budget),
            ..Self::default()
        }
    }

    pub fn set_cell_budget(&mut self, budget: Option<usize>) {
        self.cell_budget = budget;
    }

    pub fn live_windows(&self) -> usize {
        self.live.len()
    }

    pub fn live_cells(&self) -> usize {
        self.live.values().sum()
    }

    fn check_budget(&self, requested: usize, released: usize) -> Result<(), AllocError> {
        if let Some(budget) = self.cell_budget {
            let available = budget.saturating_sub(self.live_cells() - released);
            if requested > available {
                return Err(AllocError::Exhausted {
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }
}

impl WindowFactory for GridFactory {
    fn create(
        &mut self,
        rows: u16,
        cols: u16,
        origin_row: u16,
        origin_col: u16,
    ) -> Result<WindowHandle, AllocError> {
        if rows == 0 || cols == 0 {
            return Err(AllocError::InvalidSize { rows, cols });
        }
        let cells = rows as usize * cols as usize;
        self.check_budget(cells, 0)?;

        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, cells);
        trace!(id, rows, cols, origin_row, origin_col, "window created");

        Ok(WindowHandle::new(
            id,
            Window::new(rows, cols, origin_row, origin_col),
        ))
    }

    fn resize_in_place(
        &mut self,
        handle: &WindowHandle,
        rows: u16,
        cols: u16,
    ) -> Result<WindowHandle, AllocError> {
        if rows == 0 || cols == 0 {
            return Err(AllocError::InvalidSize { rows, cols });
        }
        let held = *self
            .live
            .get(&handle.id())
            .ok_or(AllocError::UnknownWindow(handle.id()))?;
        let cells = rows as usize * cols as usize;
        self.check_budget(cells, held)?;

        handle.with_mut(|w| w.resize(rows, cols));
        self.live.insert(handle.id(), cells);
        trace!(id = handle.id(), rows, cols, "window resized");

        Ok(handle.clone())
    }

    fn relocate(&mut self, handle: &WindowHandle, origin_row: u16, origin_col: u16) {
        handle.with_mut(|w| w.move_to(origin_row, origin_col));
    }

    fn restore(&mut self, handle: &WindowHandle, saved: Window) {
        let cells = saved.rows() as usize * saved.cols() as usize;
        if let Some(held) = self.live.get_mut(&handle.id()) {
            *held = cells;
        }
        handle.with_mut(|w| *w = saved);
        trace!(id = handle.id(), "window restored");
    }

    fn destroy(&mut self, handle: WindowHandle) {
        if self.live.remove(&handle.id()).is_some() {
            trace!(id = handle.id(), "window destroyed");
        }
    }

    fn clear_to_end(&mut self, handle: &WindowHandle) {
        handle.with_mut(|w| w.clear_to_bottom());
    }

    fn mark_untouched(&mut self, handle: &WindowHandle) {
        handle.with_mut(|w| w.untouch_all());
    }

    fn mark_touched(&mut self, handle: &WindowHandle) {
        handle.with_mut(|w| w.touch_all());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_str_truncates_at_edge() {
        let mut window = Window::new(2, 5, 0, 0);
        let written = window.put_str("abcdefg");
        assert_eq!(written, 5);
        assert_eq!(window.line_text(0), "abcde");
        assert!(window.is_touched(0));
        assert!(!window.is_touched(1));
    }

    #[test]
    fn test_put_str_wide_chars() {
        let mut window = Window::new(1, 5, 0, 0);
        // Two double-width characters fit, the third does not
        let written = window.put_str("日本語");
        assert_eq!(written, 4);
        assert_eq!(window.line_text(0), "日本");
        assert!(window.cell(0, 1).unwrap().is_continuation());
    }

    #[test]
    fn test_resize_keeps_overlap_and_clamps_cursor() {
        let mut window = Window::new(3, 10, 0, 0);
        window.move_cursor(2, 0);
        window.put_str("bottom");
        window.untouch_all();

        window.resize(2, 4);
        assert_eq!((window.rows(), window.cols()), (2, 4));
        assert_eq!(window.cursor(), (1, 3));
        assert!(window.is_fully_touched());

        window.resize(5, 12);
        assert_eq!(window.line_text(2), "");
        assert_eq!(window.lines().len(), 5);
    }

    #[test]
    fn test_resize_drops_split_wide_char() {
        let mut window = Window::new(1, 6, 0, 0);
        window.put_str("a日b");
        window.resize(1, 2);
        assert_eq!(window.line_text(0), "a");
    }

    #[test]
    fn test_clear_to_bottom_from_cursor() {
        let mut window = Window::new(3, 4, 0, 0);
        for row in 0..3 {
            window.move_cursor(row, 0);
            window.put_str("xxxx");
        }
        window.untouch_all();

        window.move_cursor(1, 2);
        window.clear_to_bottom();
        assert_eq!(window.line_text(0), "xxxx");
        assert_eq!(window.line_text(1), "xx");
        assert_eq!(window.line_text(2), "");
        assert!(!window.is_touched(0));
        assert!(window.is_touched(1));
    }

    #[test]
    fn test_factory_tracks_live_windows() {
        let mut factory = GridFactory::new();
        let a = factory.create(24, 80, 0, 0).unwrap();
        let b = factory.create(1, 80, 23, 0).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(factory.live_windows(), 2);
        assert_eq!(factory.live_cells(), 25 * 80);

        factory.destroy(b);
        assert_eq!(factory.live_windows(), 1);
        factory.destroy(a);
        assert_eq!(factory.live_cells(), 0);
    }

    #[test]
    fn test_factory_rejects_empty_window() {
        let mut factory = GridFactory::new();
        assert_eq!(
            factory.create(0, 80, 0, 0).unwrap_err(),
            AllocError::InvalidSize { rows: 0, cols: 80 }
        );
    }

    #[test]
    fn test_resize_in_place_keeps_identity() {
        let mut factory = GridFactory::new();
        let handle = factory.create(24, 80, 0, 0).unwrap();
        let holder = handle.clone();

        let resized = factory.resize_in_place(&handle, 30, 100).unwrap();
        assert!(resized.same_window(&holder));
        assert_eq!(holder.size(), (30, 100));
        assert_eq!(factory.live_cells(), 3000);
    }

    #[test]
    fn test_cell_budget() {
        let mut factory = GridFactory::with_cell_budget(100);
        let handle = factory.create(5, 10, 0, 0).unwrap();

        let err = factory.create(6, 10, 0, 0).unwrap_err();
        assert_eq!(
            err,
            AllocError::Exhausted {
                requested: 60,
                available: 50
            }
        );

        // Growing counts the window's own cells as released
        factory.resize_in_place(&handle, 10, 10).unwrap();
        assert!(factory.resize_in_place(&handle, 11, 10).is_err());
        assert_eq!(handle.size(), (10, 10));

        factory.set_cell_budget(None);
        factory.resize_in_place(&handle, 11, 10).unwrap();
        assert_eq!(factory.live_cells(), 110);
    }

    #[test]
    fn test_restore_puts_back_content_and_cells() {
        let mut factory = GridFactory::new();
        let handle = factory.create(4, 10, 2, 0).unwrap();
        handle.with_mut(|w| {
            w.move_cursor(3, 0);
            w.put_str("keep me");
        });
        let saved = handle.with(|w| w.clone());

        factory.resize_in_place(&handle, 2, 5).unwrap();
        factory.relocate(&handle, 0, 0);
        assert_eq!(handle.with(|w| w.line_text(3)), "");

        factory.restore(&handle, saved);
        assert_eq!(handle.size(), (4, 10));
        assert_eq!(handle.origin(), (2, 0));
        assert_eq!(handle.with(|w| w.line_text(3)), "keep me");
        assert_eq!(factory.live_cells(), 40);
    }

    #[test]
    fn test_unknown_window() {
        let mut factory = GridFactory::new();
        let mut other = GridFactory::new();
        let handle = other.create(2, 2, 0, 0).unwrap();
        assert_eq!(
            factory.resize_in_place(&handle, 3, 3).unwrap_err(),
            AllocError::UnknownWindow(handle.id())
        );
    }
}
