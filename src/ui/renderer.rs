//! Session renderer using crossterm
//!
//! Paints the windows of a [`Session`] onto the device. Only touched lines
//! are written unless a window asks for a clear on the next refresh.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Attribute, ResetColor, SetAttribute},
    terminal::{Clear, ClearType},
};
use tracing::trace;

use crate::core::session::Session;
use crate::core::window::{AttrFlags, Window, WindowHandle};

/// Session renderer
#[derive(Debug, Default)]
pub struct Renderer {
    /// Device cursor after the last refresh (col, row)
    last_cursor: (u16, u16),
    /// Lines written by the last refresh
    last_painted: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_cursor(&self) -> (u16, u16) {
        self.last_cursor
    }

    pub fn last_painted(&self) -> usize {
        self.last_painted
    }

    /// Bring the device up to date with the session's windows
    pub fn refresh<W: Write>(&mut self, out: &mut W, session: &Session) -> io::Result<()> {
        let backing = session.backing_window();
        let main = session.main_window();

        let full = backing.with(|w| w.clear_on_refresh()) || main.with(|w| w.clear_on_refresh());

        execute!(out, Hide)?;
        if full {
            execute!(out, ResetColor, SetAttribute(Attribute::Reset), Clear(ClearType::All))?;
        }

        let mut painted = 0;
        for placed in session.strips() {
            painted += self.paint(out, &placed.window, full)?;
        }
        if let Some(status) = session.status_window() {
            painted += self.paint(out, status, full)?;
        }
        painted += self.paint(out, main, full)?;

        backing.with_mut(|w| w.set_clear_on_refresh(false));
        main.with_mut(|w| w.set_clear_on_refresh(false));

        let (cursor_row, cursor_col) = main.with(|w| {
            let (origin_row, origin_col) = w.origin();
            let (row, col) = w.cursor();
            (origin_row + row, origin_col + col)
        });
        execute!(
            out,
            ResetColor,
            SetAttribute(Attribute::Reset),
            MoveTo(cursor_col, cursor_row),
            Show
        )?;
        out.flush()?;

        self.last_cursor = (cursor_col, cursor_row);
        self.last_painted = painted;
        trace!(painted, full, "refresh");
        Ok(())
    }

    /// Write the window's touched lines (every line when `full`) and mark
    /// them clean. Returns the number of lines written.
    fn paint<W: Write>(&self, out: &mut W, window: &WindowHandle, full: bool) -> io::Result<usize> {
        window.with_mut(|w| {
            let painted = self.paint_lines(out, w, full)?;
            w.untouch_all();
            Ok(painted)
        })
    }

    fn paint_lines<W: Write>(&self, out: &mut W, window: &Window, full: bool) -> io::Result<usize> {
        let (origin_row, origin_col) = window.origin();
        let mut painted = 0;
        let mut line_buffer = String::with_capacity(window.cols() as usize);

        for (row_idx, line) in window.lines().iter().enumerate() {
            if !full && !line.touched {
                continue;
            }

            execute!(out, MoveTo(origin_col, origin_row + row_idx as u16))?;
            let mut current_attrs = AttrFlags::empty();
            self.apply_attrs(out, current_attrs)?;
            line_buffer.clear();

            for cell in line.cells.iter().filter(|c| !c.is_continuation()) {
                if cell.attrs != current_attrs {
                    if !line_buffer.is_empty() {
                        write!(out, "{}", line_buffer)?;
                        line_buffer.clear();
                    }
                    self.apply_attrs(out, cell.attrs)?;
                    current_attrs = cell.attrs;
                }
                line_buffer.push(cell.ch);
            }

            if !line_buffer.is_empty() {
                write!(out, "{}", line_buffer)?;
            }
            painted += 1;
        }

        Ok(painted)
    }

    fn apply_attrs<W: Write>(&self, out: &mut W, attrs: AttrFlags) -> io::Result<()> {
        execute!(out, SetAttribute(Attribute::Reset))?;

        if attrs.contains(AttrFlags::BOLD) {
            execute!(out, SetAttribute(Attribute::Bold))?;
        }
        if attrs.contains(AttrFlags::DIM) {
            execute!(out, SetAttribute(Attribute::Dim))?;
        }
        if attrs.contains(AttrFlags::ITALIC) {
            execute!(out, SetAttribute(Attribute::Italic))?;
        }
        if attrs.contains(AttrFlags::UNDERLINE) {
            execute!(out, SetAttribute(Attribute::Underlined))?;
        }
        if attrs.contains(AttrFlags::BLINK) {
            execute!(out, SetAttribute(Attribute::SlowBlink))?;
        }
        if attrs.contains(AttrFlags::REVERSE) {
            execute!(out, SetAttribute(Attribute::Reverse))?;
        }

        Ok(())
    }
}

/// Plain-text picture of the device as the session would paint it
pub fn dump(session: &Session) -> String {
    let (rows, cols) = session.raw_size();
    let mut grid = vec![vec![' '; cols as usize]; rows as usize];

    let mut stamp = |handle: &WindowHandle| {
        handle.with(|w| {
            let (origin_row, origin_col) = w.origin();
            for (r, line) in w.lines().iter().enumerate() {
                let Some(row) = grid.get_mut(origin_row as usize + r) else {
                    break;
                };
                for (c, cell) in line.cells.iter().enumerate() {
                    if cell.is_continuation() {
                        continue;
                    }
                    if let Some(slot) = row.get_mut(origin_col as usize + c) {
                        *slot = cell.ch;
                    }
                }
            }
        })
    };

    for placed in session.strips() {
        stamp(&placed.window);
    }
    if let Some(status) = session.status_window() {
        stamp(status);
    }
    stamp(session.main_window());

    grid.into_iter()
        .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::mock::MockDriver;
    use crate::core::window::GridFactory;
    use crate::wm::layout::Anchor;
    use crate::wm::manager::Screen;

    fn open_screen() -> Screen<MockDriver, GridFactory> {
        let mut screen = Screen::new(MockDriver::new(4, 20), GridFactory::new());
        screen
            .register_reserved_strip(Anchor::Top, |window: &WindowHandle, _: u16| {
                window.with_mut(|w| w.put_str("== demo =="));
            })
            .unwrap();
        screen.open().unwrap();
        screen
    }

    #[test]
    fn test_first_refresh_clears_and_paints_everything() {
        let screen = open_screen();
        let session = screen.session().unwrap();
        let mut renderer = Renderer::new();
        let mut out = Vec::new();

        renderer.refresh(&mut out, session).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("\x1b[2J"));
        assert!(text.contains("== demo =="));
        // Top strip plus three main rows
        assert_eq!(renderer.last_painted(), 4);
        assert_eq!(renderer.last_cursor(), (0, 1));
        assert!(!session.main_window().with(|w| w.clear_on_refresh()));
        assert!(session.main_window().with(|w| w.is_untouched()));
    }

    #[test]
    fn test_refresh_paints_only_touched_lines() {
        let screen = open_screen();
        let session = screen.session().unwrap();
        let mut renderer = Renderer::new();
        renderer.refresh(&mut Vec::new(), session).unwrap();

        session.main_window().with_mut(|w| {
            w.move_cursor(1, 2);
            w.put_str("hi");
        });
        let mut out = Vec::new();
        renderer.refresh(&mut out, session).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(!text.contains("\x1b[2J"));
        assert!(text.contains("hi"));
        assert!(!text.contains("== demo =="));
        assert_eq!(renderer.last_painted(), 1);
        assert_eq!(renderer.last_cursor(), (4, 2));
    }

    #[test]
    fn test_styled_cells_switch_attributes() {
        let screen = open_screen();
        let session = screen.session().unwrap();
        let mut renderer = Renderer::new();
        renderer.refresh(&mut Vec::new(), session).unwrap();

        session.main_window().with_mut(|w| {
            w.set_attrs(AttrFlags::BOLD | AttrFlags::REVERSE);
            w.put_str("warn");
            w.set_attrs(AttrFlags::empty());
            w.put_str(" ok");
        });
        let mut out = Vec::new();
        renderer.refresh(&mut out, session).unwrap();

        let text = String::from_utf8_lossy(&out);
        let bold = text.find("\x1b[1m").unwrap();
        let reverse = text.find("\x1b[7m").unwrap();
        let styled = text.find("warn").unwrap();
        let plain = text.find(" ok").unwrap();
        assert!(bold < styled && reverse < styled);
        // Attributes are reset between the styled and the plain run
        assert!(text[styled..plain].contains("\x1b[0m"));
        assert_eq!(renderer.last_painted(), 1);
    }

    #[test]
    fn test_dump_composes_windows() {
        let screen = open_screen();
        let session = screen.session().unwrap();
        session.main_window().with_mut(|w| {
            w.move_cursor(2, 0);
            w.put_str("last");
        });

        assert_eq!(dump(session), "== demo ==\n\n\nlast");
    }
}
