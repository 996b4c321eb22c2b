//! Layout - Splits the device grid into the main region and reserved strips
//!
//! [`allocate`] is a pure function of its inputs: the same geometry and the
//! same ordered strip requests always yield the same [`Layout`]. Resize
//! relies on this to validate a new geometry before touching any window.

use thiserror::Error;

use crate::core::session::{MIN_COLS, MIN_ROWS};

/// Edge a reserved strip is anchored to
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Anchor {
    /// Stacks downward from row 0
    Top,
    /// Stacks upward from the last row
    Bottom,
}

/// One reserved strip to place
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StripRequest {
    pub anchor: Anchor,
    pub height: u16,
}

impl StripRequest {
    pub fn top() -> Self {
        Self {
            anchor: Anchor::Top,
            height: 1,
        }
    }

    pub fn bottom() -> Self {
        Self {
            anchor: Anchor::Bottom,
            height: 1,
        }
    }
}

/// Where a reserved strip landed
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StripPlacement {
    pub anchor: Anchor,
    /// First device row of the strip
    pub row: u16,
    pub height: u16,
}

/// Computed split of the device grid
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Layout {
    pub raw_rows: u16,
    pub raw_cols: u16,
    pub main_rows: u16,
    pub main_cols: u16,
    pub main_origin_row: u16,
    /// One placement per request, in request order
    pub strips: Vec<StripPlacement>,
    pub status_rows: u16,
    /// First row of the status strip when one is reserved
    pub status_row: Option<u16>,
}

impl Layout {
    /// Rows taken by top-anchored strips
    pub fn top_rows(&self) -> u16 {
        self.anchored_rows(Anchor::Top)
    }

    /// Rows taken by bottom-anchored strips
    pub fn bottom_rows(&self) -> u16 {
        self.anchored_rows(Anchor::Bottom)
    }

    fn anchored_rows(&self, anchor: Anchor) -> u16 {
        self.strips
            .iter()
            .filter(|s| s.anchor == anchor)
            .map(|s| s.height)
            .sum()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Screen {rows}x{cols} is too small for the requested layout")]
    TooSmall { rows: u16, cols: u16 },
}

/// Split a `raw_rows` x `raw_cols` grid.
///
/// Top strips stack downward from row 0 in request order. Bottom strips
/// stack upward in request order, so the first bottom request sits nearest
/// the bottom edge. The status strip, when `status_rows > 0`, always keeps
/// the last rows of the device; bottom strips stack above it.
pub fn allocate(
    raw_rows: u16,
    raw_cols: u16,
    requests: &[StripRequest],
    status_rows: u16,
) -> Result<Layout, LayoutError> {
    let too_small = LayoutError::TooSmall {
        rows: raw_rows,
        cols: raw_cols,
    };

    if raw_rows < MIN_ROWS || raw_cols < MIN_COLS {
        return Err(too_small);
    }

    let reserved = requests
        .iter()
        .try_fold(u32::from(status_rows), |acc, r| acc.checked_add(u32::from(r.height)))
        .ok_or(too_small)?;
    if reserved >= u32::from(raw_rows) {
        return Err(too_small);
    }

    let mut top_cursor: u16 = 0;
    let mut bottom_cursor: u16 = 0;
    let bottom_edge = raw_rows - status_rows;

    let strips: Vec<StripPlacement> = requests
        .iter()
        .map(|request| {
            let row = match request.anchor {
                Anchor::Top => {
                    let row = top_cursor;
                    top_cursor += request.height;
                    row
                }
                Anchor::Bottom => {
                    bottom_cursor += request.height;
                    bottom_edge - bottom_cursor
                }
            };
            StripPlacement {
                anchor: request.anchor,
                row,
                height: request.height,
            }
        })
        .collect();

    Ok(Layout {
        raw_rows,
        raw_cols,
        main_rows: raw_rows - top_cursor - bottom_cursor - status_rows,
        main_cols: raw_cols,
        main_origin_row: top_cursor,
        strips,
        status_rows,
        status_row: (status_rows > 0).then_some(bottom_edge),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(layout: &Layout) {
        assert_eq!(
            layout.main_rows + layout.top_rows() + layout.bottom_rows() + layout.status_rows,
            layout.raw_rows
        );
        assert!(layout.main_rows >= 1);
    }

    #[test]
    fn test_no_strips() {
        let layout = allocate(24, 80, &[], 0).unwrap();
        assert_eq!(layout.main_rows, 24);
        assert_eq!(layout.main_cols, 80);
        assert_eq!(layout.main_origin_row, 0);
        assert!(layout.strips.is_empty());
        assert_eq!(layout.status_row, None);
    }

    #[test]
    fn test_single_bottom_strip() {
        let layout = allocate(24, 80, &[StripRequest::bottom()], 0).unwrap();
        assert_eq!(layout.main_rows, 23);
        assert_eq!(layout.main_origin_row, 0);
        assert_eq!(layout.strips[0].row, 23);
        assert_partition(&layout);
    }

    #[test]
    fn test_bottom_strips_stack_in_registration_order() {
        let requests = [StripRequest::bottom(), StripRequest::bottom()];
        let layout = allocate(24, 80, &requests, 0).unwrap();
        assert_eq!(layout.strips[0].row, 23);
        assert_eq!(layout.strips[1].row, 22);
        assert_eq!(layout.main_rows, 22);
    }

    #[test]
    fn test_top_strips_shift_main_origin() {
        let requests = [
            StripRequest::top(),
            StripRequest::bottom(),
            StripRequest::top(),
        ];
        let layout = allocate(24, 80, &requests, 0).unwrap();
        assert_eq!(layout.strips[0].row, 0);
        assert_eq!(layout.strips[1].row, 23);
        assert_eq!(layout.strips[2].row, 1);
        assert_eq!(layout.main_origin_row, 2);
        assert_eq!(layout.main_rows, 21);
        assert_partition(&layout);
    }

    #[test]
    fn test_status_strip_keeps_last_row() {
        let layout = allocate(24, 80, &[StripRequest::bottom()], 1).unwrap();
        assert_eq!(layout.status_row, Some(23));
        assert_eq!(layout.strips[0].row, 22);
        assert_eq!(layout.main_rows, 22);
        assert_partition(&layout);
    }

    #[test]
    fn test_too_small_device() {
        assert_eq!(
            allocate(1, 80, &[], 0),
            Err(LayoutError::TooSmall { rows: 1, cols: 80 })
        );
        assert_eq!(
            allocate(24, 1, &[], 0),
            Err(LayoutError::TooSmall { rows: 24, cols: 1 })
        );
    }

    #[test]
    fn test_strips_leave_no_main_rows() {
        let requests = [StripRequest::top(), StripRequest::bottom()];
        assert!(allocate(3, 10, &requests, 0).is_ok());
        assert!(allocate(2, 10, &requests, 0).is_err());
        assert!(allocate(3, 10, &requests, 1).is_err());
    }

    #[test]
    fn test_partition_holds_across_sizes() {
        let requests = [
            StripRequest::bottom(),
            StripRequest::top(),
            StripRequest::bottom(),
        ];
        for rows in 2..60u16 {
            for status in 0..=1u16 {
                match allocate(rows, 40, &requests, status) {
                    Ok(layout) => {
                        assert!(u32::from(rows) > 3 + u32::from(status));
                        assert_partition(&layout);
                        let top_end = layout.main_origin_row + layout.main_rows;
                        for strip in layout.strips.iter().filter(|s| s.anchor == Anchor::Bottom) {
                            assert!(strip.row >= top_end);
                        }
                    }
                    Err(_) => assert!(u32::from(rows) <= 3 + u32::from(status)),
                }
            }
        }
    }

    #[test]
    fn test_allocate_is_deterministic() {
        let requests = [StripRequest::top(), StripRequest::bottom()];
        let first = allocate(30, 100, &requests, 1).unwrap();
        let second = allocate(30, 100, &requests, 1).unwrap();
        assert_eq!(first, second);
    }
}
