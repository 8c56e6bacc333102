use std::ops::Range;

/// BatchCursor tracks the current `[start, end)` window of an
/// offset-paginated result set of `total_rows` rows.
/// While active, `start < end <= total_rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCursor {
    start: u64,
    end: u64,
    total_rows: u64,
    window: u64,
}

impl BatchCursor {
    /// Begin a cursor at the first window, or None if there's nothing to page through.
    pub fn new(total_rows: u64, window: u64) -> Option<Self> {
        if total_rows == 0 || window == 0 {
            return None;
        }
        Some(Self {
            start: 0,
            end: window.min(total_rows),
            total_rows,
            window,
        })
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Advance to the next window, returning false if the current window was the last.
    pub fn advance(&mut self) -> bool {
        if self.end >= self.total_rows {
            return false;
        }
        self.start = self.end;
        self.end = (self.end + self.window).min(self.total_rows);
        true
    }
}
