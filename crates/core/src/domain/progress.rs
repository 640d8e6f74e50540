// Progress Cursor - streams a running job's output exactly once per line

use serde::{Deserialize, Serialize};

/// Lines `(start, end]` of the job output, 1-based inclusive end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSlice {
    /// Number of lines already streamed before this slice
    pub after: usize,
    /// Last line included in this slice
    pub through: usize,
}

impl LineSlice {
    /// First line of the slice (1-based)
    pub fn first_line(&self) -> usize {
        self.after + 1
    }

    pub fn len(&self) -> usize {
        self.through - self.after
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Count of output lines already streamed for a running job
///
/// Never decreases across polling cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCursor(usize);

impl ProgressCursor {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn lines_streamed(&self) -> usize {
        self.0
    }

    /// Slice of lines strictly after the cursor up to `total`, if any
    pub fn pending_slice(&self, total: usize) -> Option<LineSlice> {
        (total > self.0).then_some(LineSlice {
            after: self.0,
            through: total,
        })
    }

    /// Advance to `total` only if it increased
    pub fn advance_to(&mut self, total: usize) {
        if total > self.0 {
            self.0 = total;
        }
    }
}
