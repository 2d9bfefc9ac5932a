//! Screen geometry shared by the session and its persisted snapshot

use serde::{Deserialize, Serialize};

/// Screen-relative offset of the status bubble, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BubblePosition {
    pub x: i32,
    pub y: i32,
}

impl BubblePosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position after a drag delta, clamped to the i32 range
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}
