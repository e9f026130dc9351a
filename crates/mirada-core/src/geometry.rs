use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in the host's logical coordinate space.
///
/// All geometry handled by this crate — detected face bounding boxes, the
/// on-screen layout guide, viewport rects — lives in one coordinate space
/// supplied by the host. The engine never converts units; the off-centre
/// tolerance in [`crate::validate`] is expressed in these same units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Horizontal centre of the rect.
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Vertical centre of the rect.
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// A rect of the same size, centred within `outer`.
    ///
    /// Used when the host viewport changes: the layout guide keeps its size
    /// and is re-centred in the new viewport.
    pub fn recentered_within(&self, outer: &Rect) -> Rect {
        Rect {
            x: outer.center_x() - self.width / 2.0,
            y: outer.center_y() - self.height / 2.0,
            width: self.width,
            height: self.height,
        }
    }
}
