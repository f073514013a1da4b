// ============================================================
// Layer 3 — Glimpse Locations and Geometry
// ============================================================
// A location is where the model looks next. It lives in
// normalised coordinates so the policy network never has to
// know how large the image is:
//
//   (-1, -1) ────────────── (-1, +1)
//      │                        │
//      │        (0, 0)          │        row grows downwards,
//      │                        │        col grows to the right
//   (+1, -1) ────────────── (+1, +1)
//
// GlimpseGeometry turns a normalised location into the integer
// pixel center of a g_size × g_size crop. The conversion always
// clamps, so whatever the policy proposes, the crop stays fully
// inside the image.
//
// No Burn types in here — this is plain arithmetic, testable
// without a backend.

use serde::{Deserialize, Serialize};

/// A glimpse location in normalised `[-1, 1]` coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub row: f32,
    pub col: f32,
}

impl Location {
    pub const CENTER: Location = Location { row: 0.0, col: 0.0 };

    pub fn new(row: f32, col: f32) -> Self {
        Self { row, col }
    }

    pub fn is_within_bounds(&self) -> bool {
        (-1.0..=1.0).contains(&self.row) && (-1.0..=1.0).contains(&self.col)
    }

    pub fn to_array(self) -> [f32; 2] {
        [self.row, self.col]
    }
}

/// Integer pixel center of a glimpse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelCenter {
    pub row: usize,
    pub col: usize,
}

/// Maps normalised locations onto pixel crops for a fixed
/// image size and glimpse size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlimpseGeometry {
    pub in_size: usize,
    pub g_size:  usize,
}

impl GlimpseGeometry {
    pub fn new(in_size: usize, g_size: usize) -> Self {
        assert!(
            g_size > 0 && g_size <= in_size,
            "glimpse size {g_size} must be in 1..={in_size}"
        );
        Self { in_size, g_size }
    }

    /// Distance from the center to the crop edge, as a real number.
    fn margin(&self) -> f32 {
        self.g_size as f32 / 2.0
    }

    /// Convert one normalised coordinate to a clamped integer pixel.
    ///
    /// `p = (l + 1) / 2 * (in - g + 1) + g/2`, clamped to
    /// `[g/2, in - g/2]`, then floored.
    pub fn to_pixel(&self, l: f32) -> usize {
        let margin = self.margin();
        let span   = (self.in_size - self.g_size + 1) as f32;
        let p = (l + 1.0) * 0.5 * span + margin;
        // NaN falls through clamp unchanged; pin it to the low edge
        let p = if p.is_nan() { margin } else { p };
        p.clamp(margin, self.in_size as f32 - margin).floor() as usize
    }

    pub fn pixel_center(&self, loc: Location) -> PixelCenter {
        PixelCenter {
            row: self.to_pixel(loc.row),
            col: self.to_pixel(loc.col),
        }
    }

    /// Top-left corner of the crop centered at `center`.
    pub fn origin(&self, center: PixelCenter) -> (usize, usize) {
        let half = self.g_size / 2;
        (center.row - half, center.col - half)
    }

    /// True when a `g_size` crop at `center` lies inside the image.
    pub fn contains_crop(&self, center: PixelCenter) -> bool {
        let half = self.g_size / 2;
        center.row >= half
            && center.col >= half
            && center.row - half + self.g_size <= self.in_size
            && center.col - half + self.g_size <= self.in_size
    }
}
