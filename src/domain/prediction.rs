// ============================================================
// Layer 3 — Prediction Domain Type
// ============================================================
// What a single-image predict call hands back to the user:
// the predicted digit plus every location the model looked at,
// in the order it looked at them.
//
// The trajectory always holds n_step points: the initial
// location followed by one location per recurrent transition
// (the last transition classifies instead of moving).

use serde::{Deserialize, Serialize};

use crate::domain::location::{GlimpseGeometry, Location, PixelCenter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class index
    pub label: usize,

    /// Visited locations, initial location first
    pub trajectory: Vec<Location>,
}

impl Prediction {
    pub fn new(label: usize, trajectory: Vec<Location>) -> Self {
        Self { label, trajectory }
    }

    pub fn steps(&self) -> usize {
        self.trajectory.len()
    }

    /// Pixel centers of each glimpse, for drawing the path on the image.
    pub fn pixel_path(&self, geometry: &GlimpseGeometry) -> Vec<PixelCenter> {
        self.trajectory
            .iter()
            .map(|&loc| geometry.pixel_center(loc))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_path_follows_trajectory() {
        let p = Prediction::new(
            3,
            vec![Location::CENTER, Location::new(-1.0, 1.0)],
        );
        let path = p.pixel_path(&GlimpseGeometry::new(28, 8));
        assert_eq!(p.steps(), 2);
        assert_eq!(path[0], PixelCenter { row: 14, col: 14 });
        assert_eq!(path[1], PixelCenter { row: 4, col: 24 });
    }

    #[test]
    fn test_serialises_as_json() {
        let p = Prediction::new(7, vec![Location::new(0.5, -0.25)]);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"label":7,"trajectory":[{"row":0.5,"col":-0.25}]}"#);
    }
}
