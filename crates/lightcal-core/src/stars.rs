use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Area covered by a detected star, centered on its position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarExtent {
    Radius(f64),
    Rect { half_width: f64, half_height: f64 },
}

/// A star found by the external detector. Coordinates are pixel indices
/// (column, row); sub-pixel positions are allowed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub x: f64,
    pub y: f64,
    pub extent: StarExtent,
}

impl Star {
    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Self {
            x,
            y,
            extent: StarExtent::Radius(radius),
        }
    }

    /// Whether pixel `(col, row)` lies within the star, grown by `margin`.
    pub fn covers(&self, col: usize, row: usize, margin: f64) -> bool {
        let dx = col as f64 - self.x;
        let dy = row as f64 - self.y;
        match self.extent {
            StarExtent::Radius(r) => {
                let r = r.max(0.0) + margin;
                dx * dx + dy * dy <= r * r
            }
            StarExtent::Rect {
                half_width,
                half_height,
            } => dx.abs() <= half_width.max(0.0) + margin && dy.abs() <= half_height.max(0.0) + margin,
        }
    }

    /// Inclusive pixel bounds `(col0, row0, col1, row1)` clipped to the image,
    /// or `None` when the star lies entirely outside it.
    fn pixel_bounds(&self, height: usize, width: usize, margin: f64) -> Option<(usize, usize, usize, usize)> {
        let (hw, hh) = match self.extent {
            StarExtent::Radius(r) => (r.max(0.0) + margin, r.max(0.0) + margin),
            StarExtent::Rect {
                half_width,
                half_height,
            } => (half_width.max(0.0) + margin, half_height.max(0.0) + margin),
        };
        let c0 = (self.x - hw).ceil().max(0.0);
        let r0 = (self.y - hh).ceil().max(0.0);
        let c1 = (self.x + hw).floor().min(width as f64 - 1.0);
        let r1 = (self.y + hh).floor().min(height as f64 - 1.0);
        if !(c0 <= c1 && r0 <= r1) {
            return None;
        }
        Some((c0 as usize, r0 as usize, c1 as usize, r1 as usize))
    }
}

/// Ordered list of stars detected on one light frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StarList {
    pub stars: Vec<Star>,
}

impl StarList {
    pub fn new(stars: Vec<Star>) -> Self {
        Self { stars }
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }

    pub fn contains(&self, col: usize, row: usize, margin: f64) -> bool {
        self.stars.iter().any(|s| s.covers(col, row, margin))
    }

    /// Rasterize every star extent into a `(height, width)` mask.
    /// `true` marks a pixel that belongs to a star.
    pub fn protection_mask(&self, height: usize, width: usize, margin: f64) -> Array2<bool> {
        let mut mask = Array2::from_elem((height, width), false);
        if height == 0 || width == 0 {
            return mask;
        }
        for star in &self.stars {
            let Some((c0, r0, c1, r1)) = star.pixel_bounds(height, width, margin) else {
                continue;
            };
            for row in r0..=r1 {
                for col in c0..=c1 {
                    if star.covers(col, row, margin) {
                        mask[[row, col]] = true;
                    }
                }
            }
        }
        mask
    }
}

impl FromIterator<Star> for StarList {
    fn from_iter<I: IntoIterator<Item = Star>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
