//! # Habitat Polygon
//!
//! The habitat is a closed polygon in the plane. It supports membership
//! tests (ray casting), area computation (shoelace) and uniform sampling of
//! interior points (rejection from the bounding box). Immutable after
//! construction.

use rand::Rng;

use crate::error::{MigsurfError, Result};

/// A closed polygonal habitat
#[derive(Debug, Clone)]
pub struct Habitat {
    /// Polygon vertices in order; the ring is treated as closed whether or
    /// not the last vertex repeats the first
    ring: Vec<[f64; 2]>,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    area: f64,
}

impl Habitat {
    /// Build a habitat from polygon vertices.
    ///
    /// A trailing vertex equal to the first is dropped; at least three
    /// distinct vertices are required.
    pub fn new(mut ring: Vec<[f64; 2]>) -> Result<Self> {
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        if ring.len() < 3 {
            return Err(MigsurfError::config(
                "habitat polygon needs at least three vertices",
            ));
        }

        let (mut xmin, mut xmax) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut ymin, mut ymax) = (f64::INFINITY, f64::NEG_INFINITY);
        for &[x, y] in &ring {
            xmin = xmin.min(x);
            xmax = xmax.max(x);
            ymin = ymin.min(y);
            ymax = ymax.max(y);
        }

        // Shoelace formula; orientation-independent
        let n = ring.len();
        let mut twice_area = 0.0;
        for i in 0..n {
            let [x0, y0] = ring[i];
            let [x1, y1] = ring[(i + 1) % n];
            twice_area += x0 * y1 - x1 * y0;
        }
        let area = 0.5 * twice_area.abs();
        if area <= 0.0 {
            return Err(MigsurfError::config("habitat polygon has zero area"));
        }

        Ok(Self {
            ring,
            xmin,
            xmax,
            ymin,
            ymax,
            area,
        })
    }

    /// Axis-aligned rectangle helper, mostly for tests
    pub fn rectangle(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        Self::new(vec![
            [xmin, ymin],
            [xmax, ymin],
            [xmax, ymax],
            [xmin, ymax],
        ])
    }

    /// Polygon area
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Even-odd ray-casting membership test
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if x < self.xmin || x > self.xmax || y < self.ymin || y > self.ymax {
            return false;
        }
        let n = self.ring.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = self.ring[i];
            let [xj, yj] = self.ring[j];
            if (yi > y) != (yj > y) {
                let x_cross = (xj - xi) * (y - yi) / (yj - yi) + xi;
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Sample a point uniformly from the habitat interior
    pub fn sample_point<R: Rng>(&self, rng: &mut R) -> [f64; 2] {
        loop {
            let x = rng.random_range(self.xmin..self.xmax);
            let y = rng.random_range(self.ymin..self.ymax);
            if self.contains(x, y) {
                return [x, y];
            }
        }
    }
}
