//! # Voronoi Tessellation
//!
//! A tessellation partitions the habitat into tiles, one per seed, and
//! attaches a bounded log-scale effect to each tile. Deme colors (the
//! nearest-seed assignment) are a cache, recomputed whenever seeds change;
//! tile identities are plain indices into the seed/effect vectors.

/// Voronoi tessellation with one scalar effect per tile
#[derive(Debug, Clone, PartialEq)]
pub struct Tessellation {
    /// Tile centers, all inside the habitat
    pub seeds: Vec<[f64; 2]>,
    /// Per-tile log-scale perturbations, bounded by the effect half interval
    pub effects: Vec<f64>,
    /// Nearest-seed assignment of each deme; ties go to the smaller index
    pub colors: Vec<u32>,
}

impl Tessellation {
    /// Build a tessellation and color the given demes
    pub fn new(seeds: Vec<[f64; 2]>, effects: Vec<f64>, demes: &[[f64; 2]]) -> Self {
        debug_assert_eq!(seeds.len(), effects.len());
        let mut tess = Self {
            seeds,
            effects,
            colors: vec![0; demes.len()],
        };
        tess.assign_colors(demes);
        tess
    }

    /// Number of tiles
    pub fn n_tiles(&self) -> usize {
        self.seeds.len()
    }

    /// Recompute the nearest-seed assignment for every deme.
    ///
    /// Strictly-closer comparison with ascending tile order, so ties break
    /// toward the smallest tile index.
    pub fn assign_colors(&mut self, demes: &[[f64; 2]]) {
        self.colors.resize(demes.len(), 0);
        for (d, &[x, y]) in demes.iter().enumerate() {
            let mut best = 0u32;
            let mut best_d2 = f64::INFINITY;
            for (k, &[sx, sy]) in self.seeds.iter().enumerate() {
                let d2 = (x - sx) * (x - sx) + (y - sy) * (y - sy);
                if d2 < best_d2 {
                    best_d2 = d2;
                    best = k as u32;
                }
            }
            self.colors[d] = best;
        }
    }

    /// Append a tile and recolor
    pub fn birth(&mut self, seed: [f64; 2], effect: f64, demes: &[[f64; 2]]) {
        self.seeds.push(seed);
        self.effects.push(effect);
        self.assign_colors(demes);
    }

    /// Remove the tile at `index` and recolor. Callers must not remove the
    /// last tile.
    pub fn death(&mut self, index: usize, demes: &[[f64; 2]]) {
        debug_assert!(self.n_tiles() > 1);
        self.seeds.remove(index);
        self.effects.remove(index);
        self.assign_colors(demes);
    }

    /// Sum of squared effects, used by the variance Gibbs update
    pub fn sum_sq_effects(&self) -> f64 {
        self.effects.iter().map(|e| e * e).sum()
    }
}
