//! # Deme Graph
//!
//! The triangulated habitat graph: deme coordinates, an undirected edge
//! list kept as adjacency lists, and the subset of demes that carry
//! samples. Immutable after construction.

use crate::error::{MigsurfError, Result};

/// Triangulated deme graph over the habitat interior
#[derive(Debug, Clone)]
pub struct Graph {
    /// Deme coordinates, one row per deme
    coords: Vec<[f64; 2]>,
    /// Neighbor lists; edge (u, v) appears in both lists
    neighbors: Vec<Vec<u32>>,
    /// Undirected edge list with u < v, in input order
    edges: Vec<(u32, u32)>,
    /// Demes carrying samples, ascending
    observed: Vec<u32>,
    /// Deme index of each sampled individual
    sample_demes: Vec<u32>,
}

impl Graph {
    /// Assemble the graph from deme coordinates, an undirected edge list and
    /// the per-sample deme assignment.
    pub fn new(
        coords: Vec<[f64; 2]>,
        edge_list: &[(u32, u32)],
        sample_demes: Vec<u32>,
    ) -> Result<Self> {
        let d = coords.len();
        if d == 0 {
            return Err(MigsurfError::config("graph needs at least one deme"));
        }

        let mut neighbors = vec![Vec::new(); d];
        let mut edges = Vec::with_capacity(edge_list.len());
        for &(u, v) in edge_list {
            let (u, v) = if u <= v { (u, v) } else { (v, u) };
            if v as usize >= d {
                return Err(MigsurfError::config(format!(
                    "edge ({u}, {v}) references a deme outside 0..{d}"
                )));
            }
            if u == v {
                return Err(MigsurfError::config(format!("self-loop on deme {u}")));
            }
            neighbors[u as usize].push(v);
            neighbors[v as usize].push(u);
            edges.push((u, v));
        }

        for &deme in &sample_demes {
            if deme as usize >= d {
                return Err(MigsurfError::config(format!(
                    "sample assigned to deme {deme} outside 0..{d}"
                )));
            }
        }
        let mut observed: Vec<u32> = sample_demes.clone();
        observed.sort_unstable();
        observed.dedup();

        Ok(Self {
            coords,
            neighbors,
            edges,
            observed,
            sample_demes,
        })
    }

    /// Total number of demes
    pub fn n_demes(&self) -> usize {
        self.coords.len()
    }

    /// Number of observed (sampled) demes
    pub fn n_observed(&self) -> usize {
        self.observed.len()
    }

    /// Coordinates of one deme
    #[inline]
    pub fn coord(&self, deme: usize) -> [f64; 2] {
        self.coords[deme]
    }

    /// All deme coordinates
    pub fn coords(&self) -> &[[f64; 2]] {
        &self.coords
    }

    /// Neighbors of one deme
    #[inline]
    pub fn neighbors(&self, deme: usize) -> &[u32] {
        &self.neighbors[deme]
    }

    /// Undirected edge list (u < v)
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Observed demes, ascending
    pub fn observed(&self) -> &[u32] {
        &self.observed
    }

    /// Deme of each sampled individual, in sample order
    pub fn sample_demes(&self) -> &[u32] {
        &self.sample_demes
    }

    /// Position of a deme in the observed-deme list, if it carries samples
    pub fn observed_rank(&self, deme: u32) -> Option<usize> {
        self.observed.binary_search(&deme).ok()
    }

    /// Rectangular test grid: `rows x cols` demes at unit spacing with
    /// horizontal, vertical and down-right diagonal edges.
    pub fn grid(rows: usize, cols: usize, sample_demes: Vec<u32>) -> Result<Self> {
        let mut coords = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                coords.push([c as f64, r as f64]);
            }
        }
        let at = |r: usize, c: usize| (r * cols + c) as u32;
        let mut edge_list = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                if c + 1 < cols {
                    edge_list.push((at(r, c), at(r, c + 1)));
                }
                if r + 1 < rows {
                    edge_list.push((at(r, c), at(r + 1, c)));
                }
                if r + 1 < rows && c + 1 < cols {
                    edge_list.push((at(r, c), at(r + 1, c + 1)));
                }
            }
        }
        Self::new(coords, &edge_list, sample_demes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency_is_symmetric() {
        let g = Graph::grid(3, 3, vec![0, 4, 8]).unwrap();
        assert_eq!(g.n_demes(), 9);
        for u in 0..g.n_demes() {
            for &v in g.neighbors(u) {
                assert!(g.neighbors(v as usize).contains(&(u as u32)));
            }
        }
    }

    #[test]
    fn test_grid_edge_count() {
        // (cols-1)*rows horizontal + (rows-1)*cols vertical + (rows-1)*(cols-1) diagonal
        let g = Graph::grid(3, 4, vec![0]).unwrap();
        assert_eq!(g.edges().len(), 3 * 3 + 2 * 4 + 2 * 3);
    }

    #[test]
    fn test_observed_demes_sorted_dedup() {
        let g = Graph::grid(2, 2, vec![3, 1, 3, 1, 0]).unwrap();
        assert_eq!(g.observed(), &[0, 1, 3]);
        assert_eq!(g.observed_rank(3), Some(2));
        assert_eq!(g.observed_rank(2), None);
    }

    #[test]
    fn test_bad_edge_rejected() {
        let coords = vec![[0.0, 0.0], [1.0, 0.0]];
        assert!(Graph::new(coords.clone(), &[(0, 5)], vec![0]).is_err());
        assert!(Graph::new(coords, &[(1, 1)], vec![0]).is_err());
    }
}
