//! # Workspace Pattern for Propagator Buffers
//!
//! Pre-allocated matrices for the Krylov propagation and the expected
//! sharing computation, to avoid repeated allocations in the per-iteration
//! hot loop. Instead of storing mutable buffers inside the model structs
//! (which causes borrow checker issues), a separate workspace owns all
//! temporary storage and is passed as `&mut` to computation functions.

use nalgebra::{DMatrix, DVector};

/// Workspace for structured-coalescent propagation
#[derive(Debug)]
pub struct PropagatorWorkspace {
    /// Krylov basis, n_states x (m + 1)
    pub basis: DMatrix<f64>,
    /// Hessenberg projection with the augmentation row/column, (m+2) x (m+2)
    pub hess: DMatrix<f64>,
    /// Propagated coalescence CDF, n_states x n_quad
    pub probs: DMatrix<f64>,
    /// Expected pairwise sharing, n_demes x n_demes
    pub lambda: DMatrix<f64>,
    /// Current probability vector (n_states)
    pub w: DVector<f64>,
    /// Mat-vec scratch (n_states)
    pub p: DVector<f64>,
    /// Copy of the basis column being expanded (n_states)
    pub q: DVector<f64>,
}

impl PropagatorWorkspace {
    /// Allocate all buffers for the given problem size
    pub fn new(n_states: usize, krylov_dim: usize, n_quad: usize, n_demes: usize) -> Self {
        Self {
            basis: DMatrix::zeros(n_states, krylov_dim + 1),
            hess: DMatrix::zeros(krylov_dim + 2, krylov_dim + 2),
            probs: DMatrix::zeros(n_states, n_quad),
            lambda: DMatrix::zeros(n_demes, n_demes),
            w: DVector::zeros(n_states),
            p: DVector::zeros(n_states),
            q: DVector::zeros(n_states),
        }
    }

    /// Zero every buffer without releasing storage
    pub fn reset(&mut self) {
        self.basis.fill(0.0);
        self.hess.fill(0.0);
        self.probs.fill(0.0);
        self.lambda.fill(0.0);
        self.w.fill(0.0);
        self.p.fill(0.0);
        self.q.fill(0.0);
    }

    /// Krylov dimension this workspace was sized for
    pub fn krylov_dim(&self) -> usize {
        self.basis.ncols() - 1
    }

    /// Number of quadrature points this workspace was sized for
    pub fn n_quad(&self) -> usize {
        self.probs.ncols()
    }
}
