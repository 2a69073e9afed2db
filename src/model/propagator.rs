//! # Krylov Propagation of the Coalescence CDF
//!
//! Computes `P(., t_k) = exp(t_k Q) e_N` over the quadrature time grid,
//! where `e_N` indicates the absorbing state; row s of P is then the CDF of
//! the coalescence time for the pair state s.
//!
//! Two methods are provided. `sidje` walks the time grid in order, building
//! a fresh Krylov basis at every step rooted at the current probability
//! vector, with early termination on a small Lanczos residual (the expokit
//! `expv` scheme). It is the production path and strictly sequential.
//! `global_krylov` factorizes Q once from `e_N` and exponentiates the
//! projected Hessenberg block per time point; the per-point exponentials
//! are independent and evaluated in parallel. It loses accuracy for large
//! abscissae and is kept for cross-checks and small problems.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::error::{MigsurfError, Result};
use crate::model::ctmc::Generator;
use crate::model::pade::padm;
use crate::utils::PropagatorWorkspace;

/// Residual threshold for the happy-breakdown test in `sidje`
pub const BTOL: f64 = 1e-5;

/// Residual threshold declaring an exactly invariant subspace
const BREAKDOWN_TOL: f64 = 1e-12;

/// Krylov-subspace propagator over a fixed time grid
#[derive(Debug, Clone)]
pub struct Propagator {
    krylov_dim: usize,
}

impl Propagator {
    pub fn new(krylov_dim: usize) -> Self {
        debug_assert!(krylov_dim >= 2);
        Self { krylov_dim }
    }

    pub fn krylov_dim(&self) -> usize {
        self.krylov_dim
    }

    /// Adaptive-stepping propagation (method b).
    ///
    /// `times` must be ascending and positive; on success `ws.probs`
    /// column k holds `exp(times[k] Q) e_N`.
    pub fn sidje(
        &self,
        gen: &Generator,
        times: &[f64],
        ws: &mut PropagatorWorkspace,
    ) -> Result<()> {
        let n = gen.n_states();
        let m = self.krylov_dim.min(n);
        debug_assert!(ws.basis.nrows() == n && ws.basis.ncols() > m);
        debug_assert!(ws.probs.ncols() >= times.len());

        ws.w.fill(0.0);
        ws.w[gen.absorbing()] = 1.0;
        let mut beta = 1.0;

        let mut t_prev = 0.0;
        for (step, &t) in times.iter().enumerate() {
            let dt = t - t_prev;
            t_prev = t;

            ws.basis.fill(0.0);
            ws.hess.fill(0.0);
            ws.basis.column_mut(0).copy_from(&ws.w);
            ws.basis.column_mut(0).unscale_mut(beta);

            // Arnoldi from the current probability vector
            let mut k1 = 2usize;
            let mut mb = m;
            for j in 0..m {
                ws.q.copy_from(&ws.basis.column(j));
                gen.apply(&ws.q, &mut ws.p);
                for i in 0..=j {
                    let hij = ws.basis.column(i).dot(&ws.p);
                    ws.hess[(i, j)] = hij;
                    ws.p.axpy(-hij, &ws.basis.column(i), 1.0);
                }
                let s = ws.p.norm();
                if s < BTOL && j > 1 {
                    // happy breakdown: columns 0..=j already span the step
                    k1 = 0;
                    mb = j + 1;
                    break;
                }
                if s == 0.0 {
                    return Err(MigsurfError::numeric(
                        "Krylov breakdown before the basis reached dimension two",
                    ));
                }
                ws.hess[(j + 1, j)] = s;
                ws.p.unscale_mut(s);
                ws.basis.column_mut(j + 1).copy_from(&ws.p);
            }
            if k1 != 0 {
                ws.hess[(m + 1, m)] = 1.0;
            }

            // Exponentiate the (augmented) Hessenberg block and contract
            let mx = mb + k1;
            let ht = ws.hess.view((0, 0), (mx, mx)) * dt;
            let f = padm(&ht)?;
            let mxv = mb + k1.saturating_sub(1);
            let fcol = DVector::from_fn(mxv, |i, _| beta * f[(i, 0)]);
            ws.w.gemv(1.0, &ws.basis.columns(0, mxv), &fcol, 0.0);

            beta = ws.w.norm();
            if !beta.is_finite() || beta == 0.0 {
                return Err(MigsurfError::numeric(format!(
                    "propagated vector norm became {beta} at t = {t}"
                )));
            }
            ws.probs.column_mut(step).copy_from(&ws.w);
        }
        Ok(())
    }

    /// Single global Krylov factorization (method a).
    ///
    /// Builds one Arnoldi basis from `e_N` and evaluates every time point
    /// through the same projection, in parallel.
    pub fn global_krylov(
        &self,
        gen: &Generator,
        times: &[f64],
        ws: &mut PropagatorWorkspace,
    ) -> Result<()> {
        let n = gen.n_states();
        let m = self.krylov_dim.min(n);
        debug_assert!(ws.basis.nrows() == n && ws.basis.ncols() > m);

        ws.basis.fill(0.0);
        ws.hess.fill(0.0);
        ws.basis[(gen.absorbing(), 0)] = 1.0;

        let mut m_eff = m;
        for j in 0..m {
            ws.q.copy_from(&ws.basis.column(j));
            gen.apply(&ws.q, &mut ws.p);
            for i in 0..=j {
                let hij = ws.basis.column(i).dot(&ws.p);
                ws.hess[(i, j)] = hij;
                ws.p.axpy(-hij, &ws.basis.column(i), 1.0);
            }
            if j + 1 == m {
                break;
            }
            let s = ws.p.norm();
            if s < BREAKDOWN_TOL {
                // invariant subspace found; the projection is exact
                m_eff = j + 1;
                break;
            }
            ws.hess[(j + 1, j)] = s;
            ws.p.unscale_mut(s);
            ws.basis.column_mut(j + 1).copy_from(&ws.p);
        }

        let h = ws.hess.view((0, 0), (m_eff, m_eff)).clone_owned();
        let basis = ws.basis.columns(0, m_eff);

        // The start vector is e_N with unit norm, so V^T e_N = e_1 and each
        // column is V exp(t H) e_1
        let columns: Result<Vec<(usize, DVector<f64>)>> = times
            .par_iter()
            .enumerate()
            .map(|(k, &t)| {
                let e = padm(&(&h * t))?;
                let e1 = e.column(0).clone_owned();
                let mut col = DVector::zeros(n);
                col.gemv(1.0, &basis, &e1, 0.0);
                Ok((k, col))
            })
            .collect();

        for (k, col) in columns? {
            ws.probs.column_mut(k).copy_from(&col);
        }
        Ok(())
    }
}

/// Reference propagation through the dense generator; quadratic storage,
/// for tests and small problems only.
pub fn dense_reference(gen: &Generator, times: &[f64]) -> Result<DMatrix<f64>> {
    let a = gen.to_dense();
    let n = gen.n_states();
    let mut probs = DMatrix::zeros(n, times.len());
    for (k, &t) in times.iter().enumerate() {
        let e = padm(&(&a * t))?;
        probs.column_mut(k).copy_from(&e.column(n - 1));
    }
    Ok(probs)
}
