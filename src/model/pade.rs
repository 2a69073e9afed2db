//! # Pade Matrix Exponential
//!
//! Scaled-and-squared Pade(6,6) approximation of exp(H) for the small dense
//! Hessenberg blocks produced by the Krylov projection. Follows the expokit
//! `padm` recurrence: Horner evaluation of the even/odd power split, one LU
//! solve, then repeated squaring.

use nalgebra::DMatrix;

use crate::error::{MigsurfError, Result};

/// Pade order; (6,6) is the expokit-recommended degree
const P: usize = 6;

/// Compute exp(h) for a small square matrix.
pub fn padm(h: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = h.nrows();
    debug_assert_eq!(n, h.ncols());

    // Pade coefficients c_k = c_{k-1} * (p+1-k) / (k (2p+1-k))
    let mut c = [0.0f64; P + 1];
    c[0] = 1.0;
    for k in 1..=P {
        c[k] = c[k - 1] * (P + 1 - k) as f64 / (k * (2 * P + 1 - k)) as f64;
    }

    // Scale by a power of two so the infinity norm drops below 1/2
    let norm = h
        .row_iter()
        .map(|row| row.iter().map(|x| x.abs()).sum::<f64>())
        .fold(0.0f64, f64::max);
    let mut h = h.clone();
    let mut squarings = 0u32;
    if norm > 0.5 {
        squarings = (norm.log2().floor() + 2.0).max(0.0) as u32;
        h.scale_mut(2f64.powi(-(squarings as i32)));
    }

    // Horner evaluation of the irreducible fraction, splitting even and odd
    // powers between q and p
    let eye = DMatrix::<f64>::identity(n, n);
    let h2 = &h * &h;
    let mut q = &eye * c[P];
    let mut p = &eye * c[P - 1];
    let mut odd = true;
    for k in (1..P).rev() {
        if odd {
            q = &q * &h2 + &eye * c[k - 1];
        } else {
            p = &p * &h2 + &eye * c[k - 1];
        }
        odd = !odd;
    }

    let mut e = if odd {
        q = &q * &h;
        q -= &p;
        let x = q
            .lu()
            .solve(&p)
            .ok_or_else(|| MigsurfError::numeric("singular Pade denominator"))?;
        -(eye + 2.0 * x)
    } else {
        p = &p * &h;
        q -= &p;
        let x = q
            .lu()
            .solve(&p)
            .ok_or_else(|| MigsurfError::numeric("singular Pade denominator"))?;
        eye + 2.0 * x
    };

    for _ in 0..squarings {
        e = &e * &e;
    }
    Ok(e)
}
