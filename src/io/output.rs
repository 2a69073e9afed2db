//! # Output Writing
//!
//! Accumulates thinned posterior samples and writes the chain directory:
//! one text file per accumulator, the fitted-versus-observed sharing
//! matrix, and the `lastState.txt` checkpoint used for resuming.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;

use crate::data::Tessellation;
use crate::error::{MigsurfError, Result};
use crate::io::input::read_table;
use crate::model::ChainState;

/// Thinned posterior samples, appended during the sampling phase
#[derive(Debug, Default)]
pub struct SampleLog {
    /// (mu_m, mu_q, s2_m, s2_q) per sample
    thetas: Vec<[f64; 4]>,
    /// (log-prior, log-likelihood) per sample
    pilogl: Vec<[f64; 2]>,
    /// Degrees of freedom per sample
    dfs: Vec<f64>,
    mtiles: Vec<usize>,
    qtiles: Vec<usize>,
    /// Per-tile effects, concatenated across samples
    mrates: Vec<f64>,
    qrates: Vec<f64>,
    /// m-tile seed coordinates, concatenated across samples
    xcoord: Vec<f64>,
    ycoord: Vec<f64>,
    /// q-tile seed coordinates, concatenated across samples
    wcoord: Vec<f64>,
    zcoord: Vec<f64>,
}

impl SampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded samples
    pub fn len(&self) -> usize {
        self.pilogl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pilogl.is_empty()
    }

    /// Snapshot the current state into every accumulator
    pub fn record(&mut self, state: &ChainState) {
        self.thetas.push([
            state.m_rate_mu,
            state.q_rate_mu,
            state.m_rate_s2,
            state.q_rate_s2,
        ]);
        self.pilogl.push([state.log_prior, state.log_lik]);
        self.dfs.push(state.df);
        self.mtiles.push(state.m_tess.n_tiles());
        self.qtiles.push(state.q_tess.n_tiles());
        self.mrates.extend_from_slice(&state.m_tess.effects);
        self.qrates.extend_from_slice(&state.q_tess.effects);
        for &[x, y] in &state.m_tess.seeds {
            self.xcoord.push(x);
            self.ycoord.push(y);
        }
        for &[w, z] in &state.q_tess.seeds {
            self.wcoord.push(w);
            self.zcoord.push(z);
        }
    }

    /// Write every accumulator file into the chain directory
    pub fn write_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        write_rows(&dir.join("mcmcthetas.txt"), &self.thetas)?;
        write_rows(&dir.join("mcmcpilogl.txt"), &self.pilogl)?;
        write_scalars(&dir.join("mcmcdfs.txt"), &self.dfs)?;
        write_scalars(&dir.join("mcmcmtiles.txt"), &self.mtiles)?;
        write_scalars(&dir.join("mcmcqtiles.txt"), &self.qtiles)?;
        write_scalars(&dir.join("mcmcmrates.txt"), &self.mrates)?;
        write_scalars(&dir.join("mcmcqrates.txt"), &self.qrates)?;
        write_scalars(&dir.join("mcmcxcoord.txt"), &self.xcoord)?;
        write_scalars(&dir.join("mcmcycoord.txt"), &self.ycoord)?;
        write_scalars(&dir.join("mcmcwcoord.txt"), &self.wcoord)?;
        write_scalars(&dir.join("mcmczcoord.txt"), &self.zcoord)?;
        Ok(())
    }
}

fn write_rows<const N: usize>(path: &Path, rows: &[[f64; N]]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(w, "{}", line.join(" "))?;
    }
    Ok(())
}

fn write_scalars<T: ToString>(path: &Path, values: &[T]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    for v in values {
        writeln!(w, "{}", v.to_string())?;
    }
    Ok(())
}

/// Write the observed mean sharing and the fitted expected sharing side by
/// side: O rows, 2 O columns.
pub fn write_fitted_sharing(
    dir: &Path,
    observed_mean: &DMatrix<f64>,
    fitted: &DMatrix<f64>,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    let o = observed_mean.nrows();
    let mut w = BufWriter::new(File::create(dir.join("rdistJtDobsJtDhatJ.txt"))?);
    for i in 0..o {
        let mut fields = Vec::with_capacity(2 * o);
        for j in 0..o {
            fields.push(observed_mean[(i, j)].to_string());
        }
        for j in 0..o {
            fields.push(fitted[(i, j)].to_string());
        }
        writeln!(w, "{}", fields.join(" "))?;
    }
    Ok(())
}

/// Write the resume checkpoint.
///
/// Format: one header line `df mu_m mu_q s2_m s2_q log_prior log_lik`, then
/// the m tessellation (tile count, then `x y effect` rows), then the q
/// tessellation. Full float precision, round-trip safe.
pub fn write_checkpoint(dir: &Path, state: &ChainState) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut w = BufWriter::new(File::create(dir.join("lastState.txt"))?);
    writeln!(
        w,
        "{} {} {} {} {} {} {}",
        state.df,
        state.m_rate_mu,
        state.q_rate_mu,
        state.m_rate_s2,
        state.q_rate_s2,
        state.log_prior,
        state.log_lik
    )?;
    for tess in [&state.m_tess, &state.q_tess] {
        writeln!(w, "{}", tess.n_tiles())?;
        for (seed, effect) in tess.seeds.iter().zip(&tess.effects) {
            writeln!(w, "{} {} {}", seed[0], seed[1], effect)?;
        }
    }
    Ok(())
}

/// Load a checkpoint written by [`write_checkpoint`]; colors are
/// recomputed against the given deme coordinates.
pub fn load_checkpoint(path: &Path, demes: &[[f64; 2]]) -> Result<ChainState> {
    let rows = read_table(path)?;
    let mut iter = rows.into_iter();

    let header = iter
        .next()
        .ok_or_else(|| MigsurfError::parse(1, "empty checkpoint"))?;
    if header.len() != 7 {
        return Err(MigsurfError::parse(
            1,
            format!("expected 7 header fields, found {}", header.len()),
        ));
    }

    let mut read_tess = |iter: &mut dyn Iterator<Item = Vec<f64>>| -> Result<Tessellation> {
        let count_row = iter
            .next()
            .ok_or_else(|| MigsurfError::parse(0, "missing tile count"))?;
        if count_row.len() != 1 || count_row[0].fract() != 0.0 || count_row[0] < 1.0 {
            return Err(MigsurfError::parse(0, "malformed tile count"));
        }
        let tiles = count_row[0] as usize;
        let mut seeds = Vec::with_capacity(tiles);
        let mut effects = Vec::with_capacity(tiles);
        for _ in 0..tiles {
            let row = iter
                .next()
                .ok_or_else(|| MigsurfError::parse(0, "truncated tessellation block"))?;
            if row.len() != 3 {
                return Err(MigsurfError::parse(
                    0,
                    format!("expected 3 tile fields, found {}", row.len()),
                ));
            }
            seeds.push([row[0], row[1]]);
            effects.push(row[2]);
        }
        Ok(Tessellation::new(seeds, effects, demes))
    };

    let m_tess = read_tess(&mut iter)?;
    let q_tess = read_tess(&mut iter)?;

    Ok(ChainState {
        m_tess,
        q_tess,
        df: header[0],
        m_rate_mu: header[1],
        q_rate_mu: header[2],
        m_rate_s2: header[3],
        q_rate_s2: header[4],
        log_prior: header[5],
        log_lik: header[6],
    })
}
