//! # Input Parsing
//!
//! Reads the line-delimited text inputs: sample coordinates, the habitat
//! outline and the pairwise shared-block matrix under `datapath`, and the
//! precomputed triangulation (deme coordinates, edge list, sample-to-deme
//! map) under `gridpath`. Indices in `.edges` and `.ipmap` are 1-based.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use nalgebra::DMatrix;

use crate::config::Config;
use crate::data::{Graph, Habitat, Observations};
use crate::error::{MigsurfError, Result};

/// Parse a whitespace-delimited numeric table, skipping blank lines
pub fn read_table(path: &Path) -> Result<Vec<Vec<f64>>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let row: Vec<f64> = trimmed
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| {
                    MigsurfError::parse(lineno + 1, format!("not a number: '{tok}'"))
                })
            })
            .collect::<Result<_>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read a two-column coordinate table
pub fn read_coords(path: &Path) -> Result<Vec<[f64; 2]>> {
    read_table(path)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != 2 {
                return Err(MigsurfError::parse(
                    i + 1,
                    format!("expected 2 columns, found {}", row.len()),
                ));
            }
            Ok([row[0], row[1]])
        })
        .collect()
}

/// Read a square matrix of the given size
pub fn read_square_matrix(path: &Path, n: usize) -> Result<DMatrix<f64>> {
    let rows = read_table(path)?;
    if rows.len() != n {
        return Err(MigsurfError::parse(
            rows.len(),
            format!("expected {n} rows, found {}", rows.len()),
        ));
    }
    let mut m = DMatrix::zeros(n, n);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n {
            return Err(MigsurfError::parse(
                i + 1,
                format!("expected {n} columns, found {}", row.len()),
            ));
        }
        for (j, &v) in row.iter().enumerate() {
            m[(i, j)] = v;
        }
    }
    Ok(m)
}

/// Read a 1-based edge list (`alpha beta` per line) into 0-based pairs
pub fn read_edges(path: &Path, n_demes: usize) -> Result<Vec<(u32, u32)>> {
    read_table(path)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != 2 {
                return Err(MigsurfError::parse(
                    i + 1,
                    format!("expected 2 columns, found {}", row.len()),
                ));
            }
            let parse_deme = |v: f64| -> Result<u32> {
                let idx = v as i64;
                if idx < 1 || idx as usize > n_demes || v.fract() != 0.0 {
                    return Err(MigsurfError::parse(
                        i + 1,
                        format!("deme index {v} outside 1..={n_demes}"),
                    ));
                }
                Ok((idx - 1) as u32)
            };
            Ok((parse_deme(row[0])?, parse_deme(row[1])?))
        })
        .collect()
}

/// Read the 1-based sample-to-deme assignment, one index per line
pub fn read_ipmap(path: &Path, n_demes: usize) -> Result<Vec<u32>> {
    read_table(path)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != 1 {
                return Err(MigsurfError::parse(
                    i + 1,
                    format!("expected 1 column, found {}", row.len()),
                ));
            }
            let v = row[0];
            let idx = v as i64;
            if idx < 1 || idx as usize > n_demes || v.fract() != 0.0 {
                return Err(MigsurfError::parse(
                    i + 1,
                    format!("deme index {v} outside 1..={n_demes}"),
                ));
            }
            Ok((idx - 1) as u32)
        })
        .collect()
}

/// All startup inputs assembled into core data structures
pub struct Dataset {
    pub habitat: Habitat,
    pub graph: Graph,
    pub observations: Observations,
    /// Sample coordinates, retained for reporting
    pub sample_coords: Vec<[f64; 2]>,
}

impl Dataset {
    /// Load and cross-validate every input file named by the configuration
    pub fn load(config: &Config) -> Result<Self> {
        let sample_coords = read_coords(&config.datapath.with_extension("coord"))?;
        if sample_coords.len() != config.n_indiv {
            return Err(MigsurfError::config(format!(
                "coord file has {} samples, nIndiv is {}",
                sample_coords.len(),
                config.n_indiv
            )));
        }

        let outline = read_coords(&config.datapath.with_extension("outer"))?;
        let habitat = Habitat::new(outline)?;

        let sims = read_square_matrix(&config.datapath.with_extension("sims"), config.n_indiv)?;

        let deme_coords = read_coords(&config.gridpath.with_extension("demes"))?;
        if deme_coords.len() != config.n_demes {
            return Err(MigsurfError::config(format!(
                "demes file has {} demes, nDemes is {}",
                deme_coords.len(),
                config.n_demes
            )));
        }
        let edges = read_edges(&config.gridpath.with_extension("edges"), config.n_demes)?;
        let ipmap = read_ipmap(&config.gridpath.with_extension("ipmap"), config.n_demes)?;
        if ipmap.len() != config.n_indiv {
            return Err(MigsurfError::config(format!(
                "ipmap assigns {} samples, nIndiv is {}",
                ipmap.len(),
                config.n_indiv
            )));
        }

        let graph = Graph::new(deme_coords, &edges, ipmap)?;
        let observations = Observations::from_sims(&sims, &graph, config.diploid)?;

        Ok(Self {
            habitat,
            graph,
            observations,
            sample_coords,
        })
    }
}
