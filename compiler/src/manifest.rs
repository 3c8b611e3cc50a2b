// manifest.rs — Canonical, serializable description of a solution
//
// The manifest is what the `json` format prints and what the solution
// fingerprint hashes. Field order and contents are fixed so that the
// fingerprint only changes when the stencil itself changes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::dims::Dimension;
use crate::error::Result;
use crate::solution::Solution;

#[derive(Debug, Clone, Serialize)]
pub struct SolutionManifest {
    pub name: String,
    pub element_bytes: u32,
    pub step_dim: Option<String>,
    pub domain_dims: Vec<String>,
    pub grids: Vec<GridManifest>,
    pub equations: Vec<EquationManifest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridManifest {
    pub name: String,
    pub dims: Vec<Dimension>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EquationManifest {
    pub index: usize,
    pub lhs: String,
    pub rhs: String,
    pub lhs_step_offset: Option<i64>,
    pub num_points: usize,
}

impl SolutionManifest {
    pub fn from_solution(solution: &Solution) -> Self {
        SolutionManifest {
            name: solution.name().to_string(),
            element_bytes: solution.element_bytes(),
            step_dim: solution.step_dim().map(|d| d.name().to_string()),
            domain_dims: solution
                .domain_dims()
                .iter()
                .map(|d| d.name().to_string())
                .collect(),
            grids: solution
                .grids()
                .map(|g| GridManifest {
                    name: g.name().to_string(),
                    dims: g.dims().to_vec(),
                })
                .collect(),
            equations: solution
                .equations()
                .iter()
                .enumerate()
                .map(|(index, eq)| EquationManifest {
                    index,
                    lhs: eq.lhs().format_simple(),
                    rhs: eq.rhs().format_simple(),
                    lhs_step_offset: eq.lhs().step_offset(),
                    num_points: eq.points().len(),
                })
                .collect(),
        }
    }

    /// Compact JSON with no whitespace; the fingerprint input.
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// SHA-256 of the canonical manifest, as 64 hex characters.
pub fn fingerprint(solution: &Solution) -> Result<String> {
    let canonical = SolutionManifest::from_solution(solution).canonical_json()?;
    Ok(sha256_hex(canonical.as_bytes()))
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(bytes);
    let mut s = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(s, "{:02x}", b);
    }
    s
}
