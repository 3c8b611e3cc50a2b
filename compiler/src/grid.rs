// grid.rs — Grid variables and relative point references
//
// A grid variable is a named, symbolic array over an ordered list of
// dimensions. It stores no values; it only hands out point references,
// each an offset vector relative to the current stencil application point.
//
// Preconditions: none.
// Postconditions: every GridVar has a non-empty, well-formed dim list;
//                 every PointRef has exactly one offset per grid dim.
// Failure modes: `InvalidName`, `Arity`, `InvalidDimensions`.
// Side effects: none.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::dims::Dimension;
use crate::error::{Result, StencilError};

// ── Grid variable ───────────────────────────────────────────────────────────

/// A named array indexed by an ordered, fixed list of dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridVar {
    name: String,
    dims: Vec<Dimension>,
}

impl GridVar {
    /// Validate and build a grid. Grid and dimension names must be C
    /// identifiers. The step dimension, if any, must come first; dimension
    /// names must be unique within the grid.
    pub fn new(name: impl Into<String>, dims: Vec<Dimension>) -> Result<Self> {
        let name = name.into();
        check_identifier("grid", &name)?;
        if dims.is_empty() {
            return Err(StencilError::Arity {
                name,
                expected: 1,
                actual: 0,
            });
        }

        let mut seen = HashSet::new();
        for (i, dim) in dims.iter().enumerate() {
            check_identifier("dimension", dim.name())?;
            if !seen.insert(dim.name()) {
                return Err(StencilError::InvalidDimensions {
                    grid: name,
                    reason: format!("dimension '{}' appears more than once", dim.name()),
                });
            }
            if dim.is_step() && i != 0 {
                return Err(StencilError::InvalidDimensions {
                    grid: name,
                    reason: format!("step dimension '{}' must be listed first", dim.name()),
                });
            }
        }

        Ok(GridVar { name, dims })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.name()).collect()
    }

    /// The step dimension, which is always at position 0 when present.
    pub fn step_dim(&self) -> Option<&Dimension> {
        self.dims.first().filter(|d| d.is_step())
    }

    /// Create a reference to the point at `offsets` from the current
    /// application point, one offset per dimension.
    pub fn new_relative_grid_point(self: &Rc<Self>, offsets: &[i64]) -> Result<PointRef> {
        if offsets.len() != self.dims.len() {
            return Err(StencilError::Arity {
                name: self.name.clone(),
                expected: self.dims.len(),
                actual: offsets.len(),
            });
        }
        Ok(PointRef {
            grid: Rc::clone(self),
            offsets: offsets.to_vec(),
        })
    }
}

impl fmt::Display for GridVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.dim_names().join(", "))
    }
}

// ── Point reference ─────────────────────────────────────────────────────────

/// One element of a grid at a relative offset. Leaf of the expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointRef {
    grid: Rc<GridVar>,
    offsets: Vec<i64>,
}

impl PointRef {
    pub fn grid(&self) -> &Rc<GridVar> {
        &self.grid
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Offset along the step dimension, if the grid has one.
    pub fn step_offset(&self) -> Option<i64> {
        self.grid.step_dim().map(|_| self.offsets[0])
    }

    /// Offset along the named dimension.
    pub fn offset_of(&self, dim: &str) -> Option<i64> {
        self.grid
            .dims()
            .iter()
            .position(|d| d.name() == dim)
            .map(|i| self.offsets[i])
    }

    /// `(dim, offset)` pairs in grid order.
    pub fn indexed_offsets(&self) -> impl Iterator<Item = (&Dimension, i64)> {
        self.grid.dims().iter().zip(self.offsets.iter().copied())
    }

    /// Render as `grid(t+1, x-1, y, z)`.
    pub fn format_simple(&self) -> String {
        let indices: Vec<String> = self
            .indexed_offsets()
            .map(|(dim, off)| offset_expr(dim.name(), off))
            .collect();
        format!("{}({})", self.grid.name(), indices.join(", "))
    }
}

impl fmt::Display for PointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_simple())
    }
}

/// `x`, `x+2`, or `x-1`.
/// Names end up verbatim in generated C++ and DOT ids.
fn check_identifier(what: &'static str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StencilError::InvalidName {
            what,
            name: name.to_string(),
        })
    }
}

pub(crate) fn offset_expr(dim: &str, offset: i64) -> String {
    match offset {
        0 => dim.to_string(),
        o if o > 0 => format!("{dim}+{o}"),
        o => format!("{dim}{o}"),
    }
}
