// equation.rs — Stencil equations
//
// An equation defines one grid point at a later step from an expression
// over earlier steps. The causality rule is checked at construction: the
// LHS step offset must be strictly greater than every step offset read by
// the RHS. References to grids without a step dimension (coefficients,
// masks) do not participate.

use std::fmt;

use crate::error::{Result, StencilError};
use crate::expr::Expr;
use crate::grid::PointRef;

#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    lhs: PointRef,
    rhs: Expr,
}

impl Equation {
    pub fn new(lhs: PointRef, rhs: impl Into<Expr>) -> Result<Self> {
        let rhs = rhs.into();
        let render = || format!("{} EQUALS {}", lhs.format_simple(), rhs.format_simple());

        let Some(lhs_step) = lhs.step_offset() else {
            return Err(StencilError::Causality {
                equation: render(),
                reason: format!("grid '{}' has no step dimension", lhs.grid().name()),
            });
        };

        if let Some(max_rhs) = rhs.max_step_offset() {
            if lhs_step <= max_rhs {
                return Err(StencilError::Causality {
                    equation: render(),
                    reason: format!(
                        "LHS step offset {lhs_step} is not later than RHS step offset {max_rhs}"
                    ),
                });
            }
        }

        Ok(Equation { lhs, rhs })
    }

    pub fn lhs(&self) -> &PointRef {
        &self.lhs
    }

    pub fn rhs(&self) -> &Expr {
        &self.rhs
    }

    /// Every point referenced by the equation, LHS first.
    pub fn points(&self) -> Vec<&PointRef> {
        let mut pts = vec![&self.lhs];
        pts.extend(self.rhs.points());
        pts
    }

    /// Render as `lhs EQUALS rhs`.
    pub fn format_simple(&self) -> String {
        format!("{} EQUALS {}", self.lhs.format_simple(), self.rhs.format_simple())
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_simple())
    }
}

/// Equate `lhs` to `rhs`, enforcing the causality rule.
pub fn new_equation_node(lhs: PointRef, rhs: impl Into<Expr>) -> Result<Equation> {
    Equation::new(lhs, rhs)
}
