// solution.rs — The stencil solution: grids, equations, configuration
//
// A solution is built incrementally during a definition phase (new_grid,
// add_equation, set_element_bytes) and then handed, read-only, to any
// number of formatter invocations.
//
// Preconditions: none.
// Postconditions: grids are unique by name and agree on dimension kinds;
//                 at most one step dimension is in use; every equation
//                 refers only to registered grids.
// Failure modes: see `StencilError`; a failed call leaves the solution
//                unchanged.
// Side effects: advisory text on the debug sink; tracing events.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::dims::{DimKind, Dimension};
use crate::equation::Equation;
use crate::error::{Result, StencilError};
use crate::expr::Expr;
use crate::format::{CodegenOptions, FormatRegistry};
use crate::grid::{GridVar, PointRef};
use crate::output::{NullOutput, Output};

/// Element width used until `set_element_bytes` is called.
pub const DEFAULT_ELEMENT_BYTES: u32 = 4;

pub struct Solution {
    name: String,
    dims: IndexMap<String, Dimension>,
    grids: IndexMap<String, Rc<GridVar>>,
    equations: Vec<Equation>,
    element_bytes: u32,
    debug_sink: RefCell<Box<dyn Output>>,
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solution")
            .field("name", &self.name)
            .field("grids", &self.grids.keys().collect::<Vec<_>>())
            .field("equations", &self.equations.len())
            .field("element_bytes", &self.element_bytes)
            .finish()
    }
}

impl Solution {
    pub fn new(name: impl Into<String>) -> Self {
        Solution {
            name: name.into(),
            dims: IndexMap::new(),
            grids: IndexMap::new(),
            equations: Vec::new(),
            element_bytes: DEFAULT_ELEMENT_BYTES,
            debug_sink: RefCell::new(Box::new(NullOutput)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Grids ──

    /// Declare a grid over `dims` and register it in this solution.
    pub fn new_grid(&mut self, name: impl Into<String>, dims: &[Dimension]) -> Result<Rc<GridVar>> {
        let name = name.into();
        if self.grids.contains_key(&name) {
            return Err(StencilError::DuplicateName {
                name,
                solution: self.name.clone(),
            });
        }

        let grid = GridVar::new(name, dims.to_vec())?;
        self.check_dims(&grid)?;

        for dim in grid.dims() {
            self.dims
                .entry(dim.name().to_string())
                .or_insert_with(|| dim.clone());
        }
        let grid = Rc::new(grid);
        self.grids.insert(grid.name().to_string(), Rc::clone(&grid));

        debug!(solution = %self.name, grid = %grid, "grid registered");
        self.debug_line(&format!("Grid {grid} declared."));
        Ok(grid)
    }

    fn check_dims(&self, grid: &GridVar) -> Result<()> {
        for dim in grid.dims() {
            if let Some(existing) = self.dims.get(dim.name()) {
                if existing.kind() != dim.kind() {
                    return Err(StencilError::DimensionConflict {
                        name: dim.name().to_string(),
                        existing: existing.kind(),
                        requested: dim.kind(),
                    });
                }
            } else if dim.is_step() {
                if let Some(step) = self.step_dim() {
                    return Err(StencilError::InvalidDimensions {
                        grid: grid.name().to_string(),
                        reason: format!(
                            "solution already uses step dimension '{}', cannot add '{}'",
                            step.name(),
                            dim.name()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn num_grids(&self) -> usize {
        self.grids.len()
    }

    /// Grids in declaration order.
    pub fn grids(&self) -> impl Iterator<Item = &Rc<GridVar>> {
        self.grids.values()
    }

    pub fn grid(&self, name: &str) -> Option<&Rc<GridVar>> {
        self.grids.get(name)
    }

    // ── Dimensions ──

    pub fn step_dim(&self) -> Option<&Dimension> {
        self.dims.values().find(|d| d.is_step())
    }

    /// Domain dimensions in order of first appearance.
    pub fn domain_dims(&self) -> Vec<&Dimension> {
        self.dims
            .values()
            .filter(|d| d.kind() == DimKind::Domain)
            .collect()
    }

    // ── Equations ──

    /// Register an equation. Every grid it references must belong to this
    /// solution.
    pub fn add_equation(&mut self, equation: Equation) -> Result<()> {
        for point in equation.points() {
            let grid = point.grid();
            match self.grids.get(grid.name()) {
                Some(registered) if **registered == **grid => {}
                _ => {
                    return Err(StencilError::UnknownGrid {
                        name: grid.name().to_string(),
                        solution: self.name.clone(),
                    })
                }
            }
        }

        let index = self.equations.len();
        debug!(solution = %self.name, index, equation = %equation, "equation registered");
        self.debug_line(&format!("Equation {index}: {equation}"));
        self.equations.push(equation);
        Ok(())
    }

    /// Build an equation and register it in one step.
    pub fn new_equation(&mut self, lhs: PointRef, rhs: impl Into<Expr>) -> Result<&Equation> {
        self.add_equation(Equation::new(lhs, rhs)?)?;
        Ok(&self.equations[self.equations.len() - 1])
    }

    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    pub fn equation(&self, index: usize) -> Result<&Equation> {
        self.equations
            .get(index)
            .ok_or(StencilError::IndexOutOfRange {
                index,
                len: self.equations.len(),
            })
    }

    // ── Configuration ──

    pub fn element_bytes(&self) -> u32 {
        self.element_bytes
    }

    /// Set the floating-point element width: 4 (float) or 8 (double).
    pub fn set_element_bytes(&mut self, bytes: u32) -> Result<()> {
        if bytes != 4 && bytes != 8 {
            return Err(StencilError::UnsupportedWidth(bytes));
        }
        self.element_bytes = bytes;
        Ok(())
    }

    /// Route diagnostic text to `sink`. Advisory only.
    pub fn set_debug_output(&mut self, sink: impl Output + 'static) {
        self.debug_sink = RefCell::new(Box::new(sink));
    }

    pub(crate) fn debug_line(&self, text: &str) {
        let mut sink = self.debug_sink.borrow_mut();
        let written = sink
            .write_str(text)
            .and_then(|_| sink.write_str("\n"));
        if let Err(e) = written {
            warn!(solution = %self.name, error = %e, "debug output dropped");
        }
    }

    // ── Formatting ──

    /// Render this solution with the built-in format `id` into `sink`.
    pub fn format(&self, id: &str, sink: &mut dyn Output) -> Result<()> {
        let registry = FormatRegistry::with_builtins(CodegenOptions::default());
        self.format_with(&registry, id, sink)
    }

    /// Render with a caller-provided registry. The artifact is fully
    /// rendered before anything is written, so a failure writes nothing.
    pub fn format_with(&self, registry: &FormatRegistry, id: &str, sink: &mut dyn Output) -> Result<()> {
        let formatter = registry.lookup(id)?;
        self.debug_line(&format!(
            "Formatting solution '{}' as '{}' ({}).",
            self.name,
            id,
            formatter.description()
        ));
        let text = formatter.render(self)?;
        sink.write_str(&text)?;
        sink.flush()?;
        info!(solution = %self.name, format = id, bytes = text.len(), "solution formatted");
        Ok(())
    }
}

/// Create an empty, named solution.
pub fn new_solution(name: impl Into<String>) -> Solution {
    Solution::new(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::{new_domain_index, new_step_index};
    use crate::expr::new_add_node;
    use crate::output::StringOutput;

    fn txy() -> Vec<Dimension> {
        vec![new_step_index("t"), new_domain_index("x"), new_domain_index("y")]
    }

    #[test]
    fn duplicate_grid_leaves_count_unchanged() {
        let mut soln = new_solution("s");
        soln.new_grid("g", &txy()).unwrap();
        let err = soln.new_grid("g", &txy()).unwrap_err();
        assert!(matches!(err, StencilError::DuplicateName { .. }));
        assert_eq!(soln.num_grids(), 1);
    }

    #[test]
    fn empty_dims_is_arity_error() {
        let mut soln = new_solution("s");
        assert!(matches!(
            soln.new_grid("g", &[]),
            Err(StencilError::Arity { .. })
        ));
        assert_eq!(soln.num_grids(), 0);
    }

    #[test]
    fn conflicting_dim_kinds_rejected() {
        let mut soln = new_solution("s");
        soln.new_grid("a", &txy()).unwrap();
        let err = soln
            .new_grid("b", &[new_domain_index("t"), new_domain_index("x")])
            .unwrap_err();
        assert!(matches!(err, StencilError::DimensionConflict { .. }));
        assert_eq!(soln.num_grids(), 1);
    }

    #[test]
    fn second_step_dim_rejected() {
        let mut soln = new_solution("s");
        soln.new_grid("a", &txy()).unwrap();
        let err = soln
            .new_grid("b", &[new_step_index("n"), new_domain_index("x")])
            .unwrap_err();
        assert!(matches!(err, StencilError::InvalidDimensions { .. }));
    }

    #[test]
    fn non_identifier_names_leave_solution_unchanged() {
        let mut soln = new_solution("s");
        soln.new_grid("u_next", &txy()).unwrap();
        let err = soln.new_grid("u-next", &txy()).unwrap_err();
        assert!(matches!(err, StencilError::InvalidName { what: "grid", .. }));
        let err = soln
            .new_grid("v", &[new_step_index("t"), new_domain_index("x y")])
            .unwrap_err();
        assert!(matches!(err, StencilError::InvalidName { what: "dimension", .. }));
        assert_eq!(soln.num_grids(), 1);
        assert!(soln.domain_dims().iter().all(|d| d.name() != "x y"));
        assert!(soln.grid("v").is_none());
    }

    #[test]
    fn dimension_queries() {
        let mut soln = new_solution("s");
        soln.new_grid("coef", &[new_domain_index("y")]).unwrap();
        soln.new_grid("u", &txy()).unwrap();
        assert_eq!(soln.step_dim().map(|d| d.name()), Some("t"));
        let domain: Vec<&str> = soln.domain_dims().iter().map(|d| d.name()).collect();
        assert_eq!(domain, vec!["y", "x"]);
        let names: Vec<&str> = soln.grids().map(|g| g.name()).collect();
        assert_eq!(names, vec!["coef", "u"]);
    }

    #[test]
    fn unknown_grid_in_equation() {
        let mut soln = new_solution("s");
        let u = soln.new_grid("u", &txy()).unwrap();
        let other = Rc::new(GridVar::new("v", txy()).unwrap());

        let eq = Equation::new(
            u.new_relative_grid_point(&[1, 0, 0]).unwrap(),
            other.new_relative_grid_point(&[0, 0, 0]).unwrap(),
        )
        .unwrap();
        assert!(matches!(
            soln.add_equation(eq),
            Err(StencilError::UnknownGrid { .. })
        ));
        assert_eq!(soln.num_equations(), 0);

        let foreign_lhs = Equation::new(other.new_relative_grid_point(&[1, 0, 0]).unwrap(), 1.0).unwrap();
        assert!(soln.add_equation(foreign_lhs).is_err());
    }

    #[test]
    fn equation_accessor_bounds() {
        let mut soln = new_solution("s");
        let u = soln.new_grid("u", &txy()).unwrap();
        soln.new_equation(
            u.new_relative_grid_point(&[1, 0, 0]).unwrap(),
            new_add_node(u.new_relative_grid_point(&[0, 1, 0]).unwrap(), 1),
        )
        .unwrap();
        assert!(soln.equation(0).is_ok());
        assert!(matches!(
            soln.equation(1),
            Err(StencilError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn element_width_validation() {
        let mut soln = new_solution("s");
        assert_eq!(soln.element_bytes(), DEFAULT_ELEMENT_BYTES);
        soln.set_element_bytes(8).unwrap();
        assert!(matches!(
            soln.set_element_bytes(2),
            Err(StencilError::UnsupportedWidth(2))
        ));
        assert_eq!(soln.element_bytes(), 8);
    }

    #[test]
    fn debug_output_is_captured() {
        let mut soln = new_solution("s");
        let log = StringOutput::new();
        soln.set_debug_output(log.clone());
        let u = soln.new_grid("u", &txy()).unwrap();
        soln.new_equation(u.new_relative_grid_point(&[1, 0, 0]).unwrap(), 0.0)
            .unwrap();
        let text = log.get_string();
        assert!(text.contains("Grid u(t, x, y) declared."));
        assert!(text.contains("Equation 0: u(t+1, x, y) EQUALS 0"));
    }

    #[test]
    fn unknown_format_writes_nothing() {
        let soln = new_solution("s");
        let mut out = StringOutput::new();
        let err = soln.format("vax", &mut out).unwrap_err();
        assert!(matches!(err, StencilError::UnsupportedTarget { .. }));
        assert_eq!(out.get_string(), "");
    }
}
