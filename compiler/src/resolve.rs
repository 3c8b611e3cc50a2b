// resolve.rs — Build a Solution from a parsed stencil program
//
// Walks the AST in statement order, declares dimensions, grids, and
// equations on a fresh `Solution`, and reports diagnostics for unknown or
// duplicate names. Model-level failures (causality, dimension conflicts)
// come from the `Solution` API itself and are mapped to coded diagnostics.
//
// Preconditions: `program` is a well-formed AST from the parser.
// Postconditions: returns the solution if no error-level diagnostics were
//                 emitted, plus all accumulated diagnostics.
// Failure modes: every problem produces a `Diagnostic`; resolution
//                continues past errors.
// Side effects: none beyond the solution's own debug/tracing output.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::ast::*;
use crate::diag::{codes, Diagnostic};
use crate::dims::{new_domain_index, new_step_index, Dimension};
use crate::error::StencilError;
use crate::expr::{self, BinOp};
use crate::grid::PointRef;
use crate::output::{NullOutput, Output};
use crate::solution::Solution;

// ── Public types ────────────────────────────────────────────────────────────

/// Result of resolution.
#[derive(Debug)]
pub struct ResolveResult {
    pub solution: Option<Solution>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolveResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Settings accepted by `set NAME = VALUE;`.
pub const KNOWN_SETTINGS: &[&str] = &["element_bytes"];

// ── Public entry point ──────────────────────────────────────────────────────

pub fn resolve(program: &Program) -> ResolveResult {
    resolve_with(program, NullOutput)
}

/// Resolve with `debug_sink` installed as the solution's debug sink before any
/// declaration is made, so it sees every grid and equation.
pub fn resolve_with(program: &Program, debug_sink: impl Output + 'static) -> ResolveResult {
    let mut ctx = ResolveCtx::new();

    // Pass 1: the solution header
    let name = ctx.solution_name(program);
    let mut solution = Solution::new(name);
    solution.set_debug_output(debug_sink);

    // Pass 2: declarations and equations, in source order
    for stmt in &program.statements {
        ctx.statement(&mut solution, stmt);
    }

    debug!(
        solution = %solution.name(),
        grids = solution.num_grids(),
        equations = solution.num_equations(),
        diagnostics = ctx.diagnostics.len(),
        "resolved"
    );

    let ok = !ctx.diagnostics.iter().any(|d| d.is_error());
    ResolveResult {
        solution: ok.then_some(solution),
        diagnostics: ctx.diagnostics,
    }
}

// ── Internal context ────────────────────────────────────────────────────────

struct DimEntry {
    dim: Dimension,
    span: Span,
}

struct ResolveCtx {
    dims: HashMap<String, DimEntry>,
    step: Option<Span>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolveCtx {
    fn new() -> Self {
        ResolveCtx {
            dims: HashMap::new(),
            step: None,
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    // ── Pass 1: solution header ─────────────────────────────────────────

    fn solution_name(&mut self, program: &Program) -> String {
        let mut first: Option<&Ident> = None;
        for stmt in &program.statements {
            if let StatementKind::Solution(id) = &stmt.kind {
                match first {
                    None => first = Some(id),
                    Some(prev) => self.push(
                        Diagnostic::error(id.span, format!("duplicate solution name '{}'", id.name))
                            .with_code(codes::E0101)
                            .with_related(prev.span, "first named here"),
                    ),
                }
            }
        }
        match first {
            Some(id) => id.name.clone(),
            None => {
                self.push(
                    Diagnostic::error(program.span, "missing solution name")
                        .with_code(codes::E0100)
                        .with_hint("add `solution NAME;` to the source"),
                );
                String::new()
            }
        }
    }

    // ── Pass 2: statements ──────────────────────────────────────────────

    fn statement(&mut self, solution: &mut Solution, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Solution(_) => {}
            StatementKind::Set(set) => self.set(solution, set),
            StatementKind::Step(id) => {
                if let Some(prev) = self.step {
                    self.push(
                        Diagnostic::error(
                            id.span,
                            format!("second step dimension '{}'", id.name),
                        )
                        .with_code(codes::E0111)
                        .with_related(prev, "step dimension declared here")
                        .with_hint("a solution advances along exactly one step dimension"),
                    );
                    return;
                }
                if self.declare_dim(id, new_step_index(&id.name)) {
                    self.step = Some(id.span);
                }
            }
            StatementKind::Domain(ids) => {
                for id in ids {
                    self.declare_dim(id, new_domain_index(&id.name));
                }
            }
            StatementKind::Grid(decl) => self.grid(solution, decl),
            StatementKind::Equation(eq) => self.equation(solution, eq, stmt.span),
        }
    }

    fn set(&mut self, solution: &mut Solution, set: &SetStmt) {
        match set.name.name.as_str() {
            "element_bytes" => {
                let integral =
                    set.value.fract() == 0.0 && set.value > 0.0 && set.value <= u32::MAX as f64;
                let accepted = integral && solution.set_element_bytes(set.value as u32).is_ok();
                if !accepted {
                    self.push(
                        Diagnostic::error(
                            set.value_span,
                            format!("unsupported element_bytes value {}", set.value),
                        )
                        .with_code(codes::E0103)
                        .with_hint("use 4 (float) or 8 (double)"),
                    );
                }
            }
            other => self.push(
                Diagnostic::error(set.name.span, format!("unknown setting '{other}'"))
                    .with_code(codes::E0102)
                    .with_hint(format!("known settings: {}", KNOWN_SETTINGS.join(", "))),
            ),
        }
    }

    /// Returns `false` if the name was already taken.
    fn declare_dim(&mut self, id: &Ident, dim: Dimension) -> bool {
        if let Some(prev) = self.dims.get(&id.name) {
            let diag = Diagnostic::error(
                id.span,
                format!(
                    "dimension '{}' is already declared as {}",
                    id.name,
                    prev.dim.kind()
                ),
            )
            .with_code(codes::E0110)
            .with_related(prev.span, "first declared here");
            self.push(diag);
            return false;
        }
        self.dims.insert(
            id.name.clone(),
            DimEntry {
                dim,
                span: id.span,
            },
        );
        true
    }

    fn grid(&mut self, solution: &mut Solution, decl: &GridDecl) {
        let mut dims = Vec::with_capacity(decl.dims.len());
        for id in &decl.dims {
            match self.dims.get(&id.name) {
                Some(entry) => dims.push(entry.dim.clone()),
                None => self.push(
                    Diagnostic::error(id.span, format!("unknown dimension '{}'", id.name))
                        .with_code(codes::E0120)
                        .with_hint(format!(
                            "declare it with `step {0};` or `domain {0};`",
                            id.name
                        )),
                ),
            }
        }
        if dims.len() != decl.dims.len() {
            return;
        }
        if let Err(e) = solution.new_grid(&decl.name.name, &dims) {
            self.model_error(decl.name.span, e);
        }
    }

    fn equation(&mut self, solution: &mut Solution, eq: &EquationStmt, span: Span) {
        let lhs = self.point(solution, &eq.lhs);
        let rhs = self.expr(solution, &eq.rhs);
        if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
            if let Err(e) = solution.new_equation(lhs, rhs) {
                self.model_error(span, e);
            }
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn expr(&mut self, solution: &Solution, e: &Expr) -> Option<expr::Expr> {
        match &e.kind {
            ExprKind::Number(n) => Some(expr::Expr::Const(*n)),
            ExprKind::Point(p) => self.point(solution, p).map(expr::Expr::Point),
            ExprKind::Neg(inner) => match &inner.kind {
                ExprKind::Number(n) => Some(expr::Expr::Const(-*n)),
                _ => {
                    let operand = self.expr(solution, inner)?;
                    Some(expr::Expr::binary(BinOp::Mul, -1.0, operand))
                }
            },
            ExprKind::Binary { op, lhs, rhs } => {
                // Resolve both sides so every error is reported.
                let l = self.expr(solution, lhs);
                let r = self.expr(solution, rhs);
                Some(expr::Expr::binary(*op, l?, r?))
            }
        }
    }

    fn point(&mut self, solution: &Solution, p: &PointExpr) -> Option<PointRef> {
        let Some(grid) = solution.grid(&p.grid.name).map(Rc::clone) else {
            self.push(
                Diagnostic::error(p.grid.span, format!("unknown grid '{}'", p.grid.name))
                    .with_code(codes::E0130)
                    .with_hint(format!("declare it with `grid {}(...);`", p.grid.name)),
            );
            return None;
        };

        if p.indices.len() != grid.num_dims() {
            self.push(
                Diagnostic::error(
                    p.span,
                    format!(
                        "grid '{}' takes {} index(es), got {}",
                        grid.name(),
                        grid.num_dims(),
                        p.indices.len()
                    ),
                )
                .with_code(codes::E0132)
                .with_hint(format!("write it as {grid}")),
            );
            return None;
        }

        let mut offsets = Vec::with_capacity(p.indices.len());
        let mut ok = true;
        for (i, (index, dim)) in p.indices.iter().zip(grid.dims()).enumerate() {
            if index.dim.name != dim.name() {
                self.push(
                    Diagnostic::error(
                        index.dim.span,
                        format!(
                            "index {} of '{}' must be '{}', found '{}'",
                            i,
                            grid.name(),
                            dim.name(),
                            index.dim.name
                        ),
                    )
                    .with_code(codes::E0131)
                    .with_hint(format!("indices follow the declaration {grid}")),
                );
                ok = false;
            }
            // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
            let in_range = (i64::MIN as f64..i64::MAX as f64).contains(&index.offset);
            if index.offset.fract() != 0.0 || !in_range {
                self.push(
                    Diagnostic::error(
                        index.span,
                        format!("offset {} is not a 64-bit integer", index.offset),
                    )
                    .with_code(codes::E0133),
                );
                ok = false;
            }
            offsets.push(index.offset as i64);
        }
        if !ok {
            return None;
        }

        match grid.new_relative_grid_point(&offsets) {
            Ok(point) => Some(point),
            Err(e) => {
                self.model_error(p.span, e);
                None
            }
        }
    }

    // ── Model errors ────────────────────────────────────────────────────

    fn model_error(&mut self, span: Span, err: StencilError) {
        let code = match &err {
            StencilError::DimensionConflict { .. } => codes::E0110,
            StencilError::DuplicateName { .. } => codes::E0121,
            StencilError::Arity { .. }
            | StencilError::InvalidDimensions { .. }
            | StencilError::InvalidName { .. } => codes::E0122,
            StencilError::UnknownGrid { .. } => codes::E0130,
            StencilError::Causality { .. } => codes::E0140,
            StencilError::DivisionByZero { .. } => codes::E0141,
            _ => codes::E0199,
        };
        let mut diag = Diagnostic::error(span, err.to_string()).with_code(code);
        if let StencilError::Causality { .. } = err {
            diag = diag.with_hint(
                "the written point must be at a later step than every point it reads",
            );
        }
        self.push(diag);
    }
}
