// expr.rs — Expression AST for stencil right-hand sides
//
// A closed sum type of constants, point references, and binary arithmetic.
// Subtrees are reference counted so one subexpression may feed several
// parents; nothing is ever mutated after construction, so the structure is
// a DAG that every consumer sees as a tree.
//
// Preconditions: none.
// Postconditions: nodes are immutable; renderings are deterministic.
// Failure modes: `DivisionByZero` from `evaluate` / `check_divisors` only.
// Side effects: none.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{Result, StencilError};
use crate::grid::PointRef;

// ── Operators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    /// Infix symbol used by the simple and pseudo renderings.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    /// Mnemonic used for SIMD intrinsic names (`_mm256_add_ps`).
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
        }
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    Point(PointRef),
    Binary {
        op: BinOp,
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
    },
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::Const(f64::from(v))
    }
}

impl From<PointRef> for Expr {
    fn from(p: PointRef) -> Self {
        Expr::Point(p)
    }
}

impl From<&PointRef> for Expr {
    fn from(p: &PointRef) -> Self {
        Expr::Point(p.clone())
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

impl Expr {
    pub fn binary(op: BinOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            lhs: Rc::new(lhs.into()),
            rhs: Rc::new(rhs.into()),
        }
    }

    /// Fully parenthesized infix rendering, e.g. `((a + b) / 7)`.
    pub fn format_simple(&self) -> String {
        let mut out = String::new();
        self.write_simple(&mut out);
        out
    }

    fn write_simple(&self, out: &mut String) {
        match self {
            Expr::Const(v) => out.push_str(&format_number(*v)),
            Expr::Point(p) => out.push_str(&p.format_simple()),
            Expr::Binary { op, lhs, rhs } => {
                out.push('(');
                lhs.write_simple(out);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                rhs.write_simple(out);
                out.push(')');
            }
        }
    }

    /// Visit every node, parent before children, left before right.
    /// Shared subtrees are visited once per reference.
    pub fn walk_preorder<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        if let Expr::Binary { lhs, rhs, .. } = self {
            lhs.walk_preorder(f);
            rhs.walk_preorder(f);
        }
    }

    /// All point references in pre-order, duplicates included.
    pub fn points(&self) -> Vec<&PointRef> {
        let mut pts = Vec::new();
        self.walk_preorder(&mut |e| {
            if let Expr::Point(p) = e {
                pts.push(p);
            }
        });
        pts
    }

    pub fn num_nodes(&self) -> usize {
        let mut n = 0;
        self.walk_preorder(&mut |_| n += 1);
        n
    }

    /// Largest step offset among referenced points on grids that have a
    /// step dimension.
    pub fn max_step_offset(&self) -> Option<i64> {
        self.points().iter().filter_map(|p| p.step_offset()).max()
    }

    /// Fold a subtree made only of constants, in tree order.
    /// Returns `None` as soon as a point reference is involved.
    pub fn const_value(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            Expr::Point(_) => None,
            Expr::Binary { op, lhs, rhs } => Some(op.apply(lhs.const_value()?, rhs.const_value()?)),
        }
    }

    /// Reject any division whose divisor is a constant subtree equal to zero.
    pub fn check_divisors(&self) -> Result<()> {
        let mut found = None;
        self.walk_preorder(&mut |e| {
            if found.is_none() && is_zero_division(e) {
                found = Some(e);
            }
        });
        match found {
            Some(e) => Err(StencilError::DivisionByZero {
                expr: e.format_simple(),
            }),
            None => Ok(()),
        }
    }

    /// Evaluate in double precision with the exact nesting of the tree.
    /// `read` supplies grid values for point references.
    pub fn evaluate(&self, read: &mut dyn FnMut(&PointRef) -> f64) -> Result<f64> {
        match self {
            Expr::Const(v) => Ok(*v),
            Expr::Point(p) => Ok(read(p)),
            Expr::Binary { op, lhs, rhs } => {
                if is_zero_division(self) {
                    return Err(StencilError::DivisionByZero {
                        expr: self.format_simple(),
                    });
                }
                let a = lhs.evaluate(read)?;
                let b = rhs.evaluate(read)?;
                Ok(op.apply(a, b))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_simple())
    }
}

fn is_zero_division(e: &Expr) -> bool {
    match e {
        Expr::Binary {
            op: BinOp::Div,
            rhs,
            ..
        } => rhs.const_value() == Some(0.0),
        _ => false,
    }
}

/// Shortest round-trip decimal form, never exponent notation (`7`, `0.5`, `-2`).
pub(crate) fn format_number(v: f64) -> String {
    format!("{v}")
}

// ── Construction API ────────────────────────────────────────────────────────

pub fn new_const_number_node(value: f64) -> Expr {
    Expr::Const(value)
}

pub fn new_add_node(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    Expr::binary(BinOp::Add, a, b)
}

pub fn new_subtract_node(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    Expr::binary(BinOp::Sub, a, b)
}

pub fn new_multiply_node(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    Expr::binary(BinOp::Mul, a, b)
}

pub fn new_divide_node(a: impl Into<Expr>, b: impl Into<Expr>) -> Expr {
    Expr::binary(BinOp::Div, a, b)
}
