// AST node types for .stencil source files.
//
// Every node carries a `SimpleSpan` for error reporting in resolution.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::expr::BinOp;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete stencil program: a sequence of `;`-terminated statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `solution NAME;`
    Solution(Ident),
    /// `set NAME = NUMBER;`
    Set(SetStmt),
    /// `step NAME;`
    Step(Ident),
    /// `domain NAME, NAME, ...;`
    Domain(Vec<Ident>),
    /// `grid NAME(DIM, ...);`
    Grid(GridDecl),
    /// `POINT = EXPR;`
    Equation(EquationStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetStmt {
    pub name: Ident,
    pub value: f64,
    pub value_span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridDecl {
    pub name: Ident,
    pub dims: Vec<Ident>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquationStmt {
    pub lhs: PointExpr,
    pub rhs: Expr,
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    Point(PointExpr),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// `u(t+1, x-1, y)`: a grid name and one index per grid dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct PointExpr {
    pub grid: Ident,
    pub indices: Vec<IndexExpr>,
    pub span: Span,
}

/// `x`, `x+2`, or `x-1`. The offset is checked for integrality during
/// resolution so the error can point at it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub dim: Ident,
    pub offset: f64,
    pub span: Span,
}

// ── Common ──

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
