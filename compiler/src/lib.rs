// stencilc — Stencil compiler
//
// Library root. The model (dimensions, grids, expressions, equations,
// solutions) is usable directly through the construction API re-exported
// below; the `.stencil` front end (lexer, parser, resolve) and the compile
// driver (pipeline) build the same model from source text.

pub mod ast;
pub mod diag;
pub mod dims;
pub mod equation;
pub mod error;
pub mod expr;
pub mod format;
pub mod grid;
pub mod id;
pub mod kernel;
pub mod lexer;
pub mod manifest;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod solution;

pub use dims::{new_domain_index, new_step_index, DimKind, Dimension};
pub use equation::{new_equation_node, Equation};
pub use error::{Result, StencilError};
pub use expr::{
    new_add_node, new_const_number_node, new_divide_node, new_multiply_node, new_subtract_node,
    BinOp, Expr,
};
pub use format::{CodegenOptions, FormatRegistry, Formatter};
pub use grid::{GridVar, PointRef};
pub use output::{FileOutput, NullOutput, Output, StdoutOutput, StringOutput};
pub use solution::{new_solution, Solution};
