// pseudo.rs — Pseudo-code listing of the lowered kernels
//
// Shows what the code formatters compute, independent of target: one block
// per equation with its three-address instructions, then totals.
//
// Preconditions: `solution` holds only valid equations.
// Postconditions: output depends on the solution and CSE setting only.
// Failure modes: `DivisionByZero`, from lowering.
// Side effects: none.

use std::fmt::Write as _;

use crate::error::Result;
use crate::kernel::lower_solution;
use crate::solution::Solution;

use super::{CodegenOptions, Formatter};

pub struct PseudoFormatter {
    options: CodegenOptions,
}

impl PseudoFormatter {
    pub fn new(options: CodegenOptions) -> Self {
        PseudoFormatter { options }
    }
}

impl Formatter for PseudoFormatter {
    fn id(&self) -> &str {
        "pseudo"
    }

    fn description(&self) -> String {
        "target-independent pseudo-code".to_string()
    }

    fn render(&self, solution: &Solution) -> Result<String> {
        let kernels = lower_solution(solution, &self.options)?;
        let mut out = String::new();
        let _ = writeln!(out, "// Stencil solution '{}'.", solution.name());
        let _ = writeln!(
            out,
            "// {} grid(s), {}-byte elements, cse {}.",
            solution.num_grids(),
            solution.element_bytes(),
            if self.options.cse { "on" } else { "off" }
        );
        for kernel in &kernels {
            let _ = writeln!(out);
            let _ = write!(out, "{kernel}");
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "// {} equation(s), {} load(s), {} operation(s).",
            kernels.len(),
            kernels.iter().map(|k| k.num_loads()).sum::<usize>(),
            kernels.iter().map(|k| k.num_ops()).sum::<usize>()
        );
        Ok(out)
    }
}
