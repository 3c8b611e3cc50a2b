// kernel.rs — Three-address form of one stencil equation
//
// Lowering walks the RHS in post-order (left operand, right operand,
// operator), so the instruction sequence keeps the expression's nesting and
// operand order; nothing is reassociated. With CSE on, identical subtrees
// map to one temporary, keyed on `(op, lhs temp, rhs temp)`. Loads of the
// same point are always shared.
//
// Preconditions: equations come from a `Solution` and are already causal.
// Postconditions: every temp is defined before use; the last instruction
//   defines `Kernel::result`; output is identical across calls.
// Failure modes: `DivisionByZero` when a divisor folds to constant zero.
// Side effects: `tracing` debug events only.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, instrument};

use crate::equation::Equation;
use crate::error::Result;
use crate::expr::{format_number, BinOp, Expr};
use crate::format::CodegenOptions;
use crate::grid::PointRef;
use crate::id::{IdAllocator, TempId};
use crate::solution::Solution;

// ── Instructions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Instr<'a> {
    Load {
        dst: TempId,
        point: &'a PointRef,
    },
    Const {
        dst: TempId,
        value: f64,
    },
    Binary {
        dst: TempId,
        op: BinOp,
        lhs: TempId,
        rhs: TempId,
    },
}

impl Instr<'_> {
    pub fn dst(&self) -> TempId {
        match self {
            Instr::Load { dst, .. } | Instr::Const { dst, .. } | Instr::Binary { dst, .. } => *dst,
        }
    }
}

/// One lowered equation: compute `result` from `instrs`, store it at the
/// equation's LHS point.
#[derive(Debug, Clone)]
pub struct Kernel<'a> {
    pub index: usize,
    pub equation: &'a Equation,
    pub instrs: Vec<Instr<'a>>,
    pub result: TempId,
}

impl<'a> Kernel<'a> {
    pub fn store(&self) -> &'a PointRef {
        self.equation.lhs()
    }

    pub fn num_loads(&self) -> usize {
        self.instrs
            .iter()
            .filter(|i| matches!(i, Instr::Load { .. }))
            .count()
    }

    pub fn num_ops(&self) -> usize {
        self.instrs
            .iter()
            .filter(|i| matches!(i, Instr::Binary { .. }))
            .count()
    }
}

impl fmt::Display for Kernel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Equation {}: {}", self.index, self.equation)?;
        for instr in &self.instrs {
            match instr {
                Instr::Load { dst, point } => writeln!(f, "  {dst} = {point};")?,
                Instr::Const { dst, value } => writeln!(f, "  {dst} = {};", format_number(*value))?,
                Instr::Binary { dst, op, lhs, rhs } => writeln!(f, "  {dst} = {lhs} {op} {rhs};")?,
            }
        }
        writeln!(f, "  {} = {};", self.store(), self.result)
    }
}

// ── Lowering ────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq, Hash)]
enum ValueKey<'a> {
    Load(&'a PointRef),
    Const(u64),
    Binary(BinOp, TempId, TempId),
}

struct Lowerer<'a> {
    cse: bool,
    ids: IdAllocator,
    instrs: Vec<Instr<'a>>,
    values: HashMap<ValueKey<'a>, TempId>,
}

impl<'a> Lowerer<'a> {
    fn lower(&mut self, expr: &'a Expr) -> TempId {
        match expr {
            Expr::Point(point) => self.intern(ValueKey::Load(point), true, |dst| Instr::Load { dst, point }),
            Expr::Const(value) => {
                let value = *value;
                self.intern(ValueKey::Const(value.to_bits()), self.cse, |dst| Instr::Const { dst, value })
            }
            Expr::Binary { op, lhs, rhs } => {
                let (op, l, r) = (*op, self.lower(lhs), self.lower(rhs));
                self.intern(ValueKey::Binary(op, l, r), self.cse, |dst| Instr::Binary {
                    dst,
                    op,
                    lhs: l,
                    rhs: r,
                })
            }
        }
    }

    fn intern(&mut self, key: ValueKey<'a>, share: bool, make: impl FnOnce(TempId) -> Instr<'a>) -> TempId {
        if share {
            if let Some(&existing) = self.values.get(&key) {
                return existing;
            }
        }
        let dst = self.ids.alloc_temp();
        self.instrs.push(make(dst));
        if share {
            self.values.insert(key, dst);
        }
        dst
    }
}

/// Lower one equation. Fails if any divisor is a constant zero.
pub fn lower_equation<'a>(index: usize, equation: &'a Equation, options: &CodegenOptions) -> Result<Kernel<'a>> {
    equation.rhs().check_divisors()?;

    let mut lowerer = Lowerer {
        cse: options.cse,
        ids: IdAllocator::new(),
        instrs: Vec::new(),
        values: HashMap::new(),
    };
    let result = lowerer.lower(equation.rhs());
    Ok(Kernel {
        index,
        equation,
        instrs: lowerer.instrs,
        result,
    })
}

/// Lower every equation of `solution` in declaration order.
#[instrument(skip_all, fields(solution = %solution.name(), cse = options.cse))]
pub fn lower_solution<'a>(solution: &'a Solution, options: &CodegenOptions) -> Result<Vec<Kernel<'a>>> {
    let kernels = solution
        .equations()
        .iter()
        .enumerate()
        .map(|(i, eq)| lower_equation(i, eq, options))
        .collect::<Result<Vec<_>>>()?;
    debug!(
        kernels = kernels.len(),
        instrs = kernels.iter().map(|k| k.instrs.len()).sum::<usize>(),
        "solution lowered"
    );
    Ok(kernels)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::dims::{new_domain_index, new_step_index};
    use crate::error::StencilError;
    use crate::expr::{new_add_node, new_divide_node, new_multiply_node};
    use crate::grid::GridVar;

    fn grid() -> Rc<GridVar> {
        Rc::new(GridVar::new("u", vec![new_step_index("t"), new_domain_index("x")]).unwrap())
    }

    fn eq(rhs: Expr) -> Equation {
        let g = grid();
        Equation::new(g.new_relative_grid_point(&[1, 0]).unwrap(), rhs).unwrap()
    }

    #[test]
    fn post_order_preserves_operand_order() {
        let g = grid();
        let a = g.new_relative_grid_point(&[0, -1]).unwrap();
        let b = g.new_relative_grid_point(&[0, 1]).unwrap();
        let e = eq(new_divide_node(new_add_node(&a, &b), 2));
        let k = lower_equation(0, &e, &CodegenOptions::default()).unwrap();
        assert_eq!(
            k.to_string(),
            "Equation 0: u(t+1, x) EQUALS ((u(t, x-1) + u(t, x+1)) / 2)\n\
             \x20 temp0 = u(t, x-1);\n\
             \x20 temp1 = u(t, x+1);\n\
             \x20 temp2 = temp0 + temp1;\n\
             \x20 temp3 = 2;\n\
             \x20 temp4 = temp2 / temp3;\n\
             \x20 u(t+1, x) = temp4;\n"
        );
        assert_eq!(k.num_loads(), 2);
        assert_eq!(k.num_ops(), 2);
    }

    #[test]
    fn cse_shares_identical_subtrees() {
        let g = grid();
        let p = g.new_relative_grid_point(&[0, 0]).unwrap();
        let sq = new_multiply_node(&p, &p);
        let e = eq(new_add_node(&sq, &sq));

        let with = lower_equation(0, &e, &CodegenOptions { cse: true }).unwrap();
        assert_eq!(with.num_loads(), 1);
        assert_eq!(with.num_ops(), 2);

        let without = lower_equation(0, &e, &CodegenOptions { cse: false }).unwrap();
        assert_eq!(without.num_loads(), 1);
        assert_eq!(without.num_ops(), 3);
    }

    #[test]
    fn operand_order_is_part_of_the_key() {
        let g = grid();
        let a = g.new_relative_grid_point(&[0, -1]).unwrap();
        let b = g.new_relative_grid_point(&[0, 1]).unwrap();
        let e = eq(new_multiply_node(new_add_node(&a, &b), new_add_node(&b, &a)));
        let k = lower_equation(0, &e, &CodegenOptions::default()).unwrap();
        assert_eq!(k.num_ops(), 3);
    }

    #[test]
    fn zero_divisor_fails_lowering() {
        let e = eq(new_divide_node(1, 0));
        assert!(matches!(
            lower_equation(0, &e, &CodegenOptions::default()),
            Err(StencilError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn constant_rhs_lowers_to_single_const() {
        let e = eq(Expr::Const(3.5));
        let k = lower_equation(0, &e, &CodegenOptions::default()).unwrap();
        assert_eq!(k.instrs, vec![Instr::Const { dst: TempId(0), value: 3.5 }]);
        assert_eq!(k.result, TempId(0));
    }
}
