// code.rs — C++ code generation for stencil solutions
//
// Emits a self-contained C++ header: one `Equation_<i>` struct per equation
// whose `calc` computes the equation at one point of the domain, plus a
// `Stencil` driver whose `calc_all` runs every equation in declaration
// order. Scalar targets compute one element per call; vector targets compute
// `VLEN` consecutive elements along the innermost domain dimension.
//
// The caller supplies grid storage through a `Grids` template parameter
// that exposes `real_t* <grid>(idx_t...)` for every grid, taking the grid's
// indices in declaration order.
//
// Preconditions: every equation of `solution` is valid.
// Postconditions: output depends only on the solution, target, and options.
// Failure modes: DivisionByZero from lowering; nothing is emitted.
// Side effects: none.

use std::fmt::Write as _;

use crate::error::Result;
use crate::grid::PointRef;
use crate::id::TempId;
use crate::kernel::{lower_solution, Instr, Kernel};
use crate::manifest::fingerprint;
use crate::solution::Solution;

use super::{sanitize, CodegenOptions, Formatter, Target};

// ── Public types ────────────────────────────────────────────────────────────

pub struct CodeFormatter {
    target: Target,
    options: CodegenOptions,
}

impl CodeFormatter {
    pub fn new(target: Target, options: CodegenOptions) -> Self {
        CodeFormatter { target, options }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl Formatter for CodeFormatter {
    fn id(&self) -> &str {
        self.target.id
    }

    fn description(&self) -> String {
        format!("C++ header, {}", self.target.description)
    }

    fn render(&self, solution: &Solution) -> Result<String> {
        let kernels = lower_solution(solution, &self.options)?;
        let fp = fingerprint(solution)?;
        let mut ctx = CodegenCtx::new(solution, &self.target);
        ctx.emit_all(&kernels, &fp);
        Ok(ctx.out)
    }
}

// ── Context ─────────────────────────────────────────────────────────────────

/// How a grid is reached from a vector kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Vector dimension is the grid's last: consecutive elements.
    Contiguous,
    /// Grid lacks the vector dimension: one value for all lanes.
    Broadcast,
    /// Vector dimension present but not last: per-lane loop.
    Strided,
}

struct CodegenCtx<'a> {
    solution: &'a Solution,
    target: &'a Target,
    bytes: u32,
    /// Innermost domain dimension; vectorized along on vector targets.
    vdim: Option<&'a str>,
    /// `calc` parameters: step dimension then domain dimensions.
    params: Vec<&'a str>,
    out: String,
}

impl<'a> CodegenCtx<'a> {
    fn new(solution: &'a Solution, target: &'a Target) -> Self {
        let domains = solution.domain_dims();
        let vdim = if target.is_vector() {
            domains.last().map(|d| d.name())
        } else {
            None
        };
        let params = solution
            .step_dim()
            .into_iter()
            .chain(domains.iter().copied())
            .map(|d| d.name())
            .collect();
        CodegenCtx {
            solution,
            target,
            bytes: solution.element_bytes(),
            vdim,
            params,
            out: String::with_capacity(4096),
        }
    }

    fn vector(&self) -> bool {
        self.target.is_vector()
    }

    fn intrinsic(&self, op: &str) -> String {
        self.target.intrinsic(op, self.bytes)
    }

    fn param_list(&self) -> String {
        self.params
            .iter()
            .map(|p| format!(", idx_t {p}"))
            .collect()
    }

    fn arg_list(&self) -> String {
        self.params.iter().map(|p| format!(", {p}")).collect()
    }

    fn access_kind(&self, point: &PointRef) -> Access {
        let Some(vdim) = self.vdim else {
            return Access::Broadcast;
        };
        let dims = point.grid().dims();
        match dims.iter().position(|d| d.name() == vdim) {
            None => Access::Broadcast,
            Some(i) if i + 1 == dims.len() => Access::Contiguous,
            Some(_) => Access::Strided,
        }
    }

    /// `grids.u(t + 1, x - 1)`; with `lane`, the vector index also adds `lane`.
    fn address(&self, point: &PointRef, lane: bool) -> String {
        let indices: Vec<String> = point
            .indexed_offsets()
            .map(|(dim, off)| {
                let base = if lane && Some(dim.name()) == self.vdim {
                    format!("{} + lane", dim.name())
                } else {
                    dim.name().to_string()
                };
                match off {
                    0 => base,
                    o if o > 0 => format!("{base} + {o}"),
                    o => format!("{base} - {}", o.unsigned_abs()),
                }
            })
            .collect();
        format!("grids.{}({})", point.grid().name(), indices.join(", "))
    }

    fn literal(&self, v: f64) -> String {
        // Narrow first: a finite double may overflow float.
        let narrowed = if self.bytes == 4 { v as f32 as f64 } else { v };
        if narrowed.is_nan() {
            return "std::numeric_limits<real_t>::quiet_NaN()".to_string();
        }
        if narrowed.is_infinite() {
            let sign = if narrowed < 0.0 { "-" } else { "" };
            return format!("{sign}std::numeric_limits<real_t>::infinity()");
        }
        if self.bytes == 4 {
            format!("{:?}f", v as f32)
        } else {
            format!("{v:?}")
        }
    }

    // ── Top-level emit ──────────────────────────────────────────────────

    fn emit_all(&mut self, kernels: &[Kernel<'_>], fingerprint: &str) {
        self.emit_preamble(fingerprint);
        for kernel in kernels {
            self.emit_equation(kernel);
        }
        self.emit_driver(kernels.len());
        let _ = writeln!(
            self.out,
            "}} // namespace stencil_{}",
            sanitize(self.solution.name())
        );
    }

    fn emit_preamble(&mut self, fingerprint: &str) {
        let _ = writeln!(
            self.out,
            "// Generated by stencilc {}. Do not edit.",
            env!("CARGO_PKG_VERSION")
        );
        let _ = writeln!(
            self.out,
            "// target: {} ({})",
            self.target.id, self.target.description
        );
        let _ = writeln!(self.out, "// solution: {}", self.solution.name());
        let _ = writeln!(
            self.out,
            "// element: {} bytes, {} lane(s)",
            self.bytes,
            self.target.lanes(self.bytes)
        );
        let _ = writeln!(self.out, "// fingerprint: {fingerprint}");
        let _ = writeln!(self.out, "//");
        let _ = writeln!(
            self.out,
            "// Grids must provide `real_t* <grid>(idx_t...)` for every grid below."
        );
        for grid in self.solution.grids() {
            let _ = writeln!(self.out, "//   {grid}");
        }
        self.out.push_str("\n#pragma once\n\n");
        if self.vector() {
            self.out.push_str("#include <immintrin.h>\n");
        }
        self.out.push_str("#include <cstdint>\n");
        self.out.push_str("#include <limits>\n\n");

        let _ = writeln!(
            self.out,
            "namespace stencil_{} {{\n",
            sanitize(self.solution.name())
        );
        let real = if self.bytes == 8 { "double" } else { "float" };
        let _ = writeln!(self.out, "typedef {real} real_t;");
        if self.vector() {
            let _ = writeln!(
                self.out,
                "typedef {} real_vec_t;",
                self.target.vector_type(self.bytes)
            );
        }
        self.out.push_str("typedef std::int64_t idx_t;\n");
        let _ = writeln!(
            self.out,
            "constexpr idx_t VLEN = {};\n",
            self.target.lanes(self.bytes)
        );
    }

    // ── Equations ───────────────────────────────────────────────────────

    fn emit_equation(&mut self, kernel: &Kernel<'_>) {
        let _ = writeln!(self.out, "// {}", kernel.equation.format_simple());
        let _ = writeln!(self.out, "struct Equation_{} {{", kernel.index);
        self.out.push_str("    template<typename Grids>\n");
        let _ = writeln!(
            self.out,
            "    static inline void calc(Grids& grids{}) {{",
            self.param_list()
        );
        for instr in &kernel.instrs {
            self.emit_instr(instr);
        }
        self.emit_store(kernel.store(), kernel.result);
        self.out.push_str("    }\n};\n\n");
    }

    fn emit_instr(&mut self, instr: &Instr<'_>) {
        let ty = if self.vector() { "real_vec_t" } else { "real_t" };
        match instr {
            Instr::Load { dst, point } => self.emit_load(*dst, point),
            Instr::Const { dst, value } => {
                let lit = self.literal(*value);
                let rhs = if self.vector() {
                    format!("{}({lit})", self.intrinsic("set1"))
                } else {
                    lit
                };
                let _ = writeln!(self.out, "        const {ty} {dst} = {rhs};");
            }
            Instr::Binary { dst, op, lhs, rhs } => {
                let value = if self.vector() {
                    format!("{}({lhs}, {rhs})", self.intrinsic(op.mnemonic()))
                } else {
                    format!("{lhs} {} {rhs}", op.symbol())
                };
                let _ = writeln!(self.out, "        const {ty} {dst} = {value};");
            }
        }
    }

    fn emit_load(&mut self, dst: TempId, point: &PointRef) {
        let _ = writeln!(self.out, "        // {point}");
        if !self.vector() {
            let _ = writeln!(
                self.out,
                "        const real_t {dst} = *{};",
                self.address(point, false)
            );
            return;
        }
        let loadu = self.intrinsic("loadu");
        match self.access_kind(point) {
            Access::Contiguous => {
                let _ = writeln!(
                    self.out,
                    "        const real_vec_t {dst} = {loadu}({});",
                    self.address(point, false)
                );
            }
            Access::Broadcast => {
                let _ = writeln!(
                    self.out,
                    "        const real_vec_t {dst} = {}(*{});",
                    self.intrinsic("set1"),
                    self.address(point, false)
                );
            }
            Access::Strided => {
                let _ = writeln!(self.out, "        real_t {dst}_lanes[VLEN];");
                let _ = writeln!(
                    self.out,
                    "        for (idx_t lane = 0; lane < VLEN; lane++) {dst}_lanes[lane] = *{};",
                    self.address(point, true)
                );
                let _ = writeln!(
                    self.out,
                    "        const real_vec_t {dst} = {loadu}({dst}_lanes);"
                );
            }
        }
    }

    fn emit_store(&mut self, point: &PointRef, result: TempId) {
        let _ = writeln!(self.out, "        // {point} = {result}");
        if !self.vector() {
            let _ = writeln!(
                self.out,
                "        *{} = {result};",
                self.address(point, false)
            );
            return;
        }
        let storeu = self.intrinsic("storeu");
        match self.access_kind(point) {
            Access::Contiguous => {
                let _ = writeln!(
                    self.out,
                    "        {storeu}({}, {result});",
                    self.address(point, false)
                );
            }
            Access::Broadcast => {
                // Sequential semantics: the last lane's write wins.
                self.out.push_str("        real_t out_lanes[VLEN];\n");
                let _ = writeln!(self.out, "        {storeu}(out_lanes, {result});");
                let _ = writeln!(
                    self.out,
                    "        *{} = out_lanes[VLEN - 1];",
                    self.address(point, false)
                );
            }
            Access::Strided => {
                self.out.push_str("        real_t out_lanes[VLEN];\n");
                let _ = writeln!(self.out, "        {storeu}(out_lanes, {result});");
                let _ = writeln!(
                    self.out,
                    "        for (idx_t lane = 0; lane < VLEN; lane++) *{} = out_lanes[lane];",
                    self.address(point, true)
                );
            }
        }
    }

    // ── Driver ──────────────────────────────────────────────────────────

    fn emit_driver(&mut self, num_equations: usize) {
        self.out.push_str("struct Stencil {\n");
        let _ = writeln!(
            self.out,
            "    static constexpr int num_equations = {num_equations};\n"
        );
        self.out.push_str("    template<typename Grids>\n");
        let _ = writeln!(
            self.out,
            "    static inline void calc_all(Grids& grids{}) {{",
            self.param_list()
        );
        if num_equations == 0 {
            self.out.push_str("        (void)grids;\n");
            for p in &self.params {
                let _ = writeln!(self.out, "        (void){p};");
            }
        }
        let args = self.arg_list();
        for i in 0..num_equations {
            let _ = writeln!(self.out, "        Equation_{i}::calc(grids{args});");
        }
        self.out.push_str("    }\n};\n\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::{new_domain_index, new_step_index};
    use crate::error::StencilError;
    use crate::expr::{new_add_node, new_divide_node, new_multiply_node, Expr};
    use crate::format::target::find_target;

    fn heat_1d() -> Solution {
        let mut soln = Solution::new("heat");
        let u = soln
            .new_grid("u", &[new_step_index("t"), new_domain_index("x")])
            .unwrap();
        let p = |o: [i64; 2]| u.new_relative_grid_point(&o).unwrap();
        soln.new_equation(
            p([1, 0]),
            new_divide_node(new_add_node(p([0, -1]), p([0, 1])), 2),
        )
        .unwrap();
        soln
    }

    fn render(soln: &Solution, id: &str) -> String {
        let target = *find_target(id).unwrap();
        CodeFormatter::new(target, CodegenOptions::default())
            .render(soln)
            .unwrap()
    }

    #[test]
    fn scalar_kernel_body() {
        let code = render(&heat_1d(), "cpp");
        assert!(code.contains("namespace stencil_heat {"));
        assert!(code.contains("typedef float real_t;"));
        assert!(code.contains("constexpr idx_t VLEN = 1;"));
        assert!(!code.contains("immintrin"));
        assert!(code.contains("static inline void calc(Grids& grids, idx_t t, idx_t x) {"));
        assert!(code.contains("        const real_t temp0 = *grids.u(t, x - 1);\n"));
        assert!(code.contains("        const real_t temp1 = *grids.u(t, x + 1);\n"));
        assert!(code.contains("        const real_t temp2 = temp0 + temp1;\n"));
        assert!(code.contains("        const real_t temp3 = 2.0f;\n"));
        assert!(code.contains("        const real_t temp4 = temp2 / temp3;\n"));
        assert!(code.contains("        *grids.u(t + 1, x) = temp4;\n"));
        assert!(code.contains("static constexpr int num_equations = 1;"));
        assert!(code.contains("        Equation_0::calc(grids, t, x);\n"));
    }

    #[test]
    fn vector_kernel_uses_target_intrinsics() {
        let code = render(&heat_1d(), "avx");
        assert!(code.contains("#include <immintrin.h>"));
        assert!(code.contains("typedef __m256 real_vec_t;"));
        assert!(code.contains("constexpr idx_t VLEN = 8;"));
        assert!(code.contains("const real_vec_t temp0 = _mm256_loadu_ps(grids.u(t, x - 1));"));
        assert!(code.contains("const real_vec_t temp2 = _mm256_add_ps(temp0, temp1);"));
        assert!(code.contains("const real_vec_t temp3 = _mm256_set1_ps(2.0f);"));
        assert!(code.contains("_mm256_div_ps(temp2, temp3)"));
        assert!(code.contains("_mm256_storeu_ps(grids.u(t + 1, x), temp4);"));
        assert!(!code.contains("_mm512"));
    }

    #[test]
    fn double_precision_lanes() {
        let mut soln = heat_1d();
        soln.set_element_bytes(8).unwrap();
        let code = render(&soln, "avx512");
        assert!(code.contains("typedef double real_t;"));
        assert!(code.contains("typedef __m512d real_vec_t;"));
        assert!(code.contains("constexpr idx_t VLEN = 8;"));
        assert!(code.contains("_mm512_set1_pd(2.0)"));
        assert!(code.contains("_mm512_loadu_pd"));
    }

    #[test]
    fn avx_and_avx2_differ_only_in_target_line() {
        let soln = heat_1d();
        let strip = |s: String| {
            s.lines()
                .filter(|l| !l.starts_with("// target:"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(strip(render(&soln, "avx")), strip(render(&soln, "avx2")));
    }

    #[test]
    fn broadcast_and_strided_access() {
        let mut soln = Solution::new("mix");
        let t = new_step_index("t");
        let x = new_domain_index("x");
        let y = new_domain_index("y");
        let u = soln.new_grid("u", &[t.clone(), x.clone(), y.clone()]).unwrap();
        let c = soln.new_grid("c", &[x.clone()]).unwrap();
        let v = soln.new_grid("v", &[t, y, x]).unwrap();
        soln.new_equation(
            u.new_relative_grid_point(&[1, 0, 0]).unwrap(),
            new_multiply_node(
                c.new_relative_grid_point(&[0]).unwrap(),
                v.new_relative_grid_point(&[0, 1, 0]).unwrap(),
            ),
        )
        .unwrap();

        // Vector dimension is y (last domain dimension seen).
        let code = render(&soln, "knl");
        assert!(code.contains("_mm512_set1_ps(*grids.c(x))"));
        assert!(code.contains("temp1_lanes[lane] = *grids.v(t, y + lane + 1, x);"));
        assert!(code.contains("_mm512_storeu_ps(grids.u(t + 1, x, y), temp2);"));
    }

    #[test]
    fn literals() {
        let soln = heat_1d();
        let target = *find_target("cpp").unwrap();
        let ctx = CodegenCtx::new(&soln, &target);
        assert_eq!(ctx.literal(7.0), "7.0f");
        assert_eq!(ctx.literal(0.1), "0.1f");
        assert_eq!(
            ctx.literal(f64::NEG_INFINITY),
            "-std::numeric_limits<real_t>::infinity()"
        );
        assert_eq!(ctx.literal(1e300), "std::numeric_limits<real_t>::infinity()");
    }

    #[test]
    fn empty_solution_has_no_kernels() {
        let code = render(&Solution::new("empty"), "avx512");
        assert!(!code.contains("struct Equation_"));
        assert!(code.contains("static constexpr int num_equations = 0;"));
        assert!(code.contains("} // namespace stencil_empty"));
    }

    #[test]
    fn zero_divisor_is_reported() {
        let mut soln = Solution::new("bad");
        let u = soln
            .new_grid("u", &[new_step_index("t"), new_domain_index("x")])
            .unwrap();
        soln.new_equation(
            u.new_relative_grid_point(&[1, 0]).unwrap(),
            new_divide_node(Expr::from(1), 0),
        )
        .unwrap();
        let target = *find_target("cpp").unwrap();
        let result = CodeFormatter::new(target, CodegenOptions::default()).render(&soln);
        assert!(matches!(result, Err(StencilError::DivisionByZero { .. })));
    }

    #[test]
    fn extreme_offsets_render_without_overflow() {
        let mut soln = Solution::new("far");
        let u = soln
            .new_grid("u", &[new_step_index("t"), new_domain_index("x")])
            .unwrap();
        soln.new_equation(
            u.new_relative_grid_point(&[1, i64::MAX]).unwrap(),
            u.new_relative_grid_point(&[0, i64::MIN]).unwrap(),
        )
        .unwrap();
        let code = render(&soln, "cpp");
        assert!(code.contains("*grids.u(t, x - 9223372036854775808);"));
        assert!(code.contains("*grids.u(t + 1, x + 9223372036854775807) = temp0;"));
        let code = render(&soln, "avx512");
        assert!(code.contains("_mm512_loadu_ps(grids.u(t, x - 9223372036854775808))"));
    }

    #[test]
    fn output_is_deterministic() {
        let soln = heat_1d();
        assert_eq!(render(&soln, "avx2"), render(&soln, "avx2"));
    }
}
