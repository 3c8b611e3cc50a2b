// target.rs — Instruction-set families for generated C++
//
// Each target names a vector register width and the intrinsic prefix used
// for its arithmetic, load, store, and broadcast operations. Lane count
// follows from the solution's element width: 256-bit AVX holds 8 floats or
// 4 doubles; 512-bit AVX-512 holds 16 floats or 8 doubles.

/// One code-generation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub id: &'static str,
    pub description: &'static str,
    /// Register width in bits; 0 for scalar code.
    pub vector_bits: u32,
    /// Intrinsic name prefix, e.g. `_mm256`.
    pub intrinsic_prefix: &'static str,
}

pub const TARGETS: [Target; 5] = [
    Target {
        id: "cpp",
        description: "portable scalar C++",
        vector_bits: 0,
        intrinsic_prefix: "",
    },
    Target {
        id: "avx",
        description: "Intel AVX, 256-bit vectors",
        vector_bits: 256,
        intrinsic_prefix: "_mm256",
    },
    Target {
        id: "avx2",
        description: "Intel AVX2, 256-bit vectors",
        vector_bits: 256,
        intrinsic_prefix: "_mm256",
    },
    Target {
        id: "avx512",
        description: "Intel AVX-512, 512-bit vectors",
        vector_bits: 512,
        intrinsic_prefix: "_mm512",
    },
    Target {
        id: "knl",
        description: "Intel Xeon Phi (Knights Landing), 512-bit vectors",
        vector_bits: 512,
        intrinsic_prefix: "_mm512",
    },
];

impl Target {
    pub fn is_vector(&self) -> bool {
        self.vector_bits > 0
    }

    /// Elements per register for `element_bytes`-wide reals.
    pub fn lanes(&self, element_bytes: u32) -> u32 {
        if self.is_vector() {
            self.vector_bits / (8 * element_bytes)
        } else {
            1
        }
    }

    /// `__m256`, `__m512d`, ... (or `real_t` for scalar targets).
    pub fn vector_type(&self, element_bytes: u32) -> String {
        if !self.is_vector() {
            return "real_t".to_string();
        }
        let suffix = if element_bytes == 8 { "d" } else { "" };
        format!("__m{}{}", self.vector_bits, suffix)
    }

    /// Full intrinsic name for `op`, e.g. `_mm256_add_ps`.
    pub fn intrinsic(&self, op: &str, element_bytes: u32) -> String {
        let suffix = if element_bytes == 8 { "pd" } else { "ps" };
        format!("{}_{}_{}", self.intrinsic_prefix, op, suffix)
    }
}

pub fn find_target(id: &str) -> Option<&'static Target> {
    TARGETS.iter().find(|t| t.id == id)
}
