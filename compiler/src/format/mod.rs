// format — Output formatter registry
//
// A formatter renders a whole solution to text. The registry maps format
// identifiers ("dot", "cpp", "avx512", ...) to formatter objects, so new
// targets are added by registering another `Formatter` rather than by
// editing existing ones.

pub mod code;
pub mod dot;
pub mod json;
pub mod pseudo;
pub mod target;

use std::collections::BTreeMap;

use crate::error::{Result, StencilError};
use crate::solution::Solution;

pub use code::CodeFormatter;
pub use dot::DotFormatter;
pub use json::JsonFormatter;
pub use pseudo::PseudoFormatter;
pub use target::{Target, TARGETS};

/// Options shared by the kernel-producing backends.
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Share structurally identical subexpressions.
    pub cse: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions { cse: true }
    }
}

/// A backend that renders a solution. Must not depend on anything but the
/// solution, so repeated calls produce identical text.
pub trait Formatter {
    fn id(&self) -> &str;

    fn description(&self) -> String;

    fn render(&self, solution: &Solution) -> Result<String>;
}

// ── Registry ────────────────────────────────────────────────────────────────

pub struct FormatRegistry {
    formatters: BTreeMap<String, Box<dyn Formatter>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    pub fn new() -> Self {
        FormatRegistry {
            formatters: BTreeMap::new(),
        }
    }

    /// Registry with `dot`, `pseudo`, `json`, and one code formatter per
    /// entry of `TARGETS`.
    pub fn with_builtins(options: CodegenOptions) -> Self {
        let mut reg = FormatRegistry::new();
        let builtins: Vec<Box<dyn Formatter>> = vec![
            Box::new(DotFormatter),
            Box::new(PseudoFormatter::new(options.clone())),
            Box::new(JsonFormatter),
        ];
        for f in builtins.into_iter().chain(
            TARGETS
                .iter()
                .map(|t| Box::new(CodeFormatter::new(*t, options.clone())) as Box<dyn Formatter>),
        ) {
            // Built-in ids are distinct.
            let _ = reg.register(f);
        }
        reg
    }

    pub fn register(&mut self, formatter: Box<dyn Formatter>) -> Result<()> {
        let id = formatter.id().to_string();
        if self.formatters.contains_key(&id) {
            return Err(StencilError::DuplicateFormat(id));
        }
        self.formatters.insert(id, formatter);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<&dyn Formatter> {
        self.formatters
            .get(id)
            .map(|f| f.as_ref())
            .ok_or_else(|| StencilError::UnsupportedTarget {
                id: id.to_string(),
                available: self.ids().collect::<Vec<_>>().join(", "),
            })
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.formatters.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }
}

/// Sanitize a name to C/DOT identifier characters.
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Formatter for Upper {
        fn id(&self) -> &str {
            "upper"
        }

        fn description(&self) -> String {
            "solution name in capitals".into()
        }

        fn render(&self, solution: &Solution) -> Result<String> {
            Ok(solution.name().to_uppercase())
        }
    }

    #[test]
    fn builtins_are_registered() {
        let reg = FormatRegistry::with_builtins(CodegenOptions::default());
        let ids: Vec<&str> = reg.ids().collect();
        assert_eq!(
            ids,
            vec!["avx", "avx2", "avx512", "cpp", "dot", "json", "knl", "pseudo"]
        );
        assert_eq!(reg.len(), 8);
    }

    #[test]
    fn unknown_id_lists_available() {
        let reg = FormatRegistry::with_builtins(CodegenOptions::default());
        let err = reg.lookup("sse").err().unwrap();
        assert!(err.to_string().contains("unsupported format 'sse'"));
        assert!(err.to_string().contains("avx512"));
    }

    #[test]
    fn custom_formatter_and_duplicates() {
        let mut reg = FormatRegistry::new();
        assert!(reg.is_empty());
        reg.register(Box::new(Upper)).unwrap();
        assert!(matches!(
            reg.register(Box::new(Upper)),
            Err(StencilError::DuplicateFormat(_))
        ));

        let soln = Solution::new("heat");
        let mut out = crate::output::StringOutput::new();
        soln.format_with(&reg, "upper", &mut out).unwrap();
        assert_eq!(out.get_string(), "HEAT");
    }

    #[test]
    fn sanitize_replaces_punctuation() {
        assert_eq!(sanitize("wave-2d.v1"), "wave_2d_v1");
    }
}
