// dims.rs — Iteration dimensions
//
// A stencil is applied over one step dimension (simulation time) and any
// number of domain dimensions (spatial axes). Dimensions carry no global
// identity: two values with the same name and kind compare equal, and
// consistency across grids is checked per solution.

use std::fmt;

use serde::Serialize;

/// Whether a dimension is the step (time) axis or a spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DimKind {
    Step,
    Domain,
}

impl fmt::Display for DimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimKind::Step => write!(f, "step"),
            DimKind::Domain => write!(f, "domain"),
        }
    }
}

/// A named axis of iteration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dimension {
    name: String,
    kind: DimKind,
}

impl Dimension {
    pub fn new(name: impl Into<String>, kind: DimKind) -> Self {
        Dimension {
            name: name.into(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DimKind {
        self.kind
    }

    pub fn is_step(&self) -> bool {
        self.kind == DimKind::Step
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Create a step (time) dimension.
pub fn new_step_index(name: impl Into<String>) -> Dimension {
    Dimension::new(name, DimKind::Step)
}

/// Create a domain (spatial) dimension.
pub fn new_domain_index(name: impl Into<String>) -> Dimension {
    Dimension::new(name, DimKind::Domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_kind_is_equal() {
        let a = new_domain_index("x");
        let b = new_domain_index("x");
        assert_eq!(a, b);
    }

    #[test]
    fn kind_participates_in_equality() {
        assert_ne!(new_step_index("t"), new_domain_index("t"));
    }

    #[test]
    fn step_predicate() {
        assert!(new_step_index("t").is_step());
        assert!(!new_domain_index("x").is_step());
    }
}
