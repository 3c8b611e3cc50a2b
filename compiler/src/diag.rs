// diag.rs — Diagnostics for the stencil front end
//
// Shared diagnostic types used by parsing, resolution, and the compile
// driver. Each diagnostic carries a stable code from `codes`, a source span,
// and an optional remediation hint.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0130`).
///
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Syntax
    pub const E0001: DiagCode = DiagCode("E0001"); // lex or parse error

    // Solution header and settings
    pub const E0100: DiagCode = DiagCode("E0100"); // missing `solution` statement
    pub const E0101: DiagCode = DiagCode("E0101"); // duplicate `solution` statement
    pub const E0102: DiagCode = DiagCode("E0102"); // unknown setting
    pub const E0103: DiagCode = DiagCode("E0103"); // invalid setting value

    // Dimensions
    pub const E0110: DiagCode = DiagCode("E0110"); // dimension declared twice
    pub const E0111: DiagCode = DiagCode("E0111"); // second step dimension

    // Grids
    pub const E0120: DiagCode = DiagCode("E0120"); // unknown dimension
    pub const E0121: DiagCode = DiagCode("E0121"); // duplicate grid
    pub const E0122: DiagCode = DiagCode("E0122"); // invalid grid dimensions

    // Point references
    pub const E0130: DiagCode = DiagCode("E0130"); // unknown grid
    pub const E0131: DiagCode = DiagCode("E0131"); // index names out of order
    pub const E0132: DiagCode = DiagCode("E0132"); // index count mismatch
    pub const E0133: DiagCode = DiagCode("E0133"); // non-integer offset

    // Equations and output
    pub const E0140: DiagCode = DiagCode("E0140"); // causality violation
    pub const E0141: DiagCode = DiagCode("E0141"); // division by constant zero
    pub const E0199: DiagCode = DiagCode("E0199"); // other model error
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// 1-based `(line, column)` of a byte offset in `source`.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, col)
}
