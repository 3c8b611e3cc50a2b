// json.rs — Machine-readable solution manifest
//
// Prints the solution manifest (grids, dimensions, equations) together with
// its fingerprint. Tools that post-process generated code use this to check
// which stencil a header was produced from.

use serde::Serialize;

use crate::error::Result;
use crate::manifest::{fingerprint, SolutionManifest};
use crate::solution::Solution;

use super::Formatter;

pub struct JsonFormatter;

#[derive(Serialize)]
struct JsonDocument {
    fingerprint: String,
    #[serde(flatten)]
    manifest: SolutionManifest,
}

impl Formatter for JsonFormatter {
    fn id(&self) -> &str {
        "json"
    }

    fn description(&self) -> String {
        "JSON solution manifest".to_string()
    }

    fn render(&self, solution: &Solution) -> Result<String> {
        let doc = JsonDocument {
            fingerprint: fingerprint(solution)?,
            manifest: SolutionManifest::from_solution(solution),
        };
        let mut text = serde_json::to_string_pretty(&doc)?;
        text.push('\n');
        Ok(text)
    }
}
