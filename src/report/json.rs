use crate::shrink::{Explanation, ShrinkSummary};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, summary: &ShrinkSummary) -> Result<()> {
        let json = self.render(summary)?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }

    pub fn render(&self, summary: &ShrinkSummary) -> Result<String> {
        serde_json::to_string_pretty(&JsonReport::from_summary(summary)).into_diagnostic()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    classes: JsonClassCounts,
    removed: JsonRemoved,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    explanations: &'a [Explanation],
}

#[derive(Serialize)]
struct JsonClassCounts {
    original: usize,
    remaining: usize,
}

#[derive(Serialize)]
struct JsonRemoved {
    classes: usize,
    fields: usize,
    methods: usize,
    constants: usize,
    attributes: usize,
    metadata_nodes: usize,
    kotlin_modules: usize,
}

impl<'a> JsonReport<'a> {
    fn from_summary(summary: &'a ShrinkSummary) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            classes: JsonClassCounts {
                original: summary.original_classes,
                remaining: summary.final_classes,
            },
            removed: JsonRemoved {
                classes: summary.removed_classes,
                fields: summary.removed_fields,
                methods: summary.removed_methods,
                constants: summary.removed_constants,
                attributes: summary.removed_attributes,
                metadata_nodes: summary.removed_metadata_nodes,
                kotlin_modules: summary.removed_modules,
            },
            explanations: &summary.explanations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_summary() {
        let summary = ShrinkSummary {
            original_classes: 4,
            final_classes: 1,
            removed_classes: 3,
            removed_methods: 2,
            ..ShrinkSummary::default()
        };
        let json = JsonReporter::new(None).render(&summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["classes"]["original"], 4);
        assert_eq!(value["classes"]["remaining"], 1);
        assert_eq!(value["removed"]["methods"], 2);
        assert!(value.get("explanations").is_none());
    }
}
