use crate::shrink::{Explanation, ShrinkSummary};
use colored::Colorize;
use miette::Result;

/// Terminal reporter with colored output
#[derive(Default)]
pub struct TerminalReporter;

impl TerminalReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, summary: &ShrinkSummary) -> Result<()> {
        println!();
        if summary.removed_classes == 0
            && summary.removed_fields == 0
            && summary.removed_methods == 0
        {
            println!("{}", "Nothing to shrink, every class is used".green().bold());
        } else {
            println!(
                "{}",
                format!(
                    "Shrunk {} program classes to {}",
                    summary.original_classes, summary.final_classes
                )
                .yellow()
                .bold()
            );
        }
        println!();

        self.print_counts(summary);

        if !summary.explanations.is_empty() {
            println!();
            println!("{}", "Why are you keeping:".bold());
            for explanation in &summary.explanations {
                self.print_explanation(explanation);
            }
        }
        println!();
        Ok(())
    }

    fn print_counts(&self, summary: &ShrinkSummary) {
        let rows = [
            ("classes", summary.removed_classes),
            ("fields", summary.removed_fields),
            ("methods", summary.removed_methods),
            ("constants", summary.removed_constants),
            ("attributes", summary.removed_attributes),
            ("metadata nodes", summary.removed_metadata_nodes),
            ("kotlin modules", summary.removed_modules),
        ];
        println!("{}", "─".repeat(40).dimmed());
        for (label, count) in rows {
            let count = if count > 0 {
                count.to_string().red().to_string()
            } else {
                count.to_string().dimmed().to_string()
            };
            println!("  {:<16} {}", format!("removed {label}").dimmed(), count);
        }
        println!("{}", "─".repeat(40).dimmed());
    }

    fn print_explanation(&self, explanation: &Explanation) {
        if !explanation.kept {
            println!(
                "  {} {}",
                explanation.target.white(),
                "is not kept".dimmed()
            );
            return;
        }
        println!("  {}", explanation.target.white().bold());
        for (depth, step) in explanation.chain.iter().enumerate() {
            let marker = if depth == 0 { "●".green() } else { "→".dimmed() };
            println!("    {}{} {}", "  ".repeat(depth.min(8)), marker, step);
        }
    }
}
