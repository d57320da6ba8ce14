use clap::Parser;
use prereqs::UnresolvedReference;
use tracing::instrument;

use super::{OutputFormat, Session, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Report build problems, cycles and unresolved references")]
pub struct Validate {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress all output except the exit code
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug, Default)]
struct ValidationResult {
    build_issues: Vec<(String, String)>,
    cycles: Vec<(String, String)>,
    unresolved: Vec<(String, UnresolvedReference)>,
}

impl ValidationResult {
    fn count(&self) -> usize {
        self.build_issues.len() + self.cycles.len() + self.unresolved.len()
    }
}

impl Validate {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, session: &Session) -> anyhow::Result<()> {
        let engine = session.engine();
        let catalog = engine.catalog();
        let mut result = ValidationResult::default();

        for report in session.reports() {
            let label = catalog.offering_label(report.offering);
            for error in &report.errors {
                // Unresolved leaves are listed by the audit below.
                if !error.is_resolution() {
                    result.build_issues.push((label.clone(), error.to_string()));
                }
            }
            for cycle in &report.cycles {
                result.cycles.push((label.clone(), cycle.node.to_string()));
            }
        }

        for (offering, references) in engine.audit() {
            let label = catalog.offering_label(offering);
            result
                .unresolved
                .extend(references.into_iter().map(|r| (label.clone(), r)));
        }

        if !self.quiet {
            match self.output {
                OutputFormat::Table => Self::output_table(&result, session),
                OutputFormat::Json => Self::output_json(&result)?,
            }
        }

        if result.count() > 0 {
            std::process::exit(2);
        }

        Ok(())
    }

    fn output_table(result: &ValidationResult, session: &Session) {
        let trees = session.engine().tree_count();

        if result.build_issues.is_empty() {
            println!("✓ Structure:  {trees} requirement trees, all valid");
        } else {
            println!(
                "{}",
                format!("✗ Structure:  {} issues found", result.build_issues.len()).warning()
            );
            for (offering, message) in &result.build_issues {
                println!("    {offering}: {}", message.dim());
            }
        }

        if result.cycles.is_empty() {
            println!("✓ Cycles:     none");
        } else {
            println!(
                "{}",
                format!("✗ Cycles:     {} found", result.cycles.len()).warning()
            );
            for (offering, node) in &result.cycles {
                println!("    {offering}: {}", node.dim());
            }
        }

        if result.unresolved.is_empty() {
            println!("✓ References: all resolved");
        } else {
            println!(
                "{}",
                format!("✗ References: {} unresolved", result.unresolved.len()).warning()
            );
            for (offering, reference) in &result.unresolved {
                let label = reference.label.as_deref().unwrap_or_default();
                println!(
                    "    {offering}: {} {} {}",
                    reference.kind,
                    reference.code.info(),
                    label.dim()
                );
            }
        }

        let total = result.count();
        if total == 0 {
            println!("\n{}", "Catalog is healthy (0 issues)".success());
        } else {
            println!("\n{}", format!("Summary: {total} issues found").warning());
        }
    }

    fn output_json(result: &ValidationResult) -> anyhow::Result<()> {
        use serde_json::json;

        let build: Vec<_> = result
            .build_issues
            .iter()
            .map(|(offering, message)| json!({ "offering": offering, "message": message }))
            .collect();
        let cycles: Vec<_> = result
            .cycles
            .iter()
            .map(|(offering, node)| json!({ "offering": offering, "node": node }))
            .collect();
        let unresolved: Vec<_> = result
            .unresolved
            .iter()
            .map(|(offering, reference)| json!({ "offering": offering, "reference": reference }))
            .collect();

        let total = result.count();
        let output = json!({
            "status": if total == 0 { "healthy" } else { "issues_found" },
            "issues": {
                "structure": build,
                "cycles": cycles,
                "unresolved": unresolved,
            },
            "summary": { "total_issues": total },
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
