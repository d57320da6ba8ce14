use std::path::PathBuf;

use clap::Parser;
use prereqs::{CatalogProvider, SubjectRef};
use tracing::instrument;

use super::{OutputFormat, Session, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Evaluate every offering of a subject against a student's status")]
pub struct Check {
    /// The subject (CODE or PROGRAM/CODE)
    subject: SubjectRef,

    /// Student status file (YAML or JSON). Without one, nothing is completed.
    #[arg(short, long)]
    status: Option<PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Check {
    #[instrument(level = "debug", skip(self, session), fields(subject = %self.subject))]
    pub fn run(self, session: &Session) -> anyhow::Result<()> {
        let engine = session.engine();
        let catalog = engine.catalog();
        let subject = session.subject(&self.subject)?;
        let status = session.status(self.status.as_deref())?;

        let results: Vec<_> = catalog
            .offerings_of(subject)
            .iter()
            .map(|offering| (*offering, engine.evaluate_detailed(*offering, &status)))
            .collect();

        match self.output {
            OutputFormat::Json => {
                use serde_json::json;

                let offerings: Vec<_> = results
                    .iter()
                    .map(|(offering, evaluation)| {
                        json!({
                            "offering": offering,
                            "label": catalog.offering_label(*offering),
                            "eligible": evaluation.eligible,
                            "diagnostics": evaluation.diagnostics,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&offerings)?);
            }
            OutputFormat::Table => {
                if results.is_empty() {
                    println!("{} has no offerings.", self.subject);
                    return Ok(());
                }
                for (offering, evaluation) in &results {
                    let label = catalog.offering_label(*offering);
                    if evaluation.eligible {
                        println!("{} {label}", "✓".success());
                    } else {
                        println!("{} {label}", "✗".warning());
                    }
                    for diagnostic in &evaluation.diagnostics {
                        println!("    {}", diagnostic.to_string().dim());
                    }
                }
            }
        }

        Ok(())
    }
}
