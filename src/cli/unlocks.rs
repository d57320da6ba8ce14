use std::path::PathBuf;

use clap::Parser;
use prereqs::SubjectRef;
use tracing::instrument;

use super::{OutputFormat, Session, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "List offerings that approving a subject would make available")]
pub struct Unlocks {
    /// The subject (CODE or PROGRAM/CODE)
    subject: SubjectRef,

    /// Student status file (YAML or JSON). Without one, nothing is completed.
    #[arg(short, long)]
    status: Option<PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Unlocks {
    #[instrument(level = "debug", skip(self, session), fields(subject = %self.subject))]
    pub fn run(self, session: &Session) -> anyhow::Result<()> {
        let engine = session.engine();
        let catalog = engine.catalog();
        let subject = session.subject(&self.subject)?;
        let status = session.status(self.status.as_deref())?;

        let report = engine.unlocked_by_detailed(subject, &status);

        match self.output {
            OutputFormat::Json => {
                use serde_json::json;

                let unlocked: Vec<_> = report
                    .unlocked
                    .iter()
                    .map(|offering| {
                        json!({
                            "offering": offering,
                            "label": catalog.offering_label(*offering),
                        })
                    })
                    .collect();
                let output = json!({
                    "subject": self.subject.to_string(),
                    "unlocked": unlocked,
                    "candidates": report.candidates,
                    "diagnostics": report.diagnostics,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if report.unlocked.is_empty() {
                    println!(
                        "Approving {} unlocks nothing ({} candidates checked).",
                        self.subject, report.candidates
                    );
                    return Ok(());
                }
                println!("Approving {} unlocks:", self.subject.to_string().info());
                for offering in &report.unlocked {
                    println!("  {} {}", "+".success(), catalog.offering_label(*offering));
                }
            }
        }

        Ok(())
    }
}
