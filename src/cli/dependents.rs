use clap::Parser;
use prereqs::SubjectRef;
use tracing::instrument;

use super::{OutputFormat, Session, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "List offerings whose requirements mention a subject or its offerings")]
pub struct Dependents {
    /// The subject (CODE or PROGRAM/CODE)
    subject: SubjectRef,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Dependents {
    #[instrument(level = "debug", skip(self, session), fields(subject = %self.subject))]
    pub fn run(self, session: &Session) -> anyhow::Result<()> {
        let engine = session.engine();
        let catalog = engine.catalog();
        let subject = session.subject(&self.subject)?;
        let edges = engine.dependents(subject);

        match self.output {
            OutputFormat::Json => {
                use serde_json::json;

                let dependents: Vec<_> = edges
                    .iter()
                    .map(|edge| {
                        json!({
                            "origin": catalog.target_label(edge.origin),
                            "gated": edge.gated,
                            "label": catalog.offering_label(edge.gated),
                            "kind": edge.kind,
                            "condition": edge.condition,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&dependents)?);
            }
            OutputFormat::Table => {
                if edges.is_empty() {
                    println!("No requirements mention {}.", self.subject);
                    return Ok(());
                }
                for edge in &edges {
                    println!(
                        "{:<40} {:<16} {} {}",
                        catalog.offering_label(edge.gated),
                        edge.kind.to_string().info(),
                        catalog.target_label(edge.origin),
                        edge.condition.to_string().dim(),
                    );
                }
            }
        }

        Ok(())
    }
}
