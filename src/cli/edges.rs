use clap::Parser;
use tracing::instrument;

use super::{OutputFormat, Session, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Dump every materialized dependency edge")]
pub struct Edges {
    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Edges {
    #[instrument(level = "debug", skip_all)]
    pub fn run(self, session: &Session) -> anyhow::Result<()> {
        let engine = session.engine();
        let catalog = engine.catalog();
        let edges = engine.edges();

        match self.output {
            OutputFormat::Json => {
                use serde_json::json;

                let edges: Vec<_> = edges
                    .iter()
                    .map(|edge| {
                        json!({
                            "origin": edge.origin,
                            "origin_label": catalog.target_label(edge.origin),
                            "gated": edge.gated,
                            "gated_label": catalog.offering_label(edge.gated),
                            "group": edge.group,
                            "kind": edge.kind,
                            "condition": edge.condition,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&edges)?);
            }
            OutputFormat::Table => {
                for edge in &edges {
                    println!(
                        "{} → {} {} {}",
                        catalog.target_label(edge.origin),
                        catalog.offering_label(edge.gated),
                        edge.kind.to_string().info(),
                        edge.condition.to_string().dim(),
                    );
                }
                println!("\n{} edges", edges.len());
            }
        }

        Ok(())
    }
}
