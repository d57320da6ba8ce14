use std::path::{Path, PathBuf};

mod check;
mod dependents;
mod edges;
mod terminal;
mod unlocks;
mod validate;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use dependents::Dependents;
use edges::Edges;
use prereqs::{
    CatalogSnapshot, Engine, EngineConfig, IngestReport, StatusFile, StatusSnapshot, SubjectId,
    SubjectRef,
};
use tracing::{debug, instrument};
use unlocks::Unlocks;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The catalog snapshot file (YAML or JSON)
    #[arg(short, long, global = true, default_value = "catalog.yaml")]
    catalog: PathBuf,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let session = Session::load(&self.catalog, self.config.as_deref())?;
        self.command.run(&session)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Check which offerings of a subject a student may take
    Check(Check),

    /// List offerings that completing a subject would unlock
    Unlocks(Unlocks),

    /// List offerings whose requirements mention a subject
    ///
    /// This is a one-hop listing. It says nothing about eligibility.
    Dependents(Dependents),

    /// Dump the materialized dependency edges
    Edges(Edges),

    /// Report build problems and unresolved references
    Validate(Validate),
}

impl Command {
    fn run(self, session: &Session) -> anyhow::Result<()> {
        match self {
            Self::Check(command) => command.run(session)?,
            Self::Unlocks(command) => command.run(session)?,
            Self::Dependents(command) => command.run(session)?,
            Self::Edges(command) => command.run(session)?,
            Self::Validate(command) => command.run(session)?,
        }
        Ok(())
    }
}

/// A loaded engine, shared by every subcommand.
#[derive(Debug)]
pub struct Session {
    engine: Engine,
    reports: Vec<IngestReport>,
}

impl Session {
    #[instrument(level = "debug")]
    fn load(catalog: &Path, config: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => EngineConfig::default(),
        };

        let loaded = CatalogSnapshot::load(catalog)
            .and_then(CatalogSnapshot::into_catalog)
            .with_context(|| format!("failed to load catalog from {}", catalog.display()))?;

        let (engine, reports) = Engine::from_snapshot(loaded, config);
        debug!(trees = engine.tree_count(), "engine ready");
        Ok(Self { engine, reports })
    }

    const fn engine(&self) -> &Engine {
        &self.engine
    }

    fn reports(&self) -> &[IngestReport] {
        &self.reports
    }

    /// Reads a status file, or an empty snapshot if none is given.
    fn status(&self, path: Option<&Path>) -> anyhow::Result<StatusSnapshot> {
        let Some(path) = path else {
            return Ok(StatusSnapshot::default());
        };
        let snapshot = StatusFile::load(path)
            .and_then(|file| file.resolve(self.engine.catalog()))
            .with_context(|| format!("failed to load status from {}", path.display()))?;
        Ok(snapshot)
    }

    fn subject(&self, reference: &SubjectRef) -> anyhow::Result<SubjectId> {
        self.engine
            .catalog()
            .find_subject(reference)
            .with_context(|| format!("cannot find subject {reference}"))
    }
}
