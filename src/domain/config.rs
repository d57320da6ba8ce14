use std::{num::NonZeroUsize, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for evaluation and unlock computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct EngineConfig {
    /// How many edge hops away from a completed subject unlock candidates are
    /// collected.
    ///
    /// One hop finds offerings whose trees mention the subject directly. Two
    /// hops also find offerings gated by those offerings, and so on.
    unlock_hops: NonZeroUsize,

    /// Whether a `Credited` status satisfies an `APPROVED` condition.
    pub credited_satisfies_approved: bool,

    /// Whether inactive offerings may be evaluated as eligible and reported
    /// as unlocked.
    pub include_inactive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unlock_hops: default_unlock_hops(),
            credited_satisfies_approved: true,
            include_inactive: false,
        }
    }
}

/// Errors raised while loading or saving an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid configuration.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be serialised.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl EngineConfig {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Saves the configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialised or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The unlock search depth.
    #[must_use]
    pub const fn unlock_hops(&self) -> NonZeroUsize {
        self.unlock_hops
    }

    /// Sets the unlock search depth.
    #[must_use]
    pub const fn with_unlock_hops(mut self, hops: NonZeroUsize) -> Self {
        self.unlock_hops = hops;
        self
    }

    /// Sets whether inactive offerings can be reported eligible.
    #[must_use]
    pub const fn with_include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    /// Sets whether a `Credited` status satisfies an `APPROVED` leaf.
    #[must_use]
    pub const fn with_credited_satisfies_approved(mut self, credited: bool) -> Self {
        self.credited_satisfies_approved = credited;
        self
    }
}

const fn default_unlock_hops() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(1)
}

const fn default_true() -> bool {
    true
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_unlock_hops")]
        unlock_hops: NonZeroUsize,

        #[serde(default = "default_true")]
        credited_satisfies_approved: bool,

        #[serde(default)]
        include_inactive: bool,
    },
}

impl From<Versions> for EngineConfig {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                unlock_hops,
                credited_satisfies_approved,
                include_inactive,
            } => Self {
                unlock_hops,
                credited_satisfies_approved,
                include_inactive,
            },
        }
    }
}

impl From<EngineConfig> for Versions {
    fn from(config: EngineConfig) -> Self {
        Self::V1 {
            unlock_hops: config.unlock_hops,
            credited_satisfies_approved: config.credited_satisfies_approved,
            include_inactive: config.include_inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nunlock_hops = 3\ncredited_satisfies_approved = false\ninclude_inactive = true\n",
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();

        assert_eq!(config.unlock_hops().get(), 3);
        assert!(!config.credited_satisfies_approved);
        assert!(config.include_inactive);
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = EngineConfig::load(&missing).unwrap_err();
        assert!(matches!(error, ConfigError::Io(_)));
    }

    #[test]
    fn zero_hops_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nunlock_hops = 0\n").unwrap();

        let error = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = EngineConfig::default();
        let actual: EngineConfig = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("engine.toml");
        let config = EngineConfig {
            include_inactive: true,
            ..EngineConfig::default()
        }
        .with_unlock_hops(NonZeroUsize::new(4).unwrap());

        config.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("_version = \"1\""));
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
