//! CLI configuration with environment variable priority
//!
//! Configuration is resolved in this order (first found wins):
//! 1. Environment variables (SECREF_*)
//! 2. Config file (secref.toml)
//! 3. Default values

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use secref_engine::{EngineConfig, WellKnownField};
use serde::Deserialize;

/// Environment variable prefix
const ENV_PREFIX: &str = "SECREF";

/// Well-known path registered when the config file has no `[engine]` section
const DEFAULT_WELL_KNOWN_PATH: &str = "auth.key";

/// Where secret records live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Keychain,
    File,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keychain" => Ok(Self::Keychain),
            "file" => Ok(Self::File),
            _ => anyhow::bail!("Invalid backend: {}. Use 'keychain' or 'file'", s),
        }
    }
}

/// CLI configuration (parsed from TOML, can be overridden by env)
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    /// Secret backend: "keychain" or "file"
    pub backend: Option<String>,

    /// Directory for the file backend
    pub store_dir: Option<String>,

    /// Directory for the scope ledger
    pub ledger_dir: Option<String>,

    /// Keychain service name
    pub keychain_service: Option<String>,

    /// Engine settings; replaces the CLI defaults as a whole when present
    pub engine: Option<EngineConfig>,
}

/// Resolved configuration
#[derive(Debug)]
pub struct ResolvedConfig {
    pub backend: BackendKind,
    pub store_dir: PathBuf,
    pub ledger_dir: PathBuf,
    pub keychain_service: String,
    pub engine: EngineConfig,
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

/// Default data directory, e.g. `~/.local/share/secref`
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("secref")
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl CliConfig {
    /// Load configuration from a TOML file (optional)
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve configuration from environment variables first, then config file
    pub fn resolve(self) -> anyhow::Result<ResolvedConfig> {
        self.resolve_with(get_env)
    }

    fn resolve_with(self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<ResolvedConfig> {
        // Backend: ENV > config > file
        let backend: BackendKind = env("BACKEND")
            .or(self.backend)
            .as_deref()
            .unwrap_or("file")
            .parse()?;

        // Directories: ENV > config > data dir
        let store_dir = env("STORE_DIR")
            .or(self.store_dir)
            .map(|p| expand(&p))
            .unwrap_or_else(|| data_dir().join("secrets"));
        let ledger_dir = env("LEDGER_DIR")
            .or(self.ledger_dir)
            .map(|p| expand(&p))
            .unwrap_or_else(|| data_dir().join("ledger"));

        let keychain_service = env("KEYCHAIN_SERVICE")
            .or(self.keychain_service)
            .unwrap_or_else(|| "secref".to_string());

        let mut engine = self.engine.unwrap_or_else(|| {
            EngineConfig::default().with_well_known(WellKnownField::new(DEFAULT_WELL_KNOWN_PATH))
        });

        if let Some(suffix) = env("SUFFIX") {
            engine.secret_suffix = suffix;
        }
        if let Some(max) = env("MAX_NAME_LENGTH") {
            engine.max_name_length = max
                .parse()
                .with_context(|| format!("Invalid {}_MAX_NAME_LENGTH: {}", ENV_PREFIX, max))?;
        }

        engine.validate().context("Invalid engine configuration")?;

        Ok(ResolvedConfig {
            backend,
            store_dir,
            ledger_dir,
            keychain_service,
            engine,
        })
    }
}
