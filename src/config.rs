use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::PensieveError;

#[derive(Parser, Debug)]
#[command(name = "pensieve", author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "PENSIEVE_CONFIG_FILE", global = true)]
    pub config: Option<String>,

    /// Snapshot file path
    #[arg(long, env = "PENSIEVE_SNAPSHOT_PATH", global = true)]
    pub snapshot_path: Option<String>,

    /// Seconds between periodic snapshots
    #[arg(long, env = "PENSIEVE_CRYSTALLIZE_INTERVAL", global = true)]
    pub crystallize_interval: Option<u64>,

    /// Embedding backend (fastembed | hashing)
    #[arg(long, env = "PENSIEVE_EMBEDDING_PROVIDER", global = true)]
    pub embedding_provider: Option<String>,

    /// Emit JSON logs on stderr
    #[arg(long, env = "PENSIEVE_LOG_JSON", global = true)]
    pub log_json: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the memory tools over MCP on stdio (default)
    Serve,
    /// Spawn a server, list its tools and read the memory resource
    Inspect {
        /// Server executable (defaults to this binary running `serve`)
        #[arg(long)]
        server_cmd: Option<String>,

        /// Arguments passed to the server executable
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        server_args: Vec<String>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub snapshot_path: PathBuf,
    pub crystallize_interval_secs: u64,
    pub max_memories: usize,
    pub max_topics: usize,
    pub max_unsaved_memories: usize,
}

impl StoreConfig {
    pub fn crystallize_interval(&self) -> Duration {
        Duration::from_secs(self.crystallize_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("pensieve_memories.json"),
            crystallize_interval_secs: 60,
            max_memories: 10,
            max_topics: 2,
            max_unsaved_memories: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[serde(alias = "fast-embed")]
    FastEmbed,
    Hashing,
}

/// Local embedding models known to work with the store.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingModelKind {
    #[serde(rename = "bge-small-en-v1.5")]
    BgeSmallEnV15,
    #[serde(rename = "bge-base-en-v1.5")]
    BgeBaseEnV15,
    #[serde(rename = "all-minilm-l6-v2")]
    AllMiniLmL6V2,
    #[serde(rename = "all-minilm-l12-v2")]
    AllMiniLmL12V2,
    #[serde(rename = "multilingual-e5-small")]
    MultilingualE5Small,
}

impl EmbeddingModelKind {
    pub fn fastembed_model(self) -> fastembed::EmbeddingModel {
        use fastembed::EmbeddingModel;
        match self {
            Self::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            Self::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
            Self::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            Self::AllMiniLmL12V2 => EmbeddingModel::AllMiniLML12V2,
            Self::MultilingualE5Small => EmbeddingModel::MultilingualE5Small,
        }
    }
}

impl fmt::Display for EmbeddingModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BgeSmallEnV15 => "bge-small-en-v1.5",
            Self::BgeBaseEnV15 => "bge-base-en-v1.5",
            Self::AllMiniLmL6V2 => "all-minilm-l6-v2",
            Self::AllMiniLmL12V2 => "all-minilm-l12-v2",
            Self::MultilingualE5Small => "multilingual-e5-small",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingBackend,
    /// Model used to match queries against memory titles.
    pub title_model: EmbeddingModelKind,
    /// Model used to compare topic names.
    pub topic_model: EmbeddingModelKind,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
    pub hashing_dimension: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Priority: CLI flag > CLI env var > `PENSIEVE_` env > config file > defaults.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let defaults = StoreConfig::default();
        let mut builder = Config::builder()
            .set_default(
                "store.snapshot_path",
                defaults.snapshot_path.to_string_lossy().into_owned(),
            )?
            .set_default(
                "store.crystallize_interval_secs",
                defaults.crystallize_interval_secs,
            )?
            .set_default("store.max_memories", defaults.max_memories as u64)?
            .set_default("store.max_topics", defaults.max_topics as u64)?
            .set_default(
                "store.max_unsaved_memories",
                defaults.max_unsaved_memories as u64,
            )?
            .set_default("embedding.provider", "fastembed")?
            .set_default("embedding.title_model", "bge-small-en-v1.5")?
            .set_default("embedding.topic_model", "all-minilm-l6-v2")?
            .set_default("embedding.show_download_progress", false)?
            .set_default("embedding.hashing_dimension", 256)?
            .set_default("logging.json", false)?;

        // Explicit file is required; ./pensieve.{yaml,toml,json} is picked up if present.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("pensieve").required(false)),
        };

        // E.g. PENSIEVE_STORE__MAX_MEMORIES=20
        builder = builder.add_source(
            Environment::with_prefix("PENSIEVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(path) = &cli.snapshot_path {
            builder = builder.set_override("store.snapshot_path", path.as_str())?;
        }
        if let Some(secs) = cli.crystallize_interval {
            builder = builder.set_override("store.crystallize_interval_secs", secs)?;
        }
        if let Some(provider) = &cli.embedding_provider {
            builder = builder.set_override("embedding.provider", provider.to_lowercase())?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("logging.json", json)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    /// Reject settings the store cannot run with. Messages name the setting to fix.
    pub fn validate(&self) -> Result<(), PensieveError> {
        if self.store.snapshot_path.as_os_str().is_empty() {
            return Err(PensieveError::Config(
                "store.snapshot_path is empty; set PENSIEVE_STORE__SNAPSHOT_PATH or pass --snapshot-path"
                    .to_string(),
            ));
        }
        let positive = [
            ("store.crystallize_interval_secs", self.store.crystallize_interval_secs as usize),
            ("store.max_memories", self.store.max_memories),
            ("store.max_topics", self.store.max_topics),
            ("store.max_unsaved_memories", self.store.max_unsaved_memories),
            ("embedding.hashing_dimension", self.embedding.hashing_dimension),
        ];
        for (key, value) in positive {
            if value == 0 {
                let env = format!("PENSIEVE_{}", key.replace('.', "__").to_uppercase());
                return Err(PensieveError::Config(format!(
                    "{key} must be at least 1; set {env} or {key} in pensieve.yaml"
                )));
            }
        }
        Ok(())
    }

    /// The subcommand to run; `serve` when none is given.
    pub fn command(cli: &Cli) -> Command {
        cli.command.clone().unwrap_or(Command::Serve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AppConfig {
        AppConfig {
            store: StoreConfig::default(),
            embedding: EmbeddingConfig {
                provider: EmbeddingBackend::Hashing,
                title_model: EmbeddingModelKind::BgeSmallEnV15,
                topic_model: EmbeddingModelKind::AllMiniLmL6V2,
                cache_dir: None,
                show_download_progress: false,
                hashing_dimension: 64,
            },
            logging: LoggingConfig { json: false },
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut cfg = base();
        cfg.store.max_topics = 0;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("store.max_topics"));
        assert!(err.contains("PENSIEVE_STORE__MAX_TOPICS"));
    }

    #[test]
    fn test_validate_rejects_empty_snapshot_path() {
        let mut cfg = base();
        cfg.store.snapshot_path = PathBuf::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_inspect_subcommand_parses_trailing_args() {
        let cli = Cli::try_parse_from([
            "pensieve",
            "inspect",
            "--server-cmd",
            "python",
            "main.py",
            "--flag",
        ])
        .unwrap();
        assert_eq!(
            AppConfig::command(&cli),
            Command::Inspect {
                server_cmd: Some("python".to_string()),
                server_args: vec!["main.py".to_string(), "--flag".to_string()],
            }
        );
    }

    #[test]
    fn test_model_kind_display_matches_config_name() {
        assert_eq!(EmbeddingModelKind::AllMiniLmL6V2.to_string(), "all-minilm-l6-v2");
    }
}
