//! Configuration settings for SignPipe
//!
//! Defines the CLI arguments, the runtime pipeline configuration and its
//! defaults.

use crate::core::{FanOut, DEFAULT_BUFFER_SIZE};
use crate::error::{IoResultExt, PipelineError, Result};
use crate::hash::{ClassicSigner, DataSigner, StandardSigner};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// SignPipe - concurrent hashing pipeline producing a combined signature
#[derive(Parser, Debug, Clone)]
#[command(name = "signpipe")]
#[command(author = "SignPipe Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Concurrent SingleHash -> MultiHash -> Combine signature pipeline")]
#[command(long_about = r#"
SignPipe runs integer inputs through a three-stage concurrent pipeline:

  SingleHash  checksum(n) ~ checksum(digest(n)), digest serialized per stage
  MultiHash   six positional checksums per item, fanned out in parallel
  Combine     sort all results and join them with '_'

Examples:
  signpipe run 0 1                      # Signature of [0, 1]
  signpipe run 0 1 1 2 3 5 8 --fan-out workers --threads 4
  signpipe run 0 1 --checksum-latency 1s --digest-latency 10ms
  signpipe single-hash 0                # Hash one value
"#)]
pub struct CliArgs {
    /// Capacity of each inter-stage channel
    #[arg(short = 'b', long, global = true, value_name = "NUM")]
    pub buffer_size: Option<usize>,

    /// Fan-out strategy for the hashing stages
    #[arg(long, value_enum, value_name = "STRATEGY", global = true)]
    pub fan_out: Option<FanOutStrategy>,

    /// Worker threads per stage for the `workers` strategy (0 = auto-detect)
    #[arg(short = 't', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Hash functions backing the checksum and content digest
    #[arg(long, value_enum, value_name = "SIGNER", global = true)]
    pub signer: Option<SignerKind>,

    /// Simulated latency of every checksum call (e.g. 1s, 250ms)
    #[arg(long, global = true, value_name = "DURATION")]
    pub checksum_latency: Option<String>,

    /// Simulated latency of every content digest call (e.g. 10ms)
    #[arg(long, global = true, value_name = "DURATION")]
    pub digest_latency: Option<String>,

    /// JSON config file; command-line options override its values
    #[arg(short = 'c', long, global = true, value_name = "PATH", env = "SIGNPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for the result
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub output_format: OutputFormat,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only print the signature)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the full pipeline and print the combined signature
    #[command(name = "run")]
    Run {
        /// Integer inputs fed into the pipeline
        #[arg(value_name = "INPUT", allow_negative_numbers = true)]
        inputs: Vec<i64>,
    },

    /// Compute the SingleHash of one integer
    #[command(name = "single-hash")]
    SingleHash {
        /// Value to hash
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Compute the MultiHash of one string
    #[command(name = "multi-hash")]
    MultiHash {
        /// String to hash
        data: String,
    },

    /// Sort and join strings the way the Combine stage does
    #[command(name = "combine")]
    Combine {
        /// Parts to combine
        parts: Vec<String>,
    },

    /// Print the effective configuration as JSON
    #[command(name = "show-config")]
    ShowConfig,
}

/// Fan-out strategy for CLI and config files
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FanOutStrategy {
    /// One thread per item (unbounded)
    #[default]
    PerItem,
    /// Fixed worker pool per stage
    Workers,
}

/// Hash function pair used by the pipeline
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SignerKind {
    /// XXH64 checksum, SHA-256 digest
    #[default]
    Standard,
    /// CRC32 checksum, MD5 digest
    Classic,
}

/// Output format for results
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Runtime configuration of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of each inter-stage channel
    pub buffer_size: usize,
    /// Fan-out strategy for the hashing stages
    pub fan_out: FanOutStrategy,
    /// Workers per stage for the `workers` strategy (0 = auto-detect)
    pub threads: usize,
    /// Hash function pair
    pub signer: SignerKind,
    /// Simulated checksum latency ("1s", "500us")
    #[serde(with = "humantime_duration")]
    pub checksum_latency: Duration,
    /// Simulated content digest latency
    #[serde(with = "humantime_duration")]
    pub digest_latency: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            fan_out: FanOutStrategy::PerItem,
            threads: 0, // Auto-detect
            signer: SignerKind::Standard,
            checksum_latency: Duration::ZERO,
            digest_latency: Duration::ZERO,
        }
    }
}

/// Parse a human-readable duration ("1s", "250ms", "0")
pub fn parse_duration(value: &str) -> std::result::Result<Duration, String> {
    let value = value.trim();
    if value == "0" {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(value).map_err(|e| format!("Invalid duration '{}': {}", value, e))
}

/// Durations are stored as humantime strings in config files
mod humantime_duration {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_duration(&value).map_err(de::Error::custom)
    }
}

impl PipelineConfig {
    /// Resolved fan-out strategy
    pub fn fan_out(&self) -> FanOut {
        match self.fan_out {
            FanOutStrategy::PerItem => FanOut::PerItem,
            FanOutStrategy::Workers => FanOut::Workers(self.effective_threads()),
        }
    }

    /// Thread count with auto-detection applied
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Fresh signer of the configured kind honouring the configured latencies
    pub fn build_signer(&self) -> Arc<dyn DataSigner> {
        match self.signer {
            SignerKind::Standard => Arc::new(StandardSigner::with_latency(
                self.checksum_latency,
                self.digest_latency,
            )),
            SignerKind::Classic => Arc::new(ClassicSigner::with_latency(
                self.checksum_latency,
                self.digest_latency,
            )),
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(PipelineError::config("buffer_size must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).with_path(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_path(path)?;
        Ok(())
    }

    /// Create config from CLI arguments, layered over `--config` if given
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(buffer_size) = args.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(fan_out) = args.fan_out {
            config.fan_out = fan_out;
        }
        if let Some(threads) = args.threads {
            config.threads = threads;
        }
        if let Some(signer) = args.signer {
            config.signer = signer;
        }
        if let Some(latency) = &args.checksum_latency {
            config.checksum_latency = parse_duration(latency).map_err(PipelineError::ConfigError)?;
        }
        if let Some(latency) = &args.digest_latency {
            config.digest_latency = parse_duration(latency).map_err(PipelineError::ConfigError)?;
        }

        config.validate()?;
        Ok(config)
    }
}
