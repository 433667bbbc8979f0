//! Configuration for Ember.
//!
//! Configuration is a single optional YAML file (default
//! `~/.ember/config.yaml`) deserialized into [`AppConfig`]. Every field has a
//! default, so a missing file means "run with defaults" rather than an error;
//! an explicitly given `--config` path that does not exist is an error. CLI
//! flags override file values through the `with_*` builders.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Smallest agent count the run prompt accepts.
pub const MIN_AGENT_COUNT: u32 = 1;

/// Largest agent count the run prompt accepts.
pub const MAX_AGENT_COUNT: u32 = 50;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path to the run manifest the generator writes
    pub manifest_path: PathBuf,

    /// Path to the append-only event log the generator writes during a run
    pub event_log_path: PathBuf,

    /// External generator invocation
    pub generator: GeneratorConfig,

    /// Stage topology tuning
    pub topology: TopologyConfig,

    /// Agent count the run prompt starts from
    pub default_agent_count: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from("results/firestorm_manifest.json"),
            event_log_path: PathBuf::from("results/firestorm_mmap.log"),
            generator: GeneratorConfig::default(),
            topology: TopologyConfig::default(),
            default_agent_count: 5,
        }
    }
}

/// How the external test generator is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Interpreter or executable to run
    pub program: String,

    /// Script handed to the program as its first argument
    pub script: String,

    /// Working directory for the generator process
    pub working_dir: PathBuf,

    /// Time budget for one generation run, in seconds
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            script: "run-firestorm.py".to_string(),
            working_dir: PathBuf::from("."),
            timeout_secs: 300,
        }
    }
}

/// Stage layout and animation scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Ring radius the nodes sit on, in stage units
    pub radius: f64,

    /// What happens when an actor is asked to emit while mid-animation
    pub emit_overlap: EmitOverlap,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            radius: 150.0,
            emit_overlap: EmitOverlap::Concurrent,
        }
    }
}

/// Policy for emit sequences landing on an actor that is already animating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitOverlap {
    /// Later emits run concurrently with whatever is in flight
    Concurrent,
    /// Later emits wait for the actor's current emit sequence to finish
    Queued,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// With an explicit path, the file must exist and parse. With `None`, the
    /// default path is tried and a missing file falls back to defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(&p),
            None => {
                let p = default_config_path()?;
                if p.exists() {
                    Self::load_from_file(&p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EmberError::ConfigNotFound {
                    path: path.to_path_buf(),
                    source: Some(e),
                }
            } else {
                EmberError::io("reading configuration", path, e)
            }
        })?;

        serde_yaml::from_str(&content).map_err(|e| EmberError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Override the manifest path.
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Override the event log path.
    pub fn with_event_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_log_path = path.into();
        self
    }

    /// Override the generator program.
    pub fn with_generator_program(mut self, program: impl Into<String>) -> Self {
        self.generator.program = program.into();
        self
    }

    /// Override the generator working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.generator.working_dir = dir.into();
        self
    }

    /// Override the agent count the run prompt starts from.
    pub fn with_default_agent_count(mut self, count: u32) -> Self {
        self.default_agent_count = count;
        self
    }
}

/// Get the default configuration file path.
///
/// Returns `~/.ember/config.yaml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EmberError::internal("could not determine home directory"))?;

    Ok(home.join(".ember").join("config.yaml"))
}
