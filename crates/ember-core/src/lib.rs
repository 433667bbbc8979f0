//! # ember-core
//!
//! Core types, errors, and pipeline building blocks for the Ember dashboard.
//!
//! This crate provides:
//! - [`EmberError`] - Comprehensive error types for all Ember operations
//! - [`logging`] - Tracing setup and log management utilities
//! - [`config`] - Application configuration and defaults
//! - [`types`] - Event records, manifests, and shared definitions
//! - [`manifest`] - Run manifest loading and validation
//! - [`tail`] - Incremental tailing of the Firestorm event log
//! - [`topology`] - Ring layout and the agent-to-actor registry
//!
//! ## Example
//!
//! ```no_run
//! use ember_core::{Result, logging, manifest};
//!
//! fn main() -> Result<()> {
//!     // Initialize logging
//!     let _guard = logging::init_logging(None, false)?;
//!
//!     // Load a run manifest
//!     let path = std::path::Path::new("results/firestorm_manifest.json");
//!     let run = manifest::load_manifest(path)?;
//!     println!("{} agents", run.agents.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod tail;
pub mod topology;
pub mod types;

// Re-export main types for convenience
pub use config::{AppConfig, EmitOverlap, GeneratorConfig, TopologyConfig};
pub use error::{EmberError, Result};
pub use logging::{LogGuard, init_logging};
pub use manifest::load_manifest;
pub use tail::{LogTailer, TailBatch, TailCursor, TailerConfig};
pub use topology::{ActorId, Point, Topology};
pub use types::{AgentDescriptor, EventKind, EventRecord, LogRecord, RunManifest};
