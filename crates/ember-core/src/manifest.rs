//! Run manifest loading.
//!
//! The generator writes one manifest per run. Loading it is the last
//! failable step before a run is declared successful, so the errors here are
//! precise: missing file, unparseable file, and parseable-but-empty are
//! distinct failures with their own guidance.

use std::path::Path;

use tracing::debug;

use crate::error::{EmberError, Result};
use crate::types::RunManifest;

/// Load and validate the run manifest.
///
/// Requires the file to exist, parse as JSON, and list at least one agent.
pub fn load_manifest(path: &Path) -> Result<RunManifest> {
    if !path.exists() {
        return Err(EmberError::ManifestNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| EmberError::io("reading manifest", path, e))?;

    let manifest: RunManifest = serde_json::from_str(&content)
        .map_err(|e| EmberError::manifest_invalid(path, e.to_string()))?;

    if manifest.agents.is_empty() {
        return Err(EmberError::ManifestEmpty {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), agents = manifest.agents.len(), "manifest loaded");

    Ok(manifest)
}
