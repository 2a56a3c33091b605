//! JSON snapshot file backing the CLI store

use anyhow::{Context, Result};
use reqtrace_store::MemoryStore;
use std::fs;
use std::path::Path;

/// Load the store at `path`, or start empty when the file does not exist
pub(crate) fn open(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        tracing::debug!("No store at {}, starting empty", path.display());
        return Ok(MemoryStore::new());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("reading store {}", path.display()))?;
    MemoryStore::from_json(&text).with_context(|| format!("decoding store {}", path.display()))
}

/// Write the store through a sibling temp file so a failed write keeps the old one
pub(crate) fn save(store: &MemoryStore, path: &Path) -> Result<()> {
    let json = store.to_json().context("encoding store")?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json).with_context(|| format!("writing {}", staging.display()))?;
    fs::rename(&staging, path).with_context(|| format!("replacing {}", path.display()))?;
    tracing::debug!("Saved store to {}", path.display());
    Ok(())
}
