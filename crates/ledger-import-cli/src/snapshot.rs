//! JSON files on either side of an import: the upstream export and the ledger.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use ledger_engine::{Entry, MemoryStore, RawEntry};
use tracing::{debug, info};

/// Read an export: a JSON array of raw records.
pub fn load_export(path: &Path) -> Result<Vec<RawEntry>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading export {}", path.display()))?;
    let raws: Vec<RawEntry> = serde_json::from_str(&text)
        .with_context(|| format!("parsing export {}", path.display()))?;
    debug!(records = raws.len(), path = %path.display(), "export loaded");
    Ok(raws)
}

/// Load the ledger. A missing file is an empty ledger.
pub fn load_store(path: &Path) -> Result<MemoryStore> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "no ledger yet, starting empty");
            return Ok(MemoryStore::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading ledger {}", path.display()));
        }
    };
    let entries: Vec<Entry> = serde_json::from_str(&text)
        .with_context(|| format!("parsing ledger {}", path.display()))?;
    Ok(MemoryStore::from_entries(entries))
}

/// Write the ledger back, replacing the file only once the new content is on disk.
pub fn save_store(path: &Path, store: &MemoryStore) -> Result<()> {
    let json = serde_json::to_string_pretty(store.entries())?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing ledger {}", path.display()))?;
    info!(entries = store.len(), path = %path.display(), "ledger saved");
    Ok(())
}
