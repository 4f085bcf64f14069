//! State export and import as JSON documents.
//!
//! An export is the whole [`SegState`] pretty-printed. Import replaces the
//! state wholesale; ids and timestamps are kept exactly as written. The
//! `version` field is compared for information only.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::error::{Result, SegError};
use crate::state::{STATE_VERSION, SegState};

/// Serialize `state` as pretty JSON.
///
/// # Errors
///
/// [`SegError::Serialization`] if serialization fails.
pub fn export_state(state: &SegState) -> Result<String> {
    serde_json::to_string_pretty(state).map_err(|e| SegError::Serialization(e.to_string()))
}

/// Parse a state document.
///
/// # Errors
///
/// [`SegError::InvalidState`] if the JSON is malformed or has the wrong
/// shape. Callers keep their current state in that case.
pub fn import_state(json: &str) -> Result<SegState> {
    let state: SegState =
        serde_json::from_str(json).map_err(|e| SegError::InvalidState(e.to_string()))?;
    if state.version != STATE_VERSION {
        warn!(found = %state.version, expected = STATE_VERSION, "Importing state from a different version");
    }
    info!(
        persona = %state.persona.name,
        memories = state.memories.len(),
        "Imported state"
    );
    Ok(state)
}

/// File name for an export: `seg-state-{persona}-{timestamp}.json`.
#[must_use]
pub fn export_file_name(state: &SegState, at: DateTime<Utc>) -> String {
    let stamp = at.to_rfc3339_opts(SecondsFormat::Secs, true).replace(':', "-");
    format!("seg-state-{}-{stamp}.json", slug(&state.persona.name))
}

/// Write an export to `path`.
///
/// # Errors
///
/// Serialization or I/O failures.
pub fn save_state(state: &SegState, path: &Path) -> Result<()> {
    let json = export_state(state)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;
    info!(path = %path.display(), "Exported state");
    Ok(())
}

/// Read an export from `path`.
///
/// # Errors
///
/// I/O failures or [`SegError::InvalidState`].
pub fn load_state(path: &Path) -> Result<SegState> {
    let json = std::fs::read_to_string(path)?;
    import_state(&json)
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "persona".to_string()
    } else {
        trimmed.to_string()
    }
}
