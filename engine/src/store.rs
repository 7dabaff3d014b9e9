//! On-disk credential and history stores.
//!
//! Both files are small JSON documents rewritten whole on every save through
//! [`refine_utils::atomic_write_with_options`]. Loads never fail: a missing,
//! unreadable or malformed file reads as "no prior data".

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use refine_types::{ApiKey, HISTORY_CAPACITY, HistoryEntry};
use refine_utils::{AtomicWriteOptions, PersistMode, atomic_write, atomic_write_with_options};

use crate::config::DataDir;

pub const CREDENTIAL_FILE_NAME: &str = "user_config.json";
pub const HISTORY_FILE_NAME: &str = "history.json";

const CREDENTIAL_KEY: &str = "google_key";
const LEGACY_CREDENTIAL_KEY: &str = "google";

#[derive(Serialize)]
struct CredentialFile<'a> {
    google_key: &'a str,
}

#[derive(Debug, Clone)]
pub struct Store {
    credential_path: PathBuf,
    history_path: PathBuf,
}

impl Store {
    #[must_use]
    pub fn new(data_dir: &DataDir) -> Self {
        Self::in_dir(&data_dir.path)
    }

    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            credential_path: dir.join(CREDENTIAL_FILE_NAME),
            history_path: dir.join(HISTORY_FILE_NAME),
        }
    }

    #[must_use]
    pub fn credential_path(&self) -> &Path {
        &self.credential_path
    }

    #[must_use]
    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn load_credential(&self) -> Option<ApiKey> {
        let value = read_json(&self.credential_path)?;
        [CREDENTIAL_KEY, LEGACY_CREDENTIAL_KEY]
            .into_iter()
            .filter_map(|field| value.get(field).and_then(Value::as_str))
            .find_map(|raw| ApiKey::new(raw).ok())
    }

    pub fn save_credential(&self, key: &ApiKey) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(&CredentialFile {
            google_key: key.as_str(),
        })
        .map_err(io::Error::other)?;
        ensure_parent(&self.credential_path)?;
        atomic_write_with_options(
            &self.credential_path,
            &json,
            AtomicWriteOptions {
                mode: PersistMode::SensitiveOwnerOnly,
                ..AtomicWriteOptions::default()
            },
        )?;
        tracing::info!(path = %self.credential_path.display(), "Saved API key");
        Ok(())
    }

    /// Newest-first history, at most [`HISTORY_CAPACITY`] entries.
    ///
    /// Malformed records are skipped individually; a non-array document reads as empty.
    pub fn load_history(&self) -> Vec<HistoryEntry> {
        let Some(value) = read_json(&self.history_path) else {
            return Vec::new();
        };
        let Value::Array(records) = value else {
            tracing::warn!(
                path = %self.history_path.display(),
                "History file is not a JSON array; ignoring"
            );
            return Vec::new();
        };

        let total = records.len();
        let mut entries: Vec<HistoryEntry> = records
            .into_iter()
            .filter_map(|record| serde_json::from_value(prefer_current_timestamp(record)).ok())
            .collect();
        if entries.len() < total {
            tracing::warn!(
                skipped = total - entries.len(),
                "Skipped malformed history records"
            );
        }
        entries.truncate(HISTORY_CAPACITY);
        entries
    }

    pub fn save_history(&self, entries: &[HistoryEntry]) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(entries).map_err(io::Error::other)?;
        ensure_parent(&self.history_path)?;
        atomic_write(&self.history_path, &json)
    }
}

/// A record carrying both `ts` and the legacy `timestamp` keeps `ts`.
fn prefer_current_timestamp(mut record: Value) -> Value {
    if let Value::Object(fields) = &mut record
        && fields.contains_key("ts")
    {
        fields.remove("timestamp");
    }
    record
}

fn read_json(path: &Path) -> Option<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}", path.display());
            return None;
        }
    };
    if content.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}", path.display());
            None
        }
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
