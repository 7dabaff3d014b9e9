//! Bounded, persisted log of successful optimizations.

use refine_types::{HISTORY_CAPACITY, HistoryEntry};

use crate::store::Store;

const TIMESTAMP_FORMAT: &str = "%H:%M";

/// Newest-first history mirrored to disk after every append.
///
/// A failed write leaves the in-memory log intact and marks it dirty; the next
/// append or [`HistoryLog::flush`] rewrites the whole sequence.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    dirty: bool,
}

impl HistoryLog {
    #[must_use]
    pub fn load(store: &Store) -> Self {
        let entries = store.load_history();
        tracing::debug!(count = entries.len(), "Loaded history");
        Self {
            entries,
            dirty: false,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stamp with the local `HH:MM` time and append.
    pub fn record(
        &mut self,
        store: &Store,
        prompt: String,
        result: String,
        model: String,
        tokens: Option<u64>,
    ) -> bool {
        let entry = HistoryEntry {
            ts: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            model,
            prompt,
            result,
            tokens,
        };
        self.push(store, entry)
    }

    /// Insert at the front, evict past capacity, persist. Returns whether the write succeeded.
    pub fn push(&mut self, store: &Store, entry: HistoryEntry) -> bool {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_CAPACITY);
        self.persist(store)
    }

    /// Rewrite the file if an earlier write failed.
    pub fn flush(&mut self, store: &Store) -> bool {
        if !self.dirty {
            return true;
        }
        self.persist(store)
    }

    fn persist(&mut self, store: &Store) -> bool {
        match store.save_history(&self.entries) {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(e) => {
                tracing::warn!(
                    path = %store.history_path().display(),
                    "Failed to save history: {e}"
                );
                self.dirty = true;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            ts: "08:30".to_string(),
            model: "models/gemini-2.0-flash".to_string(),
            prompt: format!("p{n}"),
            result: format!("r{n}"),
            tokens: Some(7),
        }
    }

    #[test]
    fn keeps_fifty_newest_in_memory_and_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::in_dir(dir.path());
        let mut log = HistoryLog::load(&store);

        for n in 0..HISTORY_CAPACITY + 5 {
            assert!(log.push(&store, entry(n)));
        }

        assert_eq!(log.len(), HISTORY_CAPACITY);
        assert_eq!(log.entries()[0].prompt, "p54");
        assert_eq!(log.entries()[HISTORY_CAPACITY - 1].prompt, "p5");
        assert_eq!(store.load_history(), log.entries());
    }

    #[test]
    fn record_stamps_local_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::in_dir(dir.path());
        let mut log = HistoryLog::default();

        log.record(
            &store,
            "P".to_string(),
            "R".to_string(),
            "models/m".to_string(),
            None,
        );

        let ts = &log.entries()[0].ts;
        assert_eq!(ts.len(), 5);
        assert_eq!(&ts[2..3], ":");
        assert_eq!(log.entries()[0].tokens, None);
    }

    #[test]
    fn failed_write_marks_dirty_and_next_write_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let broken = Store::in_dir(&blocker);

        let mut log = HistoryLog::default();
        assert!(!log.push(&broken, entry(1)));
        assert!(log.is_dirty());
        assert_eq!(log.len(), 1);

        let store = Store::in_dir(dir.path());
        assert!(log.flush(&store));
        assert!(!log.is_dirty());
        assert_eq!(store.load_history(), log.entries());
    }
}
