//! Key-value world state the lifecycle reads and writes through
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

#[derive(thiserror::Error, Debug)]
pub enum StateError {
    #[error("world state backend failed: {0}")]
    Backend(String),
    #[error("key {key} changed since it was read, transaction rejected")]
    Conflict { key: String },
    #[error("write history for {key} was tampered with at sequence {sequence}")]
    Tampered { key: String, sequence: u64 },
    #[error("failed to encode or decode ledger metadata: {0}")]
    Codec(String),
}

/// Get/put contract of the ledger's world state. Both calls are synchronous and key-scoped.
pub trait WorldState {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError>;
    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), StateError>;
}

/// Unversioned in-process world state.
#[derive(Debug, Default)]
pub struct MemoryWorldState {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryWorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        // a poisoned map still holds every completed write
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorldState for MemoryWorldState {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StateError::Backend("world state lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StateError::Backend("world state lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_last_write() {
        let state = MemoryWorldState::new();

        assert_eq!(state.get_state("loan0001").unwrap(), None);
        state.put_state("loan0001", b"first").unwrap();
        state.put_state("loan0001", b"second").unwrap();

        assert_eq!(state.get_state("loan0001").unwrap(), Some(b"second".to_vec()));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn poisoned_lock_still_counts_entries() {
        let state = MemoryWorldState::new();
        state.put_state("loan0001", b"first").unwrap();

        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = state.entries.lock().unwrap();
                panic!("writer died holding the lock");
            })
            .join()
        });

        assert_eq!(state.len(), 1);
        assert!(!state.is_empty());
        assert!(matches!(
            state.get_state("loan0001"),
            Err(StateError::Backend(_))
        ));
    }
}
