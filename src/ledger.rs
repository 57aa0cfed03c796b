//! sled-backed world state with optimistic concurrency and a witness chain per key
use super::error::LendingError;
use super::identity::CallerIdentity;
use super::state::{StateError, WorldState};
use super::utils;
use super::witness::{self, TimeStamp, Witness, WitnessHead};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Transactional, Tree};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const STATE_TREE: &str = "world_state";
const HISTORY_TREE: &str = "history";
const HEADS_TREE: &str = "history_heads";

impl From<sled::Error> for StateError {
    fn from(err: sled::Error) -> Self {
        StateError::Backend(err.to_string())
    }
}

pub struct SledLedger {
    instance: Arc<sled::Db>,
    state: Tree,
    history: Tree,
    heads: Tree,
}

impl SledLedger {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, StateError> {
        let state = instance.open_tree(STATE_TREE)?;
        let history = instance.open_tree(HISTORY_TREE)?;
        let heads = instance.open_tree(HEADS_TREE)?;

        Ok(Self {
            instance,
            state,
            history,
            heads,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let db = sled::open(path)?;
        Self::new(Arc::new(db))
    }

    /// Start a transaction on behalf of `caller`. Nothing is written until `commit`.
    pub fn begin(&self, caller: &CallerIdentity) -> Result<Transaction<'_>, StateError> {
        let tx_id =
            utils::new_tx_id().map_err(|e| StateError::Backend(e.to_string()))?;

        Ok(Transaction {
            ledger: self,
            tx_id,
            submitter: caller.org_id().to_string(),
            reads: RefCell::new(BTreeMap::new()),
            writes: RefCell::new(BTreeMap::new()),
        })
    }

    /// Run `f` in a fresh transaction and commit it if `f` succeeds.
    pub fn submit<T>(
        &self,
        caller: &CallerIdentity,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, LendingError>,
    ) -> Result<T, LendingError> {
        let tx = self.begin(caller)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` against the current state without committing anything it writes.
    pub fn evaluate<T>(
        &self,
        caller: &CallerIdentity,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, LendingError>,
    ) -> Result<T, LendingError> {
        let tx = self.begin(caller)?;
        f(&tx)
    }

    /// Witnesses recorded for `key`, oldest first
    pub fn history(&self, key: &str) -> Result<Vec<Witness>, StateError> {
        self.history
            .scan_prefix(history_prefix(key))
            .values()
            .map(|value| Witness::decode(&value?))
            .collect()
    }

    /// Check the witness chain of `key` and that its last witness matches the stored value.
    /// Returns the number of writes the chain accounts for.
    pub fn verify_history(&self, key: &str) -> Result<u64, StateError> {
        let witnesses = self.history(key)?;
        let head = witness::verify_chain(key, &witnesses)?;
        let current = self.state.get(key)?;

        match (witnesses.last(), current) {
            (None, None) => Ok(0),
            (Some(last), Some(value)) if last.witnesses(&value) => {
                let stored = self.heads.get(key)?.map(|h| WitnessHead::decode(&h)).transpose()?;
                if stored != head {
                    return Err(StateError::Tampered {
                        key: key.to_string(),
                        sequence: last.sequence,
                    });
                }
                Ok(last.sequence + 1)
            }
            (last, _) => Err(StateError::Tampered {
                key: key.to_string(),
                sequence: last.map_or(0, |w| w.sequence),
            }),
        }
    }

    pub fn flush(&self) -> Result<(), StateError> {
        self.instance.flush()?;
        Ok(())
    }
}

/// Transaction stub handed to the lifecycle. Reads see this transaction's own writes.
pub struct Transaction<'a> {
    ledger: &'a SledLedger,
    tx_id: String,
    submitter: String,
    // value of each key as first read, checked again at commit
    reads: RefCell<BTreeMap<String, Option<Vec<u8>>>>,
    writes: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl Transaction<'_> {
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Apply buffered writes atomically, rejecting the transaction if any key
    /// it read has changed since.
    pub fn commit(self) -> Result<Vec<Witness>, StateError> {
        let reads = self.reads.into_inner();
        let writes = self.writes.into_inner();
        if writes.is_empty() {
            return Ok(Vec::new());
        }
        let timestamp = TimeStamp::new();
        let ledger = self.ledger;

        let result = (&ledger.state, &ledger.history, &ledger.heads).transaction(
            |(state, history, heads)| {
                for (key, seen) in &reads {
                    if state.get(key.as_bytes())?.as_deref() != seen.as_deref() {
                        return Err(ConflictableTransactionError::Abort(StateError::Conflict {
                            key: key.clone(),
                        }));
                    }
                }

                let mut witnesses = Vec::with_capacity(writes.len());
                for (key, value) in &writes {
                    let head = match heads.get(key.as_bytes())? {
                        Some(bytes) => Some(
                            WitnessHead::decode(&bytes).map_err(ConflictableTransactionError::Abort)?,
                        ),
                        None => None,
                    };
                    let witness = Witness::next(
                        head.as_ref(),
                        key,
                        &self.tx_id,
                        &self.submitter,
                        timestamp.clone(),
                        value,
                    );
                    let (hash, cbor) = witness.build().map_err(ConflictableTransactionError::Abort)?;
                    let next_head = WitnessHead {
                        sequence: witness.sequence,
                        hash,
                    }
                    .encode()
                    .map_err(ConflictableTransactionError::Abort)?;

                    state.insert(key.as_bytes(), value.as_slice())?;
                    history.insert(history_key(key, witness.sequence), cbor)?;
                    heads.insert(key.as_bytes(), next_head)?;
                    witnesses.push(witness);
                }
                Ok(witnesses)
            },
        );

        match result {
            Ok(witnesses) => {
                debug!(tx_id = %self.tx_id, writes = witnesses.len(), "transaction committed");
                Ok(witnesses)
            }
            Err(TransactionError::Abort(err)) => {
                if let StateError::Conflict { key } = &err {
                    warn!(tx_id = %self.tx_id, key = %key, "stale read, transaction rejected");
                }
                Err(err)
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }
}

impl WorldState for Transaction<'_> {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        if let Some(value) = self.writes.borrow().get(key) {
            return Ok(Some(value.clone()));
        }

        let value = self.ledger.state.get(key)?.map(|v| v.to_vec());
        self.reads
            .borrow_mut()
            .entry(key.to_string())
            .or_insert_with(|| value.clone());

        Ok(value)
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        self.writes
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// length-prefixed so no key's prefix can cover another key's entries
fn history_prefix(key: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(8 + key.len());
    prefix.extend_from_slice(&(key.len() as u64).to_be_bytes());
    prefix.extend_from_slice(key.as_bytes());
    prefix
}

// big-endian sequence keeps a key's witnesses in commit order
fn history_key(key: &str, sequence: u64) -> Vec<u8> {
    let mut out = history_prefix(key);
    out.extend_from_slice(&sequence.to_be_bytes());
    out
}
