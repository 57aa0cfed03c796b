//! Peer-to-peer loan lifecycle executed as transactional logic over a key-value world state.

pub mod config;
pub mod contract;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod loan;
pub mod service;
pub mod state;
pub mod utils;
pub mod witness;

pub use config::LendingConfig;
pub use contract::{LendingContract, Operation};
pub use error::{ErrorKind, LendingError};
pub use identity::{CallerIdentity, IdentityResolver};
pub use ledger::SledLedger;
pub use loan::{AuditHistory, LoanRecord, LoanStatus, RepaymentAccounting};
pub use service::LoanService;
pub use state::{MemoryWorldState, StateError, WorldState};
