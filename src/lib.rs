//! Banking simulator core.
//!
//! - [`domain`]: accounts, users, ledger entries, the error type and the
//!   store traits the engine is written against.
//! - [`memory_store`]: in-process store with per-account locks and a unit of
//!   work that commits balance changes and ledger entries together.
//! - [`engine`]: [`engine::Bank`], the deposit / withdrawal / transfer
//!   protocol, statements and administrative operations.
//! - [`ingestion`], [`simulator`], [`dlq`], [`output`]: replaying a CSV
//!   operation script and reporting the resulting accounts.

pub mod config;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod memory_store;
pub mod output;
pub mod simulator;

pub use domain::Error;
pub use engine::{Bank, Receipt};
pub use memory_store::MemoryStore;
