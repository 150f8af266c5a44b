//! Ledger snapshots and ancestry comparison for the Quorum Validation Layer.
//!
//! This crate provides:
//! - [`Ledger`] snapshots carrying a trailing window of ancestor hashes
//! - [`LedgerAncestryView`], a bounded, immutable view used for fork analysis
//! - [`mismatch`], which finds the earliest sequence two views may disagree at
//! - The [`LedgerStore`] read boundary and an [`InMemoryLedgerStore`]

pub mod ancestry;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod traits;

pub use ancestry::{mismatch, LedgerAncestryView};
pub use error::LedgerError;
pub use ledger::{AncestorHashes, Ledger, LedgerHeader, ANCESTOR_WINDOW};
pub use memory::InMemoryLedgerStore;
pub use traits::LedgerStore;
