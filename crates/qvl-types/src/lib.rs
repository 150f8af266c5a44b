//! Foundation types for the Quorum Validation Layer (QVL).
//!
//! This crate provides the identifier, key, and time types shared by every
//! other QVL crate.
//!
//! # Key Types
//!
//! - [`LedgerId`]: 32-byte ledger hash with an all-zero sentinel that sorts first
//! - [`Seq`]: ledger sequence number (0 = no ledger, 1 = first real ledger)
//! - [`PublicKey`]: node public key, either a master key or an ephemeral signing key
//! - [`NodeId`]: stable validator identity derived from a master key
//! - [`NetTime`]: network clock time in seconds since the network epoch

pub mod error;
pub mod key;
pub mod ledger_id;
pub mod time;

pub use error::TypeError;
pub use key::{NodeId, PublicKey};
pub use ledger_id::{LedgerId, Seq};
pub use time::NetTime;
