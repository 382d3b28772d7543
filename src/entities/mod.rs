//! Entity storage.
//!
//! The store holds lots and spots and keeps each lot's available count
//! derived from its spots after every write.

mod store;
pub mod seed;

pub use store::{CountMismatch, EntityStore, ReconcilePolicy, ReconcileReport, StoreConfig};
