//! Referral Network Storage
//!
//! Async key-value storage used by the referral engine. The engine never
//! depends on a concrete database: it speaks to [`StorageBackend`], which
//! offers the consistency primitives the ledger needs:
//!
//! - **Atomic batches**: several writes land together or not at all
//! - **Compare-and-swap**: single-key optimistic updates
//! - **Guarded batches**: multi-key optimistic transactions; every guard is
//!   re-checked at commit time and a stale read fails with
//!   [`StorageError::CasConflict`] without writing anything

pub mod backend;

pub use backend::{
    BatchOp, Guard, MemoryBackend, Result, SledBackend, SledTree, StorageBackend, StorageError,
};
