//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the author persistence contract (`AuthorStore`).
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths enforce `Author::validate()` before persistence.
//! - Stale writes surface as `StoreError::Conflict`, separate from
//!   data-access failures.

pub mod author_repo;
