//! Author domain model.
//!
//! # Responsibility
//! - Define the validated `Author` entity and its observable fields.
//! - Define the append-only audit trail read model.
//!
//! # Invariants
//! - Invalid field values are rejected at the point of mutation.
//! - Entities reference their store weakly; the store owns no entities.

pub mod audit;
pub mod author;
pub mod observe;
