//! Audit trail read model.
//!
//! # Invariants
//! - Entries are append-only; nothing in core updates or deletes them.
//! - `date_added` is epoch milliseconds assigned by the store.

use crate::model::author::AuthorId;
use serde::{Deserialize, Serialize};

/// Message recorded when an author is first inserted.
pub const AUTHOR_ADDED_MESSAGE: &str = "Author added";

/// One recorded change or lifecycle event for an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrailEntry {
    pub id: i64,
    pub author_id: AuthorId,
    /// Free-text message, e.g. `Gender changed from male to unknown`.
    pub message: String,
    pub date_added: i64,
}
