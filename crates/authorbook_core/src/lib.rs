//! Core data layer for Authorbook.
//! This crate owns the author validation rules, the audit trail, and the
//! optimistic-concurrency update path.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::audit::{AuditTrailEntry, AUTHOR_ADDED_MESSAGE};
pub use model::author::{
    is_valid_date_of_birth, is_valid_gender, is_valid_name, is_valid_website, Author, AuthorId,
    AuthorValidationError, Gender,
};
pub use model::observe::{AuthorField, FieldChange, SubscriptionId};
pub use repo::author_repo::{AuthorStore, SqliteAuthorGateway, StoreError, StoreResult};
pub use service::author_service::{AuthorService, NewAuthorRequest};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
