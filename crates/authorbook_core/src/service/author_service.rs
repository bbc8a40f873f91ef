//! Author use-case service.
//!
//! # Responsibility
//! - Provide stable CRUD entry points for UI and CLI callers.
//! - Offer the refetch step callers need after a stale-write conflict.
//!
//! # Invariants
//! - Service APIs never bypass store validation or the token check.
//! - Service layer remains storage-agnostic.

use crate::model::audit::AuditTrailEntry;
use crate::model::author::{Author, AuthorId};
use crate::repo::author_repo::{AuthorStore, StoreError, StoreResult};
use chrono::NaiveDate;
use std::rc::Rc;

/// Input for registering a new author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthorRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    /// `male|female|unknown`, any case.
    pub gender: String,
    pub website: Option<String>,
}

/// Use-case service wrapper for author operations.
pub struct AuthorService<S: AuthorStore + ?Sized> {
    store: Rc<S>,
}

impl<S: AuthorStore + ?Sized> AuthorService<S> {
    /// Creates a service over a shared store.
    pub fn new(store: Rc<S>) -> Self {
        Self { store }
    }

    /// Validates and inserts a new author, returning the persisted entity.
    pub fn register_author(&self, request: &NewAuthorRequest) -> StoreResult<Author> {
        let mut author = Author::with_website(
            request.first_name.as_str(),
            request.last_name.as_str(),
            request.date_of_birth,
            &request.gender,
            request.website.as_deref(),
        )?;
        self.store.add_author(&mut author)?;
        Ok(author)
    }

    pub fn add_author(&self, author: &mut Author) -> StoreResult<AuthorId> {
        self.store.add_author(author)
    }

    /// Persists in-memory changes. Conflicts are returned unchanged so the
    /// caller can `refresh` and retry.
    pub fn update_author(&self, author: &mut Author) -> StoreResult<()> {
        self.store.update_author(author)
    }

    pub fn delete_author(&self, author: &Author) -> StoreResult<()> {
        self.store.delete_author(author)
    }

    /// Deletes by id. Returns `false` when no such author exists.
    pub fn delete_author_by_id(&self, id: AuthorId) -> StoreResult<bool> {
        match self.store.get_author_by_id(id)? {
            Some(author) => {
                self.store.delete_author(&author)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn list_authors(&self) -> StoreResult<Vec<Author>> {
        self.store.get_authors()
    }

    pub fn get_author(&self, id: AuthorId) -> StoreResult<Option<Author>> {
        self.store.get_author_by_id(id)
    }

    pub fn audit_trail(&self, author: &Author) -> StoreResult<Vec<AuditTrailEntry>> {
        self.store.get_audit_trails(author)
    }

    /// Reloads persisted values and token into `author`, notifying its
    /// subscribers of every field the reload changes.
    ///
    /// # Errors
    /// - `StoreError::NotPersisted` for an author without id.
    /// - `StoreError::NotFound` when the row was deleted meanwhile.
    pub fn refresh(&self, author: &mut Author) -> StoreResult<()> {
        let id = author.id().ok_or(StoreError::NotPersisted)?;
        let fresh = self
            .store
            .get_author_by_id(id)?
            .ok_or(StoreError::NotFound(id))?;
        author.sync_from(&fresh);
        if author.gateway().is_none() {
            if let Some(gateway) = fresh.gateway() {
                author.set_gateway(Rc::downgrade(&gateway));
            }
        }
        Ok(())
    }
}
