//! Author store contract and SQLite gateway.
//!
//! # Responsibility
//! - Map `Author` values to the `author` table and back.
//! - Record one audit entry on insert and one per changed field on update.
//! - Enforce the last-modified token before applying an update.
//!
//! # Invariants
//! - Write paths call `Author::validate()` before SQL mutations.
//! - An update that fails the token check writes nothing, audit included.
//! - `last_modified` strictly increases on every applied update.
//! - Multi-statement writes run in one transaction; a failed rollback is
//!   logged and never replaces the original error.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::audit::{AuditTrailEntry, AUTHOR_ADDED_MESSAGE};
use crate::model::author::{Author, AuthorId, AuthorValidationError};
use chrono::{NaiveDate, Utc};
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};
use std::time::Instant;

const AUTHOR_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    dob,
    gender,
    web_site,
    last_modified
FROM author";

const DOB_FORMAT: &str = "%Y-%m-%d";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by author store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Field validation failed before any SQL ran.
    Validation(AuthorValidationError),
    /// Underlying SQLite/bootstrap failure.
    Db(DbError),
    /// The row changed since this copy was read; refetch and retry.
    Conflict {
        author_id: AuthorId,
        expected: Option<i64>,
        actual: i64,
    },
    /// Update target no longer exists.
    NotFound(AuthorId),
    /// Operation needs a store-assigned id.
    NotPersisted,
    /// Insert was called for an author that already has an id.
    AlreadyPersisted(AuthorId),
    /// `Author::save` was called without a live store attached.
    GatewayDetached,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid author.
    InvalidData(String),
}

impl StoreError {
    /// Whether the caller should refetch and retry rather than report a fault.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Db(_) => "db_error",
            Self::Conflict { .. } => "not_in_sync",
            Self::NotFound(_) => "author_not_found",
            Self::NotPersisted => "author_not_persisted",
            Self::AlreadyPersisted(_) => "author_already_persisted",
            Self::GatewayDetached => "gateway_detached",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict {
                author_id,
                expected,
                actual,
            } => match expected {
                Some(expected) => write!(
                    f,
                    "author {author_id} not in sync: read at {expected}, stored at {actual}"
                ),
                None => write!(
                    f,
                    "author {author_id} not in sync: never read, stored at {actual}"
                ),
            },
            Self::NotFound(id) => write!(f, "author not found: {id}"),
            Self::NotPersisted => write!(f, "author has not been added to the store"),
            Self::AlreadyPersisted(id) => write!(f, "author already stored with id {id}"),
            Self::GatewayDetached => write!(f, "author is not attached to a live store"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "author store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "author store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "author store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted author data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AuthorValidationError> for StoreError {
    fn from(value: AuthorValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence contract for authors and their audit trail.
pub trait AuthorStore {
    /// Inserts `author`, records `Author added`, and assigns id, token and
    /// store reference on success.
    fn add_author(&self, author: &mut Author) -> StoreResult<AuthorId>;
    /// Checks the token, audits changed fields, applies the update and
    /// refreshes the token on `author`.
    fn update_author(&self, author: &mut Author) -> StoreResult<()>;
    /// Deletes the row by id. Absent rows are not an error.
    fn delete_author(&self, author: &Author) -> StoreResult<()>;
    /// Lists all authors by first name ascending.
    fn get_authors(&self) -> StoreResult<Vec<Author>>;
    /// Loads one author; `None` when the id does not exist.
    fn get_author_by_id(&self, id: AuthorId) -> StoreResult<Option<Author>>;
    /// Lists audit entries for `author` by timestamp ascending.
    fn get_audit_trails(&self, author: &Author) -> StoreResult<Vec<AuditTrailEntry>>;
    /// Appends one free-text audit entry for a persisted author.
    fn add_audit_entry(&self, author: &Author, message: &str) -> StoreResult<AuditTrailEntry>;
    /// Reads the stored token for `id`; `None` when the row is absent.
    fn get_last_modified(&self, id: AuthorId) -> StoreResult<Option<i64>>;
}

/// SQLite-backed author gateway.
///
/// Owns its connection and is shared through `Rc`; authors it returns hold a
/// weak reference back to it.
pub struct SqliteAuthorGateway {
    conn: Connection,
    this: Weak<SqliteAuthorGateway>,
}

impl SqliteAuthorGateway {
    /// Constructs a gateway from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` is not current.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` on schema drift.
    pub fn try_new(conn: Connection) -> StoreResult<Rc<Self>> {
        ensure_author_connection_ready(&conn)?;
        Ok(Rc::new_cyclic(|this| Self {
            conn,
            this: this.clone(),
        }))
    }

    /// Underlying connection, for callers that need raw access.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn attach(&self, author: &mut Author) {
        let gateway: Weak<dyn AuthorStore> = self.this.clone();
        author.set_gateway(gateway);
    }

    fn in_transaction<T>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        match work(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=tx_rollback module=repo status=error op={operation} error_code=rollback_failed error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }

    fn insert_author(&self, author: &mut Author) -> StoreResult<AuthorId> {
        if let Some(id) = author.id() {
            return Err(StoreError::AlreadyPersisted(id));
        }
        author.validate()?;

        let now = now_epoch_ms();
        let id = self.in_transaction("add_author", |tx| {
            tx.execute(
                "INSERT INTO author (
                    first_name,
                    last_name,
                    dob,
                    gender,
                    web_site,
                    last_modified
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    author.first_name(),
                    author.last_name(),
                    date_to_db(author.date_of_birth()),
                    author.gender().as_str(),
                    author.website(),
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();
            insert_audit_entry(tx, id, AUTHOR_ADDED_MESSAGE, now)?;
            Ok(id)
        })?;

        author.assign_identity(id, now);
        self.attach(author);
        info!("event=author_added module=repo status=ok author_id={id}");
        Ok(id)
    }

    fn apply_update(&self, author: &mut Author) -> StoreResult<()> {
        let id = author.id().ok_or(StoreError::NotPersisted)?;
        author.validate()?;

        let now = now_epoch_ms();
        let (next_modified, audited) = self.in_transaction("update_author", |tx| {
            let actual = load_last_modified(tx, id)?.ok_or(StoreError::NotFound(id))?;
            if author.last_modified() != Some(actual) {
                return Err(StoreError::Conflict {
                    author_id: id,
                    expected: author.last_modified(),
                    actual,
                });
            }

            let persisted = load_author(tx, id)?.ok_or(StoreError::NotFound(id))?;
            let changes = author.diff_from(&persisted);
            for change in &changes {
                insert_audit_entry(tx, id, &change.audit_message(), now)?;
            }

            let next_modified = now.max(actual + 1);
            tx.execute(
                "UPDATE author
                 SET
                    first_name = ?1,
                    last_name = ?2,
                    dob = ?3,
                    gender = ?4,
                    web_site = ?5,
                    last_modified = ?6
                 WHERE id = ?7;",
                params![
                    author.first_name(),
                    author.last_name(),
                    date_to_db(author.date_of_birth()),
                    author.gender().as_str(),
                    author.website(),
                    next_modified,
                    id,
                ],
            )?;
            Ok((next_modified, changes.len()))
        })?;

        author.set_last_modified(next_modified);
        info!(
            "event=author_updated module=repo status=ok author_id={id} changed_fields={audited}"
        );
        Ok(())
    }

    fn remove_author(&self, author: &Author) -> StoreResult<()> {
        let id = author.id().ok_or(StoreError::NotPersisted)?;
        let changed = self
            .conn
            .execute("DELETE FROM author WHERE id = ?1;", [id])?;
        if changed == 0 {
            warn!("event=author_deleted module=repo status=noop author_id={id}");
        } else {
            info!("event=author_deleted module=repo status=ok author_id={id}");
        }
        Ok(())
    }

    fn list_authors(&self) -> StoreResult<Vec<Author>> {
        let mut stmt = self.conn.prepare(&format!(
            "{AUTHOR_SELECT_SQL} ORDER BY first_name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut authors = Vec::new();
        while let Some(row) = rows.next()? {
            let mut author = parse_author_row(row)?;
            self.attach(&mut author);
            authors.push(author);
        }
        Ok(authors)
    }

    fn find_author(&self, id: AuthorId) -> StoreResult<Option<Author>> {
        let mut author = load_author(&self.conn, id)?;
        if let Some(author) = author.as_mut() {
            self.attach(author);
        }
        Ok(author)
    }

    fn list_audit_trails(&self, author: &Author) -> StoreResult<Vec<AuditTrailEntry>> {
        let id = author.id().ok_or(StoreError::NotPersisted)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, author_id, entry_msg, date_added
             FROM author_audit_trail
             WHERE author_id = ?1
             ORDER BY date_added ASC, id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_audit_row(row)?);
        }
        Ok(entries)
    }

    fn append_audit_entry(&self, author: &Author, message: &str) -> StoreResult<AuditTrailEntry> {
        let id = author.id().ok_or(StoreError::NotPersisted)?;
        let now = now_epoch_ms();
        let entry_id = insert_audit_entry(&self.conn, id, message, now)?;
        Ok(AuditTrailEntry {
            id: entry_id,
            author_id: id,
            message: message.to_string(),
            date_added: now,
        })
    }
}

impl AuthorStore for SqliteAuthorGateway {
    fn add_author(&self, author: &mut Author) -> StoreResult<AuthorId> {
        let started_at = Instant::now();
        let result = self.insert_author(author);
        log_outcome("add_author", started_at, result)
    }

    fn update_author(&self, author: &mut Author) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.apply_update(author);
        log_outcome("update_author", started_at, result)
    }

    fn delete_author(&self, author: &Author) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.remove_author(author);
        log_outcome("delete_author", started_at, result)
    }

    fn get_authors(&self) -> StoreResult<Vec<Author>> {
        let started_at = Instant::now();
        let result = self.list_authors();
        log_outcome("get_authors", started_at, result)
    }

    fn get_author_by_id(&self, id: AuthorId) -> StoreResult<Option<Author>> {
        let started_at = Instant::now();
        let result = self.find_author(id);
        log_outcome("get_author_by_id", started_at, result)
    }

    fn get_audit_trails(&self, author: &Author) -> StoreResult<Vec<AuditTrailEntry>> {
        let started_at = Instant::now();
        let result = self.list_audit_trails(author);
        log_outcome("get_audit_trails", started_at, result)
    }

    fn add_audit_entry(&self, author: &Author, message: &str) -> StoreResult<AuditTrailEntry> {
        let started_at = Instant::now();
        let result = self.append_audit_entry(author, message);
        log_outcome("add_audit_entry", started_at, result)
    }

    fn get_last_modified(&self, id: AuthorId) -> StoreResult<Option<i64>> {
        let started_at = Instant::now();
        let result = load_last_modified(&self.conn, id);
        log_outcome("get_last_modified", started_at, result)
    }
}

fn log_outcome<T>(op: &'static str, started_at: Instant, result: StoreResult<T>) -> StoreResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!("event=author_store module=repo status=ok op={op} duration_ms={duration_ms}"),
        Err(err @ StoreError::Db(_)) => error!(
            "event=author_store module=repo status=error op={op} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
        Err(err) if err.is_conflict() => warn!(
            "event=author_store module=repo status=conflict op={op} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
        Err(err) => warn!(
            "event=author_store module=repo status=rejected op={op} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
    result
}

fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn load_author(conn: &Connection, id: AuthorId) -> StoreResult<Option<Author>> {
    let mut stmt = conn.prepare(&format!("{AUTHOR_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_author_row(row)?));
    }
    Ok(None)
}

fn load_last_modified(conn: &Connection, id: AuthorId) -> StoreResult<Option<i64>> {
    let value = conn
        .query_row(
            "SELECT last_modified FROM author WHERE id = ?1;",
            [id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(value)
}

fn insert_audit_entry(
    conn: &Connection,
    author_id: AuthorId,
    message: &str,
    date_added: i64,
) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO author_audit_trail (author_id, entry_msg, date_added)
         VALUES (?1, ?2, ?3);",
        params![author_id, message, date_added],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_author_row(row: &Row<'_>) -> StoreResult<Author> {
    let id: AuthorId = row.get("id")?;
    let dob_text: String = row.get("dob")?;
    let date_of_birth = parse_date(&dob_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid date `{dob_text}` in author.dob for id {id}"))
    })?;
    let gender: String = row.get("gender")?;
    let website: Option<String> = row.get("web_site")?;

    let mut author = Author::with_website(
        row.get::<_, String>("first_name")?,
        row.get::<_, String>("last_name")?,
        date_of_birth,
        &gender,
        website.as_deref(),
    )
    .map_err(|err| StoreError::InvalidData(format!("author {id} fails validation: {err}")))?;
    author.assign_identity(id, row.get("last_modified")?);
    Ok(author)
}

fn parse_audit_row(row: &Row<'_>) -> StoreResult<AuditTrailEntry> {
    Ok(AuditTrailEntry {
        id: row.get("id")?,
        author_id: row.get("author_id")?,
        message: row.get("entry_msg")?,
        date_added: row.get("date_added")?,
    })
}

fn date_to_db(value: NaiveDate) -> String {
    value.format(DOB_FORMAT).to_string()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DOB_FORMAT).ok()
}

fn ensure_author_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        (
            "author",
            &[
                "id",
                "first_name",
                "last_name",
                "dob",
                "gender",
                "web_site",
                "last_modified",
            ],
        ),
        (
            "author_audit_trail",
            &["id", "author_id", "entry_msg", "date_added"],
        ),
    ];

    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{date_to_db, parse_date, StoreError};
    use chrono::NaiveDate;

    #[test]
    fn dob_text_round_trips_through_storage_format() {
        let date = NaiveDate::from_ymd_opt(1907, 3, 9).unwrap();
        assert_eq!(date_to_db(date), "1907-03-09");
        assert_eq!(parse_date("1907-03-09"), Some(date));
        assert_eq!(parse_date("09/03/1907"), None);
    }

    #[test]
    fn conflict_is_distinct_from_data_access_failure() {
        let conflict = StoreError::Conflict {
            author_id: 7,
            expected: Some(10),
            actual: 11,
        };
        assert!(conflict.is_conflict());
        assert_eq!(conflict.code(), "not_in_sync");
        assert!(conflict.to_string().contains("not in sync"));

        let db = StoreError::from(rusqlite::Error::InvalidQuery);
        assert!(!db.is_conflict());
        assert_eq!(db.code(), "db_error");
    }
}
