//! Command handlers.
//!
//! # Responsibility
//! - Translate parsed arguments into `AuthorService` calls.
//! - Render results as text or JSON on stdout.

use crate::cli::{AddArgs, Command, UpdateArgs};
use authorbook_core::{
    AuditTrailEntry, Author, AuthorService, AuthorValidationError, NewAuthorRequest,
    SqliteAuthorGateway, StoreError,
};
use chrono::{DateTime, Utc};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CommandResult = Result<(), CommandError>;

/// Failure of one CLI command.
#[derive(Debug)]
pub enum CommandError {
    Store(StoreError),
    NotFound(i64),
    Json(serde_json::Error),
}

impl CommandError {
    /// Process exit code; conflicts are distinguishable from faults.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Store(err) if err.is_conflict() => 3,
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_)) => 4,
            Self::Store(StoreError::Validation(_)) => 2,
            _ => 1,
        }
    }
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) if err.is_conflict() => {
                write!(f, "{err}; fetch the author again and retry")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "no author with id {id}"),
            Self::Json(err) => write!(f, "failed to render JSON: {err}"),
        }
    }
}

impl Error for CommandError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Json(err) => Some(err),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<AuthorValidationError> for CommandError {
    fn from(value: AuthorValidationError) -> Self {
        Self::Store(StoreError::Validation(value))
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

type Service = AuthorService<SqliteAuthorGateway>;

pub fn execute(service: &Service, command: &Command, json: bool) -> CommandResult {
    match command {
        Command::List => list(service, json),
        Command::Show { id } => show(service, *id, json),
        Command::Add(args) => add(service, args, json),
        Command::Update(args) => update(service, args, json),
        Command::Delete { id } => delete(service, *id),
        Command::Audit { id } => audit(service, *id, json),
    }
}

fn list(service: &Service, json: bool) -> CommandResult {
    let authors = service.list_authors()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&authors)?);
        return Ok(());
    }
    for author in &authors {
        println!("{}", author_line(author));
    }
    Ok(())
}

fn show(service: &Service, id: i64, json: bool) -> CommandResult {
    let author = load(service, id)?;
    print_author(&author, json)
}

fn add(service: &Service, args: &AddArgs, json: bool) -> CommandResult {
    let author = service.register_author(&NewAuthorRequest {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        date_of_birth: args.dob,
        gender: args.gender.clone(),
        website: args.website.clone(),
    })?;
    info!(
        "event=cli_add module=cli status=ok author_id={}",
        author.id().unwrap_or_default()
    );
    print_author(&author, json)
}

fn update(service: &Service, args: &UpdateArgs, json: bool) -> CommandResult {
    let mut author = load(service, args.id)?;
    if let Some(first_name) = &args.first_name {
        author.set_first_name(first_name.as_str())?;
    }
    if let Some(last_name) = &args.last_name {
        author.set_last_name(last_name.as_str())?;
    }
    if let Some(dob) = args.dob {
        author.set_date_of_birth(dob)?;
    }
    if let Some(gender) = &args.gender {
        author.set_gender(gender)?;
    }
    if args.clear_website {
        author.set_website(None)?;
    } else if let Some(website) = &args.website {
        author.set_website(Some(website.as_str()))?;
    }
    author.save()?;
    print_author(&author, json)
}

fn delete(service: &Service, id: i64) -> CommandResult {
    if !service.delete_author_by_id(id)? {
        return Err(CommandError::NotFound(id));
    }
    println!("deleted author {id}");
    Ok(())
}

fn audit(service: &Service, id: i64, json: bool) -> CommandResult {
    let author = load(service, id)?;
    let entries = service.audit_trail(&author)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &entries {
        println!("{}", audit_line(entry));
    }
    Ok(())
}

fn load(service: &Service, id: i64) -> Result<Author, CommandError> {
    service.get_author(id)?.ok_or(CommandError::NotFound(id))
}

fn print_author(author: &Author, json: bool) -> CommandResult {
    if json {
        println!("{}", serde_json::to_string_pretty(author)?);
    } else {
        println!("{}", author_line(author));
    }
    Ok(())
}

fn author_line(author: &Author) -> String {
    format!(
        "{:>5}  {:<40} {}  {:<7} {}",
        author.id().unwrap_or_default(),
        author.to_string(),
        author.date_of_birth(),
        author.gender().as_str(),
        author.website().unwrap_or("-")
    )
}

fn audit_line(entry: &AuditTrailEntry) -> String {
    let recorded = DateTime::<Utc>::from_timestamp_millis(entry.date_added)
        .map(|at| at.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| entry.date_added.to_string());
    format!("{recorded}  {}", entry.message)
}

#[cfg(test)]
mod tests {
    use super::{audit_line, CommandError};
    use authorbook_core::{AuditTrailEntry, StoreError};

    #[test]
    fn audit_line_formats_epoch_millis_as_utc() {
        let entry = AuditTrailEntry {
            id: 1,
            author_id: 1,
            message: "Author added".to_string(),
            date_added: 0,
        };
        assert_eq!(audit_line(&entry), "1970-01-01 00:00:00.000  Author added");
    }

    #[test]
    fn conflict_maps_to_retry_exit_code() {
        let conflict = CommandError::from(StoreError::Conflict {
            author_id: 1,
            expected: Some(1),
            actual: 2,
        });
        assert_eq!(conflict.exit_code(), 3);
        assert!(conflict.to_string().contains("retry"));
        assert_eq!(CommandError::NotFound(9).exit_code(), 4);
    }

    #[test]
    fn row_deleted_before_save_maps_to_unknown_id_exit_code() {
        let vanished = CommandError::from(StoreError::NotFound(9));
        assert_eq!(vanished.exit_code(), 4);
        assert_eq!(CommandError::from(StoreError::GatewayDetached).exit_code(), 1);
    }
}
