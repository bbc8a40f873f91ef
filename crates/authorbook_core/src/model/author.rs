//! Author domain model.
//!
//! # Responsibility
//! - Hold author field values behind validated accessors.
//! - Expose field changes to UI observers.
//! - Carry the store identity and last-modified token used for updates.
//!
//! # Invariants
//! - Every stored field satisfies its predicate; setters reject invalid input
//!   without mutating.
//! - `id` is `None` until the store assigns one on insert.
//! - The gateway back-reference is weak and never keeps a store alive.

use crate::model::observe::{AuthorField, ChangeListeners, FieldChange, SubscriptionId};
use crate::repo::author_repo::{AuthorStore, StoreError, StoreResult};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::{Rc, Weak};
use std::str::FromStr;

/// Store-assigned author identity.
pub type AuthorId = i64;

/// Upper bound (in chars) for first and last names.
pub const NAME_MAX_CHARS: usize = 100;
/// Upper bound (in chars) for the website.
pub const WEBSITE_MAX_CHARS: usize = 100;

/// Author gender, parsed case-insensitively and persisted lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Stable lowercase value used in storage and audit messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }

    /// Parses `male|female|unknown`, ignoring ASCII case.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("male") {
            Some(Self::Male)
        } else if value.eq_ignore_ascii_case("female") {
            Some(Self::Female)
        } else if value.eq_ignore_ascii_case("unknown") {
            Some(Self::Unknown)
        } else {
            None
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = AuthorValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| AuthorValidationError::Gender(value.to_string()))
    }
}

/// Field-level validation failure. Each variant names the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorValidationError {
    FirstName { chars: usize },
    LastName { chars: usize },
    DateOfBirth {
        date_of_birth: NaiveDate,
        today: NaiveDate,
    },
    Gender(String),
    Website { chars: usize },
}

impl AuthorValidationError {
    /// Field that failed validation.
    pub fn field(&self) -> AuthorField {
        match self {
            Self::FirstName { .. } => AuthorField::FirstName,
            Self::LastName { .. } => AuthorField::LastName,
            Self::DateOfBirth { .. } => AuthorField::DateOfBirth,
            Self::Gender(_) => AuthorField::Gender,
            Self::Website { .. } => AuthorField::Website,
        }
    }
}

impl Display for AuthorValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstName { chars } => write!(
                f,
                "first name must be between 1 and {NAME_MAX_CHARS} characters, got {chars}"
            ),
            Self::LastName { chars } => write!(
                f,
                "last name must be between 1 and {NAME_MAX_CHARS} characters, got {chars}"
            ),
            Self::DateOfBirth {
                date_of_birth,
                today,
            } => write!(
                f,
                "date of birth {date_of_birth} must be before the current date {today}"
            ),
            Self::Gender(value) => write!(
                f,
                "gender must be either male, female, or unknown, got `{value}`"
            ),
            Self::Website { chars } => write!(
                f,
                "website must be at most {WEBSITE_MAX_CHARS} characters, got {chars}"
            ),
        }
    }
}

impl Error for AuthorValidationError {}

/// Name predicate: 1 to 100 characters.
pub fn is_valid_name(name: &str) -> bool {
    (1..=NAME_MAX_CHARS).contains(&name.chars().count())
}

/// Date-of-birth predicate: strictly before `today`, compared as calendar dates.
pub fn is_valid_date_of_birth(date_of_birth: NaiveDate, today: NaiveDate) -> bool {
    date_of_birth < today
}

/// Gender predicate: `male`, `female` or `unknown`, ignoring case.
pub fn is_valid_gender(gender: &str) -> bool {
    Gender::parse(gender).is_some()
}

/// Website predicate: at most 100 characters.
pub fn is_valid_website(website: &str) -> bool {
    website.chars().count() <= WEBSITE_MAX_CHARS
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn check_first_name(value: &str) -> Result<(), AuthorValidationError> {
    if is_valid_name(value) {
        Ok(())
    } else {
        Err(AuthorValidationError::FirstName {
            chars: value.chars().count(),
        })
    }
}

fn check_last_name(value: &str) -> Result<(), AuthorValidationError> {
    if is_valid_name(value) {
        Ok(())
    } else {
        Err(AuthorValidationError::LastName {
            chars: value.chars().count(),
        })
    }
}

fn check_date_of_birth(value: NaiveDate, today: NaiveDate) -> Result<(), AuthorValidationError> {
    if is_valid_date_of_birth(value, today) {
        Ok(())
    } else {
        Err(AuthorValidationError::DateOfBirth {
            date_of_birth: value,
            today,
        })
    }
}

fn check_website(value: Option<&str>) -> Result<(), AuthorValidationError> {
    match value {
        Some(website) if !is_valid_website(website) => Err(AuthorValidationError::Website {
            chars: website.chars().count(),
        }),
        _ => Ok(()),
    }
}

fn normalize_website(value: Option<&str>) -> Option<String> {
    value.filter(|website| !website.is_empty()).map(str::to_string)
}

/// Author record with validated, observable fields.
///
/// Equality compares identity, field values and the last-modified token;
/// subscribers and the gateway reference are ignored.
#[derive(Debug, Clone, Serialize)]
pub struct Author {
    id: Option<AuthorId>,
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    gender: Gender,
    website: Option<String>,
    /// Epoch milliseconds of the persisted row this copy was read from.
    last_modified: Option<i64>,
    #[serde(skip)]
    listeners: ChangeListeners,
    #[serde(skip)]
    gateway: Option<Weak<dyn AuthorStore>>,
}

impl Author {
    /// Creates an unpersisted author without a website.
    ///
    /// # Errors
    /// - Returns the first failing field, checked in audit order.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: NaiveDate,
        gender: &str,
    ) -> Result<Self, AuthorValidationError> {
        Self::with_website(first_name, last_name, date_of_birth, gender, None)
    }

    /// Creates an unpersisted author with an optional website.
    ///
    /// An empty website is stored as `None`.
    pub fn with_website(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        date_of_birth: NaiveDate,
        gender: &str,
        website: Option<&str>,
    ) -> Result<Self, AuthorValidationError> {
        let first_name = first_name.into();
        let last_name = last_name.into();
        check_first_name(&first_name)?;
        check_last_name(&last_name)?;
        check_date_of_birth(date_of_birth, today())?;
        let gender = gender.parse::<Gender>()?;
        check_website(website)?;

        Ok(Self {
            id: None,
            first_name,
            last_name,
            date_of_birth,
            gender,
            website: normalize_website(website),
            last_modified: None,
            listeners: ChangeListeners::default(),
            gateway: None,
        })
    }

    /// Re-checks every field against the current date.
    pub fn validate(&self) -> Result<(), AuthorValidationError> {
        self.validate_on(today())
    }

    /// Re-checks every field, using `today` as the date-of-birth bound.
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), AuthorValidationError> {
        check_first_name(&self.first_name)?;
        check_last_name(&self.last_name)?;
        check_date_of_birth(self.date_of_birth, today)?;
        check_website(self.website.as_deref())
    }

    pub fn id(&self) -> Option<AuthorId> {
        self.id
    }

    /// Whether the store has assigned an identity.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Optimistic-concurrency token: epoch milliseconds of the last read,
    /// insert or update performed through the store.
    pub fn last_modified(&self) -> Option<i64> {
        self.last_modified
    }

    pub fn set_first_name(&mut self, value: impl Into<String>) -> Result<(), AuthorValidationError> {
        let value = value.into();
        check_first_name(&value)?;
        let old = std::mem::replace(&mut self.first_name, value);
        self.emit(AuthorField::FirstName, old, self.first_name.clone());
        Ok(())
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) -> Result<(), AuthorValidationError> {
        let value = value.into();
        check_last_name(&value)?;
        let old = std::mem::replace(&mut self.last_name, value);
        self.emit(AuthorField::LastName, old, self.last_name.clone());
        Ok(())
    }

    pub fn set_date_of_birth(&mut self, value: NaiveDate) -> Result<(), AuthorValidationError> {
        check_date_of_birth(value, today())?;
        let old = std::mem::replace(&mut self.date_of_birth, value);
        self.emit(
            AuthorField::DateOfBirth,
            old.to_string(),
            value.to_string(),
        );
        Ok(())
    }

    /// Sets the gender from user input, ignoring case.
    pub fn set_gender(&mut self, value: &str) -> Result<(), AuthorValidationError> {
        let value = value.parse::<Gender>()?;
        let old = std::mem::replace(&mut self.gender, value);
        self.emit(
            AuthorField::Gender,
            old.as_str().to_string(),
            value.as_str().to_string(),
        );
        Ok(())
    }

    /// Sets or clears the website. An empty string clears it.
    pub fn set_website(&mut self, value: Option<&str>) -> Result<(), AuthorValidationError> {
        check_website(value)?;
        let old = std::mem::replace(&mut self.website, normalize_website(value));
        self.emit(
            AuthorField::Website,
            old.unwrap_or_default(),
            self.website.clone().unwrap_or_default(),
        );
        Ok(())
    }

    /// Registers a listener called after every effective field change.
    pub fn subscribe(&mut self, listener: impl Fn(&FieldChange) + 'static) -> SubscriptionId {
        self.listeners.subscribe(Rc::new(listener))
    }

    /// Removes a listener. Returns `false` when `id` is not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Lists fields whose values differ from `persisted`, in audit order.
    ///
    /// `old` carries the persisted value and `new` the value held here.
    pub fn diff_from(&self, persisted: &Author) -> Vec<FieldChange> {
        AuthorField::ALL
            .into_iter()
            .filter_map(|field| {
                let old = persisted.field_value(field);
                let new = self.field_value(field);
                (old != new).then_some(FieldChange { field, old, new })
            })
            .collect()
    }

    /// Copies field values and the last-modified token from a fresher copy
    /// of the same record, notifying subscribers of each change.
    pub fn sync_from(&mut self, fresh: &Author) {
        for change in fresh.diff_from(self) {
            match change.field {
                AuthorField::FirstName => self.first_name = fresh.first_name.clone(),
                AuthorField::LastName => self.last_name = fresh.last_name.clone(),
                AuthorField::DateOfBirth => self.date_of_birth = fresh.date_of_birth,
                AuthorField::Gender => self.gender = fresh.gender,
                AuthorField::Website => self.website = fresh.website.clone(),
            }
            self.listeners.notify(&change);
        }
        self.last_modified = fresh.last_modified;
    }

    /// Returns the store that loaded or inserted this author, if still alive.
    pub fn gateway(&self) -> Option<Rc<dyn AuthorStore>> {
        self.gateway.as_ref().and_then(Weak::upgrade)
    }

    /// Attaches a non-owning store reference used by `save`.
    pub fn set_gateway(&mut self, gateway: Weak<dyn AuthorStore>) {
        self.gateway = Some(gateway);
    }

    /// Persists in-memory changes through the attached store.
    ///
    /// # Errors
    /// - `StoreError::GatewayDetached` when no live store is attached.
    /// - Any error raised by `AuthorStore::update_author`.
    pub fn save(&mut self) -> StoreResult<()> {
        let gateway = self.gateway().ok_or(StoreError::GatewayDetached)?;
        gateway.update_author(self)
    }

    pub(crate) fn assign_identity(&mut self, id: AuthorId, last_modified: i64) {
        self.id = Some(id);
        self.last_modified = Some(last_modified);
    }

    pub(crate) fn set_last_modified(&mut self, last_modified: i64) {
        self.last_modified = Some(last_modified);
    }

    fn field_value(&self, field: AuthorField) -> String {
        match field {
            AuthorField::FirstName => self.first_name.clone(),
            AuthorField::LastName => self.last_name.clone(),
            AuthorField::DateOfBirth => self.date_of_birth.to_string(),
            AuthorField::Gender => self.gender.as_str().to_string(),
            AuthorField::Website => self.website.clone().unwrap_or_default(),
        }
    }

    fn emit(&self, field: AuthorField, old: String, new: String) {
        if old != new {
            self.listeners.notify(&FieldChange { field, old, new });
        }
    }
}

impl PartialEq for Author {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.date_of_birth == other.date_of_birth
            && self.gender == other.gender
            && self.website == other.website
            && self.last_modified == other.last_modified
    }
}

impl Eq for Author {}

impl Display for Author {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}
