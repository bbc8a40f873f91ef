//! Field-level change notification for UI binding.
//!
//! # Responsibility
//! - Name the observable author fields and their human-readable labels.
//! - Deliver one `FieldChange` per effective mutation to subscribers.
//!
//! # Invariants
//! - Listeners are bound to one entity instance; clones start empty.
//! - Notification happens after the new value is stored.

use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Observable fields of an `Author`, in audit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorField {
    FirstName,
    LastName,
    DateOfBirth,
    Gender,
    Website,
}

impl AuthorField {
    /// Every field, in the order diffs and audit entries are produced.
    pub const ALL: [AuthorField; 5] = [
        Self::FirstName,
        Self::LastName,
        Self::DateOfBirth,
        Self::Gender,
        Self::Website,
    ];

    /// Human-readable label used in audit messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::DateOfBirth => "Date of birth",
            Self::Gender => "Gender",
            Self::Website => "Website",
        }
    }
}

/// One observed value transition. Absent websites are carried as `""`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: AuthorField,
    pub old: String,
    pub new: String,
}

impl FieldChange {
    /// Renders the audit-trail message, e.g. `First name changed from Ann to Anne`.
    pub fn audit_message(&self) -> String {
        format!(
            "{} changed from {} to {}",
            self.field.label(),
            display_value(&self.old),
            display_value(&self.new)
        )
    }
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

/// Handle returned by `Author::subscribe`, used to unsubscribe.
pub type SubscriptionId = u64;

type Listener = Rc<dyn Fn(&FieldChange)>;

#[derive(Default)]
pub(crate) struct ChangeListeners {
    next_id: SubscriptionId,
    entries: Vec<(SubscriptionId, Listener)>,
}

impl ChangeListeners {
    pub(crate) fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.next_id += 1;
        self.entries.push((self.next_id, listener));
        self.next_id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn notify(&self, change: &FieldChange) {
        for (_, listener) in &self.entries {
            listener(change);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Clone for ChangeListeners {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl Debug for ChangeListeners {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("subscribers", &self.entries.len())
            .finish()
    }
}
