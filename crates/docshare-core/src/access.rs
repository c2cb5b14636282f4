//! Access control evaluator.
//!
//! A pure decision over a principal, the owner of the resource and the
//! requested operation. Rules are evaluated in order and the first match wins:
//!
//! 1. `AdminList` is allowed only for administrative principals.
//! 2. Administrative principals are allowed every other operation.
//! 3. The owner is allowed `Read`, `Write`, `Delete` and `List`.
//! 4. Everything else is denied.

use crate::error::AppError;
use crate::models::{FileRecord, Principal, Role};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Read,
    Write,
    Delete,
    List,
    AdminList,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
            Operation::Delete => write!(f, "delete"),
            Operation::List => write!(f, "list"),
            Operation::AdminList => write!(f, "admin-list"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    /// Convert a deny into [`AppError::Forbidden`] carrying `message`.
    pub fn require(self, message: impl FnOnce() -> String) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(AppError::Forbidden(message())),
        }
    }
}

/// Decide whether `principal` may perform `operation` on `record`.
pub fn can_access(principal: &Principal, record: &FileRecord, operation: Operation) -> Decision {
    can_access_owner(principal, &record.owner_id, operation)
}

/// Same rules as [`can_access`], for operations scoped to an owner rather than
/// one record (listing a user's files).
pub fn can_access_owner(principal: &Principal, owner_id: &str, operation: Operation) -> Decision {
    if operation == Operation::AdminList {
        return if principal.role == Role::Administrative {
            Decision::Allow
        } else {
            Decision::Deny
        };
    }

    if principal.role == Role::Administrative {
        return Decision::Allow;
    }

    if principal.principal_id == owner_id {
        return Decision::Allow;
    }

    Decision::Deny
}
