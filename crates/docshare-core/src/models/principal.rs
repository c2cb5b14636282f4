use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Role carried by an authenticated caller
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Ordinary,
    Administrative,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Role::Ordinary => write!(f, "ordinary"),
            Role::Administrative => write!(f, "administrative"),
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    /// Accepts the identity provider's spellings: `admin`/`administrative`
    /// map to [`Role::Administrative`], anything in `citizen`/`user`/`ordinary`
    /// maps to [`Role::Ordinary`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "administrative" => Ok(Role::Administrative),
            "ordinary" | "user" | "citizen" | "member" => Ok(Role::Ordinary),
            other => Err(anyhow::anyhow!("Unknown principal role: {}", other)),
        }
    }
}

/// The authenticated caller of a request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(principal_id: impl Into<String>, role: Role) -> Self {
        Self {
            principal_id: principal_id.into(),
            role,
        }
    }

    pub fn ordinary(principal_id: impl Into<String>) -> Self {
        Self::new(principal_id, Role::Ordinary)
    }

    pub fn admin(principal_id: impl Into<String>) -> Self {
        Self::new(principal_id, Role::Administrative)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrative
    }
}
