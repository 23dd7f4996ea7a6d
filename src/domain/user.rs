use super::ids::UserId;
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

/// A registered account, as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Always stored normalized (see [`normalize_email`]).
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: &str) -> Result<Self, LedgerError> {
        Ok(Self {
            id: UserId::new(),
            name: name.into(),
            email: normalize_email(email)?,
        })
    }

    /// Name to show for this user, falling back to the email local part.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            local_part(&self.email)
        } else {
            &self.name
        }
    }
}

/// Trims and lowercases an email, rejecting anything without a local part and a domain.
pub fn normalize_email(raw: &str) -> Result<String, LedgerError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(LedgerError::invalid(format!("invalid email address '{raw}'"))),
    }
}

pub fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
