//! Invitation model.

use crate::membership::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Who initiated an invitation.
///
/// Only [`InvitedBy::System`] bypasses the inviter permission check, and the
/// bypass cannot be threaded by accident the way a boolean flag could. A
/// system-issued invitation records no inviting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitedBy {
    System,
    User(Uuid),
}

impl InvitedBy {
    #[must_use]
    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Self::System => None,
            Self::User(id) => Some(id),
        }
    }
}

/// A single-use, time-boxed offer of membership. Acceptance is terminal:
/// `accepted_at` is written exactly once and never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub code: String,
    pub email: Option<String>,
    pub organization_id: Uuid,
    pub invited_by_user_id: Option<Uuid>,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }

    /// Expired at or after `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Neither accepted nor expired as of `now`.
    #[must_use]
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        !self.is_accepted() && !self.is_expired(now)
    }
}

impl<'r> FromRow<'r, PgRow> for Invitation {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            email: row.try_get("email")?,
            organization_id: row.try_get("organization_id")?,
            invited_by_user_id: row.try_get("invited_by_user_id")?,
            role: role
                .parse()
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            expires_at: row.try_get("expires_at")?,
            accepted_at: row.try_get("accepted_at")?,
            accepted_by_user_id: row.try_get("accepted_by_user_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
