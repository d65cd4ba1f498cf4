//! Membership and role model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Organization role. Declaration order is rank order, so `Ord` gives the
/// `member < admin < owner` hierarchy directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Member => 0,
            Self::Admin => 1,
            Self::Owner => 2,
        }
    }

    /// Whether this role carries administrative rights (admin or owner).
    #[must_use]
    pub fn is_admin(self) -> bool {
        self >= Self::Admin
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

/// A user's standing inside one organization. At most one membership exists
/// per `(user_id, organization_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub is_personal_org: bool,
    pub joined_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Membership {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            organization_id: row.try_get("organization_id")?,
            role: role
                .parse()
                .map_err(|err: RoleParseError| sqlx::Error::Decode(Box::new(err)))?,
            is_personal_org: row.try_get("is_personal_org")?,
            joined_at: row.try_get("joined_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_follows_declaration_order() {
        assert!(Role::Member < Role::Admin);
        assert!(Role::Admin < Role::Owner);
        assert_eq!(Role::Member.rank(), 0);
        assert_eq!(Role::Admin.rank(), 1);
        assert_eq!(Role::Owner.rank(), 2);
    }

    #[test]
    fn only_admin_and_owner_are_administrative() {
        assert!(!Role::Member.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(Role::Owner.is_admin());
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Member, Role::Admin, Role::Owner] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }
}
