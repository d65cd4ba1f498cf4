//! Opaque API token model.

use crate::models::{Organization, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;

/// Stored half of an opaque bearer token. The externally visible string is
/// `"{id}:{secret}"`; only an argon2 digest of the secret is ever kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub name: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ApiToken {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            organization_id: row.try_get("organization_id")?,
            token_hash: row.try_get("token_hash")?,
            name: row.try_get("name")?,
            last_used_at: row.try_get("last_used_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Request to mint a token.
#[derive(Debug, Clone, Deserialize)]
pub struct NewToken {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub name: String,
}

/// Result of minting. `raw_token` is shown exactly once; it cannot be
/// reconstructed from stored state.
#[derive(Debug, Clone)]
pub struct CreatedToken {
    pub token: ApiToken,
    pub raw_token: String,
}

/// Fully resolved authentication context for a presented token.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub organization: Organization,
    pub user: User,
    pub token: ApiToken,
}

/// Listing DTO. Carries no digest, by construction.
#[derive(Debug, Clone, Serialize)]
pub struct TokenMetadata {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub name: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiToken> for TokenMetadata {
    fn from(token: ApiToken) -> Self {
        Self {
            id: token.id,
            organization_id: token.organization_id,
            name: token.name,
            last_used_at: token.last_used_at,
            created_at: token.created_at,
        }
    }
}
