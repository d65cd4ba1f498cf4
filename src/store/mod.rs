//! Store ports consumed by the domain services.
//!
//! Every lookup distinguishes "not found" (`Ok(None)`) from storage failure
//! (`Err(StoreError)`). The domain layer never retries a failed store call;
//! retries, row locks, and unique constraints live in the adapters.

pub mod memory;
pub mod postgres;

use crate::invitation::Invitation;
use crate::membership::Membership;
use crate::models::{Organization, User};
use crate::passkey::PasskeyCredential;
use crate::token::ApiToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Infrastructure failure inside a store adapter. Domain-rule violations are
/// never represented here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn save(&self, organization: &Organization) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, StoreError>;
    async fn find_all(&self) -> Result<Vec<Organization>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn save(&self, user: &User) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn save(&self, membership: &Membership) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>, StoreError>;
    async fn find_by_user_and_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;
    async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Membership>, StoreError>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError>;
    /// Returns whether a membership was actually removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn save(&self, invitation: &Invitation) -> Result<(), StoreError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Invitation>, StoreError>;
    /// Invitations that are neither accepted nor expired as of `now`.
    async fn find_pending_by_organization(
        &self,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn save(&self, token: &ApiToken) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiToken>, StoreError>;
    async fn find_by_user_and_organization(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<ApiToken>, StoreError>;
    async fn update_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
    /// Returns whether a token was actually removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn has_any_tokens(&self, user_id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PasskeyCredentialStore: Send + Sync {
    async fn save(&self, credential: &PasskeyCredential) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<PasskeyCredential>, StoreError>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PasskeyCredential>, StoreError>;
    async fn update_counter(&self, id: &str, counter: u32) -> Result<(), StoreError>;
    async fn update_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
    /// Returns whether a credential was actually removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}
