//! In-memory store adapters.
//!
//! Used by the test suites and by embedded/single-process deployments.
//! Listings are ordered newest-first to match the Postgres adapters.

use super::{
    InvitationStore, MembershipStore, OrganizationStore, PasskeyCredentialStore, StoreError,
    TokenStore, UserStore,
};
use crate::invitation::Invitation;
use crate::membership::Membership;
use crate::models::{Organization, User};
use crate::passkey::PasskeyCredential;
use crate::token::ApiToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryOrganizationStore {
    rows: Mutex<HashMap<Uuid, Organization>>,
}

impl MemoryOrganizationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    async fn save(&self, organization: &Organization) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.insert(organization.id, organization.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Organization>, StoreError> {
        let rows = self.rows.lock().await;
        let mut all: Vec<_> = rows.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMembershipStore {
    rows: Mutex<HashMap<Uuid, Membership>>,
}

impl MemoryMembershipStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn save(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.insert(membership.id, membership.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_by_user_and_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .find(|m| m.user_id == user_id && m.organization_id == organization_id)
            .cloned())
    }

    async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<_> = rows
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(matches)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<_> = rows
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.joined_at.cmp(&a.joined_at));
        Ok(matches)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemoryInvitationStore {
    rows: Mutex<HashMap<Uuid, Invitation>>,
}

impl MemoryInvitationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvitationStore for MemoryInvitationStore {
    async fn save(&self, invitation: &Invitation) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.insert(invitation.id, invitation.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Invitation>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().find(|i| i.code == code).cloned())
    }

    async fn find_pending_by_organization(
        &self,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, StoreError> {
        let rows = self.rows.lock().await;
        let mut pending: Vec<_> = rows
            .values()
            .filter(|i| i.organization_id == organization_id && i.is_pending(now))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    rows: Mutex<HashMap<Uuid, ApiToken>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, token: &ApiToken) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiToken>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn find_by_user_and_organization(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<ApiToken>, StoreError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<_> = rows
            .values()
            .filter(|t| t.user_id == user_id && t.organization_id == organization_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn update_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if let Some(token) = rows.get_mut(&id) {
            token.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }

    async fn has_any_tokens(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.values().any(|t| t.user_id == user_id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryPasskeyCredentialStore {
    rows: Mutex<HashMap<String, PasskeyCredential>>,
}

impl MemoryPasskeyCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasskeyCredentialStore for MemoryPasskeyCredentialStore {
    async fn save(&self, credential: &PasskeyCredential) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        rows.insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PasskeyCredential>, StoreError> {
        Ok(self.rows.lock().await.get(id).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PasskeyCredential>, StoreError> {
        let rows = self.rows.lock().await;
        let mut matches: Vec<_> = rows
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }

    async fn update_counter(&self, id: &str, counter: u32) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if let Some(credential) = rows.get_mut(id) {
            credential.counter = counter;
        }
        Ok(())
    }

    async fn update_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().await;
        if let Some(credential) = rows.get_mut(id) {
            credential.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.rows.lock().await.remove(id).is_some())
    }
}
