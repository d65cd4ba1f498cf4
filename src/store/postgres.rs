//! Postgres store adapters.
//!
//! The schema in `sql/schema.sql` carries the constraints that close the
//! domain layer's check-then-act races: memberships are unique per
//! `(user_id, organization_id)` and invitation codes are unique globally.
//! Writes that re-run for an existing id are expressed as upserts so
//! `save` doubles as the update path (organization rename, role change,
//! invitation acceptance).

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
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgOrganizationStore {
    pool: PgPool,
}

impl PgOrganizationStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationStore for PgOrganizationStore {
    async fn save(&self, organization: &Organization) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO organizations (id, name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            ",
        )
        .bind(organization.id)
        .bind(&organization.name)
        .bind(organization.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        let row = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_all(&self) -> Result<Vec<Organization>, StoreError> {
        let rows =
            sqlx::query_as::<_, Organization>("SELECT * FROM organizations ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn save(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
            ",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[derive(Debug, Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn save(&self, membership: &Membership) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO memberships (id, user_id, organization_id, role, is_personal_org, joined_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role
            ",
        )
        .bind(membership.id)
        .bind(membership.user_id)
        .bind(membership.organization_id)
        .bind(membership.role.as_str())
        .bind(membership.is_personal_org)
        .bind(membership.joined_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_user_and_org(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE organization_id = $1 ORDER BY joined_at DESC",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let rows = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE user_id = $1 ORDER BY joined_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
pub struct PgInvitationStore {
    pool: PgPool,
}

impl PgInvitationStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationStore for PgInvitationStore {
    async fn save(&self, invitation: &Invitation) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO invitations
                (id, code, email, organization_id, invited_by_user_id, role,
                 expires_at, accepted_at, accepted_by_user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                accepted_at = EXCLUDED.accepted_at,
                accepted_by_user_id = EXCLUDED.accepted_by_user_id
            ",
        )
        .bind(invitation.id)
        .bind(&invitation.code)
        .bind(&invitation.email)
        .bind(invitation.organization_id)
        .bind(invitation.invited_by_user_id)
        .bind(invitation.role.as_str())
        .bind(invitation.expires_at)
        .bind(invitation.accepted_at)
        .bind(invitation.accepted_by_user_id)
        .bind(invitation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Invitation>, StoreError> {
        let row = sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_pending_by_organization(
        &self,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invitation>, StoreError> {
        let rows = sqlx::query_as::<_, Invitation>(
            r"
            SELECT * FROM invitations
            WHERE organization_id = $1 AND accepted_at IS NULL AND expires_at > $2
            ORDER BY created_at DESC
            ",
        )
        .bind(organization_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn save(&self, token: &ApiToken) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO api_tokens
                (id, user_id, organization_id, token_hash, name, last_used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.organization_id)
        .bind(&token.token_hash)
        .bind(&token.name)
        .bind(token.last_used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiToken>, StoreError> {
        let row = sqlx::query_as::<_, ApiToken>("SELECT * FROM api_tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_user_and_organization(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<ApiToken>, StoreError> {
        let rows = sqlx::query_as::<_, ApiToken>(
            r"
            SELECT * FROM api_tokens
            WHERE user_id = $1 AND organization_id IS NOT DISTINCT FROM $2
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE api_tokens SET last_used_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_any_tokens(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let row =
            sqlx::query("SELECT EXISTS(SELECT 1 FROM api_tokens WHERE user_id = $1) AS present")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.get("present"))
    }
}

#[derive(Debug, Clone)]
pub struct PgPasskeyCredentialStore {
    pool: PgPool,
}

impl PgPasskeyCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasskeyCredentialStore for PgPasskeyCredentialStore {
    async fn save(&self, credential: &PasskeyCredential) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO passkey_credentials
                (id, user_id, public_key, counter, transports, device_type,
                 backed_up, name, created_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&credential.id)
        .bind(credential.user_id)
        .bind(&credential.public_key)
        .bind(i64::from(credential.counter))
        .bind(&credential.transports)
        .bind(credential.device_type.as_str())
        .bind(credential.backed_up)
        .bind(&credential.name)
        .bind(credential.created_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PasskeyCredential>, StoreError> {
        let row =
            sqlx::query_as::<_, PasskeyCredential>("SELECT * FROM passkey_credentials WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<PasskeyCredential>, StoreError> {
        let rows = sqlx::query_as::<_, PasskeyCredential>(
            "SELECT * FROM passkey_credentials WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_counter(&self, id: &str, counter: u32) -> Result<(), StoreError> {
        sqlx::query("UPDATE passkey_credentials SET counter = $1 WHERE id = $2")
            .bind(i64::from(counter))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_last_used(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE passkey_credentials SET last_used_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM passkey_credentials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
