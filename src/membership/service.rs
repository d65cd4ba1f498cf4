//! RBAC over organization memberships.
//!
//! The invariants guarded here are non-atomic check-then-act sequences
//! against the store; a concurrent deployment must serialize writes per
//! organization in the store adapter (the Postgres schema's unique
//! constraint covers the duplicate-membership case).

use super::models::{Membership, Role};
use crate::clock::Clock;
use crate::ids::IdGenerator;
use crate::store::{MembershipStore, OrganizationStore, StoreError, UserStore};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("user not found")]
    UserNotFound,
    #[error("organization not found")]
    OrganizationNotFound,
    #[error("user is already a member of this organization")]
    AlreadyMember,
    #[error("membership not found")]
    MembershipNotFound,
    #[error("cannot leave a personal organization")]
    CannotLeavePersonalOrg,
    #[error("organization would be left without an admin or owner")]
    LastAdmin,
    #[error("the owner role cannot be changed")]
    CannotChangeOwnerRole,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl MembershipError {
    /// Stable discriminator for the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::OrganizationNotFound => "ORGANIZATION_NOT_FOUND",
            Self::AlreadyMember => "ALREADY_MEMBER",
            Self::MembershipNotFound => "MEMBERSHIP_NOT_FOUND",
            Self::CannotLeavePersonalOrg => "CANNOT_LEAVE_PERSONAL_ORG",
            Self::LastAdmin => "LAST_ADMIN",
            Self::CannotChangeOwnerRole => "CANNOT_CHANGE_OWNER_ROLE",
            Self::Storage(_) => "MEMBERSHIP_STORAGE_ERROR",
        }
    }
}

/// Filter for membership listings.
#[derive(Debug, Clone, Copy)]
pub enum MembershipFilter {
    User(Uuid),
    Organization(Uuid),
}

pub struct MembershipService {
    users: Arc<dyn UserStore>,
    organizations: Arc<dyn OrganizationStore>,
    memberships: Arc<dyn MembershipStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl MembershipService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        organizations: Arc<dyn OrganizationStore>,
        memberships: Arc<dyn MembershipStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            users,
            organizations,
            memberships,
            clock,
            ids,
        }
    }

    /// Add a user to an organization.
    ///
    /// # Errors
    /// `UserNotFound`, `OrganizationNotFound`, `AlreadyMember`, or storage
    /// failure.
    pub async fn add_member(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
        is_personal_org: bool,
    ) -> Result<Membership, MembershipError> {
        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(MembershipError::UserNotFound);
        }
        if self.organizations.find_by_id(organization_id).await?.is_none() {
            return Err(MembershipError::OrganizationNotFound);
        }
        if self
            .memberships
            .find_by_user_and_org(user_id, organization_id)
            .await?
            .is_some()
        {
            return Err(MembershipError::AlreadyMember);
        }

        let membership = Membership {
            id: self.ids.generate(),
            user_id,
            organization_id,
            role,
            is_personal_org,
            joined_at: self.clock.now(),
        };
        self.memberships.save(&membership).await?;
        debug!(
            user_id = %user_id,
            organization_id = %organization_id,
            role = role.as_str(),
            "member added"
        );
        Ok(membership)
    }

    /// Remove a user from an organization.
    ///
    /// Personal-organization memberships cannot be left, and the last
    /// remaining admin/owner cannot be removed. A plain `member` never
    /// triggers the last-admin check.
    ///
    /// # Errors
    /// `MembershipNotFound`, `CannotLeavePersonalOrg`, `LastAdmin`, or
    /// storage failure.
    pub async fn remove_member(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<(), MembershipError> {
        let membership = self
            .memberships
            .find_by_user_and_org(user_id, organization_id)
            .await?
            .ok_or(MembershipError::MembershipNotFound)?;

        if membership.is_personal_org {
            return Err(MembershipError::CannotLeavePersonalOrg);
        }
        if membership.role.is_admin() {
            self.ensure_not_last_admin(&membership).await?;
        }

        self.memberships.delete(membership.id).await?;
        debug!(
            user_id = %user_id,
            organization_id = %organization_id,
            "member removed"
        );
        Ok(())
    }

    /// Change a membership's role.
    ///
    /// The owner role is immutable (it is tied to personal-org creation),
    /// and the last admin/owner cannot be demoted.
    ///
    /// # Errors
    /// `MembershipNotFound`, `CannotChangeOwnerRole`, `LastAdmin`, or
    /// storage failure.
    pub async fn change_role(
        &self,
        membership_id: Uuid,
        new_role: Role,
    ) -> Result<Membership, MembershipError> {
        let membership = self
            .memberships
            .find_by_id(membership_id)
            .await?
            .ok_or(MembershipError::MembershipNotFound)?;

        if membership.role == Role::Owner {
            return Err(MembershipError::CannotChangeOwnerRole);
        }
        if membership.role.is_admin() && !new_role.is_admin() {
            self.ensure_not_last_admin(&membership).await?;
        }

        let updated = Membership {
            role: new_role,
            ..membership
        };
        self.memberships.save(&updated).await?;
        debug!(
            membership_id = %membership_id,
            role = new_role.as_str(),
            "role changed"
        );
        Ok(updated)
    }

    /// # Errors
    /// Storage failure only; an absent membership is `Ok(None)`.
    pub async fn get_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<Membership>, MembershipError> {
        Ok(self
            .memberships
            .find_by_user_and_org(user_id, organization_id)
            .await?)
    }

    /// # Errors
    /// Storage failure.
    pub async fn list_memberships(
        &self,
        filter: MembershipFilter,
    ) -> Result<Vec<Membership>, MembershipError> {
        let memberships = match filter {
            MembershipFilter::User(user_id) => self.memberships.find_by_user(user_id).await?,
            MembershipFilter::Organization(organization_id) => {
                self.memberships.find_by_organization(organization_id).await?
            }
        };
        Ok(memberships)
    }

    /// True iff the user holds a membership whose role ranks at least
    /// `required`. No membership means no role.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn has_role(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        required: Role,
    ) -> Result<bool, MembershipError> {
        let membership = self
            .memberships
            .find_by_user_and_org(user_id, organization_id)
            .await?;
        Ok(membership.is_some_and(|m| m.role >= required))
    }

    /// Counts admin/owner memberships in the organization excluding the one
    /// under mutation; zero remaining means `LastAdmin`.
    async fn ensure_not_last_admin(&self, membership: &Membership) -> Result<(), MembershipError> {
        let remaining_admins = self
            .memberships
            .find_by_organization(membership.organization_id)
            .await?
            .iter()
            .filter(|m| m.id != membership.id && m.role.is_admin())
            .count();
        if remaining_admins == 0 {
            return Err(MembershipError::LastAdmin);
        }
        Ok(())
    }
}
