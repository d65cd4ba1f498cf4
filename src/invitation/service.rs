//! Invitation lifecycle.
//!
//! Accepting an invitation deliberately does not create a membership:
//! signup flows have to create the user first, so callers compose
//! `accept_invitation` with `MembershipService::add_member`.

use super::models::{Invitation, InvitedBy};
use crate::clock::Clock;
use crate::ids::{CodeGenerator, IdGenerator};
use crate::membership::Role;
use crate::store::{InvitationStore, MembershipStore, OrganizationStore, StoreError};
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("organization not found")]
    OrgNotFound,
    #[error("inviter lacks admin rights in this organization")]
    InsufficientInvitePermissions,
    #[error("invitation not found")]
    NotFound,
    #[error("invitation expired")]
    Expired,
    #[error("invitation already accepted")]
    AlreadyAccepted,
    #[error("invitation is restricted to a different email")]
    EmailMismatch,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl InvitationError {
    /// Stable discriminator for the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OrgNotFound => "INVITATION_ORG_NOT_FOUND",
            Self::InsufficientInvitePermissions => "INSUFFICIENT_INVITE_PERMISSIONS",
            Self::NotFound => "INVITATION_NOT_FOUND",
            Self::Expired => "INVITATION_EXPIRED",
            Self::AlreadyAccepted => "INVITATION_ALREADY_ACCEPTED",
            Self::EmailMismatch => "INVITATION_EMAIL_MISMATCH",
            Self::Storage(_) => "INVITATION_STORAGE_ERROR",
        }
    }
}

pub struct InvitationService {
    invitations: Arc<dyn InvitationStore>,
    organizations: Arc<dyn OrganizationStore>,
    memberships: Arc<dyn MembershipStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    codes: Arc<dyn CodeGenerator>,
    default_expiry_days: i64,
}

impl InvitationService {
    #[must_use]
    pub fn new(
        invitations: Arc<dyn InvitationStore>,
        organizations: Arc<dyn OrganizationStore>,
        memberships: Arc<dyn MembershipStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        codes: Arc<dyn CodeGenerator>,
        default_expiry_days: i64,
    ) -> Self {
        Self {
            invitations,
            organizations,
            memberships,
            clock,
            ids,
            codes,
            default_expiry_days,
        }
    }

    /// Create an invitation into an organization.
    ///
    /// A user-initiated invitation requires the inviter to hold an admin or
    /// owner membership there; a system-initiated one skips the check and
    /// records no inviter.
    ///
    /// # Errors
    /// `OrgNotFound`, `InsufficientInvitePermissions`, or storage failure.
    pub async fn create_invitation(
        &self,
        organization_id: Uuid,
        invited_by: InvitedBy,
        role: Role,
        email: Option<String>,
        expires_in_days: Option<i64>,
    ) -> Result<Invitation, InvitationError> {
        if self.organizations.find_by_id(organization_id).await?.is_none() {
            return Err(InvitationError::OrgNotFound);
        }

        if let InvitedBy::User(inviter_id) = invited_by {
            let inviter = self
                .memberships
                .find_by_user_and_org(inviter_id, organization_id)
                .await?;
            if !inviter.is_some_and(|m| m.role.is_admin()) {
                return Err(InvitationError::InsufficientInvitePermissions);
            }
        }

        let now = self.clock.now();
        let expiry_days = expires_in_days.unwrap_or(self.default_expiry_days);
        let invitation = Invitation {
            id: self.ids.generate(),
            code: self.codes.generate(),
            email: email.map(|e| normalize_email(&e)),
            organization_id,
            invited_by_user_id: invited_by.user_id(),
            role,
            expires_at: now + Duration::days(expiry_days),
            accepted_at: None,
            accepted_by_user_id: None,
            created_at: now,
        };
        self.invitations.save(&invitation).await?;
        debug!(
            organization_id = %organization_id,
            role = role.as_str(),
            system_issued = invitation.invited_by_user_id.is_none(),
            "invitation created"
        );
        Ok(invitation)
    }

    /// Check a code without consuming it.
    ///
    /// # Errors
    /// `NotFound`, `Expired`, `AlreadyAccepted`, `EmailMismatch`, or storage
    /// failure.
    pub async fn validate_invitation(
        &self,
        code: &str,
        email: Option<&str>,
    ) -> Result<Invitation, InvitationError> {
        let invitation = self
            .invitations
            .find_by_code(code)
            .await?
            .ok_or(InvitationError::NotFound)?;
        self.check_usable(&invitation)?;
        if let Some(restricted_to) = invitation.email.as_deref() {
            let supplied = email.map(normalize_email);
            if supplied.as_deref() != Some(restricted_to) {
                return Err(InvitationError::EmailMismatch);
            }
        }
        Ok(invitation)
    }

    /// Consume a code for `user_id`. Acceptance is terminal; the membership
    /// itself is created by the caller.
    ///
    /// The email restriction is enforced by [`Self::validate_invitation`],
    /// which callers run with the claimed email before signup; at acceptance
    /// time only expiry and single-use are re-checked.
    ///
    /// # Errors
    /// `NotFound`, `Expired`, `AlreadyAccepted`, or storage failure.
    pub async fn accept_invitation(
        &self,
        code: &str,
        user_id: Uuid,
    ) -> Result<Invitation, InvitationError> {
        let invitation = self
            .invitations
            .find_by_code(code)
            .await?
            .ok_or(InvitationError::NotFound)?;
        self.check_usable(&invitation)?;

        let accepted = Invitation {
            accepted_at: Some(self.clock.now()),
            accepted_by_user_id: Some(user_id),
            ..invitation
        };
        self.invitations.save(&accepted).await?;
        debug!(
            organization_id = %accepted.organization_id,
            user_id = %user_id,
            "invitation accepted"
        );
        Ok(accepted)
    }

    /// Invitations that are neither expired nor accepted as of now.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn list_pending_invitations(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, InvitationError> {
        Ok(self
            .invitations
            .find_pending_by_organization(organization_id, self.clock.now())
            .await?)
    }

    fn check_usable(&self, invitation: &Invitation) -> Result<(), InvitationError> {
        if invitation.is_expired(self.clock.now()) {
            return Err(InvitationError::Expired);
        }
        if invitation.is_accepted() {
            return Err(InvitationError::AlreadyAccepted);
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
