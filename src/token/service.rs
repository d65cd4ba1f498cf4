//! Opaque bearer-token authentication.
//!
//! A presented token is `"{id}:{secret}"`. Validation performs exactly one
//! password-hash comparison whether or not the id resolves: when the id is
//! unknown the comparison runs against a fixed dummy digest minted at
//! construction time. Skipping the comparison on the unknown-id path would
//! let response timing reveal which token ids exist.

use super::models::{ApiToken, CreatedToken, NewToken, TokenMetadata, ValidatedToken};
use crate::clock::Clock;
use crate::ids::IdGenerator;
use crate::password::{HasherError, PasswordHasher};
use crate::store::{OrganizationStore, StoreError, TokenStore, UserStore};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Hashed at construction so the unknown-id comparison always has a valid
/// digest to chew on.
const DUMMY_SECRET: &str = "captura-iam-dummy-token-secret";
const SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not of the form id:secret")]
    InvalidFormat,
    #[error("token not found")]
    NotFound,
    #[error("token secret mismatch")]
    InvalidSecret,
    #[error("user not found")]
    UserNotFound,
    #[error("organization not found")]
    OrganizationNotFound,
    #[error("token limit reached for this user and organization")]
    LimitReached,
    #[error("token not found for this user")]
    UserTokenNotFound,
    #[error("token belongs to a different user")]
    OwnershipError,
    #[error(transparent)]
    Hasher(#[from] HasherError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl TokenError {
    /// Stable discriminator for the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "INVALID_TOKEN_FORMAT",
            Self::NotFound => "TOKEN_NOT_FOUND",
            Self::InvalidSecret => "INVALID_SECRET",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::OrganizationNotFound => "ORGANIZATION_NOT_FOUND",
            Self::LimitReached => "TOKEN_LIMIT_REACHED",
            Self::UserTokenNotFound => "USER_TOKEN_NOT_FOUND",
            Self::OwnershipError => "TOKEN_OWNERSHIP_ERROR",
            Self::Hasher(_) => "HASHER_ERROR",
            Self::Storage(_) => "TOKEN_STORAGE_ERROR",
        }
    }
}

pub struct TokenService {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
    organizations: Arc<dyn OrganizationStore>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    max_tokens_per_user_per_org: usize,
    dummy_hash: String,
}

impl TokenService {
    /// # Errors
    /// Fails only if the injected hasher cannot produce the dummy digest.
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserStore>,
        organizations: Arc<dyn OrganizationStore>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        max_tokens_per_user_per_org: usize,
    ) -> Result<Self, TokenError> {
        let dummy_hash = hasher.hash(DUMMY_SECRET)?;
        Ok(Self {
            tokens,
            users,
            organizations,
            hasher,
            clock,
            ids,
            max_tokens_per_user_per_org,
            dummy_hash,
        })
    }

    /// Authenticate a presented token string.
    ///
    /// The secret comparison executes unconditionally, before any
    /// not-found error is surfaced, so unknown ids cost the same wall-clock
    /// time as known ones. On success `last_used_at` is stamped.
    ///
    /// # Errors
    /// `InvalidFormat`, `NotFound`, `InvalidSecret`, `UserNotFound`,
    /// `OrganizationNotFound`, or hasher/storage failure.
    pub async fn validate_token(&self, plaintext: &str) -> Result<ValidatedToken, TokenError> {
        let Some((id_part, secret)) = plaintext.split_once(':') else {
            return Err(TokenError::InvalidFormat);
        };
        if id_part.is_empty() || secret.is_empty() {
            return Err(TokenError::InvalidFormat);
        }

        // A non-UUID id can never match a stored token; it takes the
        // unknown-id path rather than the format error.
        let token = match Uuid::parse_str(id_part) {
            Ok(id) => self.tokens.find_by_id(id).await?,
            Err(_) => None,
        };

        let digest = token
            .as_ref()
            .map_or(self.dummy_hash.as_str(), |t| t.token_hash.as_str());
        let secret_matches = self.hasher.verify(secret, digest)?;

        let Some(token) = token else {
            return Err(TokenError::NotFound);
        };
        if !secret_matches {
            warn!(token_id = %token.id, "token presented with wrong secret");
            return Err(TokenError::InvalidSecret);
        }

        let user = self
            .users
            .find_by_id(token.user_id)
            .await?
            .ok_or(TokenError::UserNotFound)?;
        let organization_id = token
            .organization_id
            .ok_or(TokenError::OrganizationNotFound)?;
        let organization = self
            .organizations
            .find_by_id(organization_id)
            .await?
            .ok_or(TokenError::OrganizationNotFound)?;

        let now = self.clock.now();
        self.tokens.update_last_used(token.id, now).await?;
        let token = ApiToken {
            last_used_at: Some(now),
            ..token
        };
        Ok(ValidatedToken {
            organization,
            user,
            token,
        })
    }

    /// Mint a token under the per-(user, organization) quota. The returned
    /// raw token is shown exactly once.
    ///
    /// # Errors
    /// `LimitReached`, or hasher/storage failure.
    pub async fn create_token(&self, new_token: NewToken) -> Result<CreatedToken, TokenError> {
        let existing = self
            .tokens
            .find_by_user_and_organization(new_token.user_id, new_token.organization_id)
            .await?;
        if existing.len() >= self.max_tokens_per_user_per_org {
            return Err(TokenError::LimitReached);
        }

        let id = self.ids.generate();
        let secret = generate_secret();
        let token = ApiToken {
            id,
            user_id: new_token.user_id,
            organization_id: new_token.organization_id,
            token_hash: self.hasher.hash(&secret)?,
            name: new_token.name,
            last_used_at: None,
            created_at: self.clock.now(),
        };
        self.tokens.save(&token).await?;
        debug!(token_id = %id, user_id = %token.user_id, "token created");

        Ok(CreatedToken {
            raw_token: format!("{id}:{secret}"),
            token,
        })
    }

    /// Token metadata for a user inside one organization scope. Digests are
    /// never part of the listing type.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn list_tokens(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
    ) -> Result<Vec<TokenMetadata>, TokenError> {
        let tokens = self
            .tokens
            .find_by_user_and_organization(user_id, organization_id)
            .await?;
        Ok(tokens.into_iter().map(TokenMetadata::from).collect())
    }

    /// Revoke a token the user owns.
    ///
    /// # Errors
    /// `UserTokenNotFound`, `OwnershipError`, or storage failure.
    pub async fn revoke_token(&self, user_id: Uuid, token_id: Uuid) -> Result<(), TokenError> {
        let token = self
            .tokens
            .find_by_id(token_id)
            .await?
            .ok_or(TokenError::UserTokenNotFound)?;
        if token.user_id != user_id {
            return Err(TokenError::OwnershipError);
        }
        self.tokens.delete(token_id).await?;
        debug!(token_id = %token_id, user_id = %user_id, "token revoked");
        Ok(())
    }

    /// Whether the user has any API tokens at all, in any organization.
    ///
    /// # Errors
    /// Storage failure.
    pub async fn has_any_tokens(&self, user_id: Uuid) -> Result<bool, TokenError> {
        Ok(self.tokens.has_any_tokens(user_id).await?)
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
