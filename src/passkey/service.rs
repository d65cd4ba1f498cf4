//! WebAuthn ceremony orchestration.
//!
//! Flow overview:
//! 1) Issue options with a signed, self-contained challenge.
//! 2) The browser completes the ceremony and echoes the challenge back
//!    inside `clientDataJSON`.
//! 3) Validate the original challenge string (MAC, purpose, TTL), compare
//!    the echo, then hand the response to the ceremony verifier.
//! 4) Persist the credential (registration) or advance its signature
//!    counter and last-used stamp (authentication).
//!
//! The echoed-challenge comparison tolerates several encodings because
//! authenticator and browser implementations disagree on how the challenge
//! travels through `clientDataJSON`. The tolerance applies only to the
//! echo: the MAC is always validated against the exact challenge string
//! this service emitted.

use super::models::{
    AuthenticatedPasskey, AuthenticationOptions, AuthenticationResponse, CredentialDescriptor,
    PasskeyCredential, RegistrationOptions, RegistrationResponse, RelyingParty, UserEntity,
};
use super::verifier::CeremonyVerifier;
use crate::challenge::{ChallengeError, ChallengeManager, ChallengePurpose};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::store::{PasskeyCredentialStore, StoreError, UserStore};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Ceremony timeout advertised to the browser, in milliseconds.
const CEREMONY_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum PasskeyError {
    #[error("user not found")]
    UserNotFound,
    #[error("credential not found")]
    CredentialNotFound,
    #[error("credential belongs to a different user")]
    CredentialOwnershipError,
    #[error("cannot delete the last passkey")]
    CannotDeleteLastPasskey,
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl PasskeyError {
    /// Stable discriminator for the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::CredentialOwnershipError => "CREDENTIAL_OWNERSHIP_ERROR",
            Self::CannotDeleteLastPasskey => "CANNOT_DELETE_LAST_PASSKEY",
            Self::VerificationFailed(_) => "VERIFICATION_FAILED",
            Self::Challenge(err) => err.code(),
            Self::Storage(_) => "PASSKEY_STORAGE_ERROR",
        }
    }
}

/// Registration options request for a user who does not exist yet.
/// `identifier` is a provisional handle bound into the challenge in place
/// of a user id; verification later must pass `skip_user_id_check`.
#[derive(Debug, Clone)]
pub struct SignupRegistration {
    pub email: String,
    pub identifier: String,
}

#[derive(Debug, Clone)]
pub struct RegistrationVerification {
    pub user_id: Uuid,
    pub challenge: String,
    pub response: RegistrationResponse,
    pub credential_name: Option<String>,
    pub skip_user_id_check: bool,
}

#[derive(Debug, Clone)]
pub struct AuthenticationVerification {
    pub challenge: String,
    pub response: AuthenticationResponse,
}

#[derive(Debug, Clone)]
pub struct CredentialDeletion {
    pub credential_id: String,
    pub user_id: Uuid,
}

pub struct PasskeyService {
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn PasskeyCredentialStore>,
    challenges: Arc<ChallengeManager>,
    verifier: Arc<dyn CeremonyVerifier>,
    clock: Arc<dyn Clock>,
    rp_id: String,
    rp_name: String,
    rp_origin: String,
}

impl PasskeyService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn PasskeyCredentialStore>,
        challenges: Arc<ChallengeManager>,
        verifier: Arc<dyn CeremonyVerifier>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            credentials,
            challenges,
            verifier,
            clock,
            rp_id: config.rp_id().to_string(),
            rp_name: config.rp_name().to_string(),
            rp_origin: config.rp_origin().to_string(),
        }
    }

    /// Registration options for an existing user. The user's registered
    /// credential ids are excluded so the same authenticator cannot be
    /// enrolled twice.
    ///
    /// # Errors
    /// `UserNotFound`, challenge generation failure, or storage failure.
    pub async fn generate_registration_options(
        &self,
        user_id: Uuid,
    ) -> Result<RegistrationOptions, PasskeyError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(PasskeyError::UserNotFound)?;
        let existing = self.credentials.find_by_user(user_id).await?;
        let challenge = self
            .challenges
            .generate_registration_challenge(&user_id.to_string())?;

        Ok(RegistrationOptions {
            challenge,
            rp: RelyingParty {
                id: self.rp_id.clone(),
                name: self.rp_name.clone(),
            },
            user: UserEntity {
                id: user_id.to_string(),
                name: user.email.clone(),
                display_name: user.email,
            },
            exclude_credentials: existing
                .into_iter()
                .map(|c| CredentialDescriptor::public_key(c.id, c.transports))
                .collect(),
            timeout: CEREMONY_TIMEOUT_MS,
            attestation: "none".to_string(),
        })
    }

    /// Registration options for pre-account signup. No user row exists yet,
    /// so nothing is excluded and the provisional identifier rides in the
    /// challenge.
    ///
    /// # Errors
    /// Challenge generation failure.
    pub fn generate_signup_registration_options(
        &self,
        signup: SignupRegistration,
    ) -> Result<RegistrationOptions, PasskeyError> {
        let challenge = self
            .challenges
            .generate_registration_challenge(&signup.identifier)?;
        Ok(RegistrationOptions {
            challenge,
            rp: RelyingParty {
                id: self.rp_id.clone(),
                name: self.rp_name.clone(),
            },
            user: UserEntity {
                id: signup.identifier,
                name: signup.email.clone(),
                display_name: signup.email,
            },
            exclude_credentials: Vec::new(),
            timeout: CEREMONY_TIMEOUT_MS,
            attestation: "none".to_string(),
        })
    }

    /// Verify a registration ceremony and persist the new credential.
    ///
    /// # Errors
    /// Challenge errors, `VerificationFailed` (user binding, echo mismatch,
    /// or verifier rejection), or storage failure.
    pub async fn verify_registration(
        &self,
        verification: RegistrationVerification,
    ) -> Result<PasskeyCredential, PasskeyError> {
        let payload = self
            .challenges
            .validate(&verification.challenge, ChallengePurpose::Registration)?;

        if !verification.skip_user_id_check
            && payload.user_id.as_deref() != Some(verification.user_id.to_string().as_str())
        {
            warn!(user_id = %verification.user_id, "registration challenge bound to another user");
            return Err(PasskeyError::VerificationFailed(
                "challenge was issued for a different user".to_string(),
            ));
        }
        if !challenge_echo_matches(
            &verification.response.client_data.challenge,
            &verification.challenge,
        ) {
            return Err(PasskeyError::VerificationFailed(
                "client data echoes a different challenge".to_string(),
            ));
        }

        let verified = self
            .verifier
            .verify_registration(&verification.response, &self.rp_origin, &self.rp_id)
            .map_err(|err| PasskeyError::VerificationFailed(err.0))?;

        let credential = PasskeyCredential {
            id: verified.credential_id,
            user_id: verification.user_id,
            public_key: verified.public_key,
            counter: verified.counter,
            transports: verification.response.transports.clone(),
            device_type: verified.device_type,
            backed_up: verified.backed_up,
            name: verification.credential_name,
            created_at: self.clock.now(),
            last_used_at: None,
        };
        self.credentials.save(&credential).await?;
        debug!(user_id = %credential.user_id, "passkey registered");
        Ok(credential)
    }

    /// Authentication options. With a user id the allow-list is restricted
    /// to that user's credentials; without one the challenge is for
    /// discoverable credentials and carries no allow-list.
    ///
    /// # Errors
    /// `UserNotFound` when the given user has zero credentials, challenge
    /// generation failure, or storage failure.
    pub async fn generate_authentication_options(
        &self,
        user_id: Option<Uuid>,
    ) -> Result<AuthenticationOptions, PasskeyError> {
        let allow_credentials = match user_id {
            Some(user_id) => {
                let credentials = self.credentials.find_by_user(user_id).await?;
                if credentials.is_empty() {
                    return Err(PasskeyError::UserNotFound);
                }
                Some(
                    credentials
                        .into_iter()
                        .map(|c| CredentialDescriptor::public_key(c.id, c.transports))
                        .collect(),
                )
            }
            None => None,
        };

        let challenge = self
            .challenges
            .generate_authentication_challenge(user_id.map(|id| id.to_string()).as_deref())?;
        Ok(AuthenticationOptions {
            challenge,
            rp_id: self.rp_id.clone(),
            allow_credentials,
            timeout: CEREMONY_TIMEOUT_MS,
            user_verification: "preferred".to_string(),
        })
    }

    /// Verify an authentication ceremony; on success the credential's
    /// signature counter advances and its last-used stamp is set.
    ///
    /// # Errors
    /// Challenge errors, `CredentialNotFound`, `VerificationFailed`, or
    /// storage failure.
    pub async fn verify_authentication(
        &self,
        verification: AuthenticationVerification,
    ) -> Result<AuthenticatedPasskey, PasskeyError> {
        let payload = self
            .challenges
            .validate(&verification.challenge, ChallengePurpose::Authentication)?;
        if !challenge_echo_matches(
            &verification.response.client_data.challenge,
            &verification.challenge,
        ) {
            return Err(PasskeyError::VerificationFailed(
                "client data echoes a different challenge".to_string(),
            ));
        }

        let credential = self
            .credentials
            .find_by_id(&verification.response.id)
            .await?
            .ok_or(PasskeyError::CredentialNotFound)?;

        // A user-bound challenge must be answered by that user's credential.
        if let Some(bound_user) = payload.user_id.as_deref() {
            if bound_user != credential.user_id.to_string() {
                return Err(PasskeyError::VerificationFailed(
                    "credential does not belong to the challenged user".to_string(),
                ));
            }
        }

        let verified = self
            .verifier
            .verify_authentication(
                &verification.response,
                &credential.public_key,
                credential.counter,
                &self.rp_origin,
                &self.rp_id,
            )
            .map_err(|err| PasskeyError::VerificationFailed(err.0))?;

        self.credentials
            .update_counter(&credential.id, verified.new_counter)
            .await?;
        self.credentials
            .update_last_used(&credential.id, self.clock.now())
            .await?;
        debug!(user_id = %credential.user_id, "passkey authenticated");

        Ok(AuthenticatedPasskey {
            user_id: credential.user_id,
            credential_id: credential.id,
        })
    }

    /// # Errors
    /// Storage failure.
    pub async fn list_credentials(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        Ok(self.credentials.find_by_user(user_id).await?)
    }

    /// Delete one of the user's credentials. A user can never delete their
    /// last passkey through this path; losing all passkeys means losing the
    /// account.
    ///
    /// # Errors
    /// `CredentialNotFound`, `CredentialOwnershipError`,
    /// `CannotDeleteLastPasskey`, or storage failure.
    pub async fn delete_credential_for_user(
        &self,
        deletion: CredentialDeletion,
    ) -> Result<(), PasskeyError> {
        let credential = self
            .credentials
            .find_by_id(&deletion.credential_id)
            .await?
            .ok_or(PasskeyError::CredentialNotFound)?;
        if credential.user_id != deletion.user_id {
            return Err(PasskeyError::CredentialOwnershipError);
        }
        let owned = self.credentials.find_by_user(deletion.user_id).await?;
        if owned.len() <= 1 {
            return Err(PasskeyError::CannotDeleteLastPasskey);
        }
        self.credentials.delete(&deletion.credential_id).await?;
        debug!(user_id = %deletion.user_id, "passkey deleted");
        Ok(())
    }
}

/// Echo-comparison interoperability shim: accepts the raw challenge string
/// or any common base64 rendering of its bytes. This never widens MAC
/// validation, which runs on the exact emitted string.
fn challenge_echo_matches(echoed: &str, original: &str) -> bool {
    if echoed == original {
        return true;
    }
    let original_bytes = original.as_bytes();
    for engine in [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD_NO_PAD, &STANDARD] {
        if let Ok(decoded) = engine.decode(echoed) {
            if decoded == original_bytes {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::challenge_echo_matches;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;

    const ORIGINAL: &str = "abc123_-XYZ";

    #[test]
    fn raw_echo_matches() {
        assert!(challenge_echo_matches(ORIGINAL, ORIGINAL));
    }

    #[test]
    fn base64url_encoded_echo_matches() {
        let echoed = URL_SAFE_NO_PAD.encode(ORIGINAL.as_bytes());
        assert!(challenge_echo_matches(&echoed, ORIGINAL));
    }

    #[test]
    fn standard_base64_encoded_echo_matches() {
        let echoed = STANDARD.encode(ORIGINAL.as_bytes());
        assert!(challenge_echo_matches(&echoed, ORIGINAL));
    }

    #[test]
    fn different_challenge_does_not_match() {
        assert!(!challenge_echo_matches("something-else", ORIGINAL));
        let echoed = URL_SAFE_NO_PAD.encode(b"something-else");
        assert!(!challenge_echo_matches(&echoed, ORIGINAL));
    }
}
