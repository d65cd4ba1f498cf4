//! Passkey ceremony integration suite.
//!
//! The challenge plumbing is real (signed, stateless); the cryptographic
//! ceremony verifier is a fake that trusts the response shape, so the
//! tests exercise orchestration, binding checks, and persistence.

mod common;

use anyhow::Result;
use captura_iam::challenge::{ChallengeError, ChallengeManager};
use captura_iam::clock::{Clock, FixedClock};
use captura_iam::config::AuthConfig;
use captura_iam::passkey::{
    AuthenticationResponse, AuthenticationVerification, CeremonyError, CeremonyVerifier,
    ClientData, CredentialDeletion, DeviceType, PasskeyError, PasskeyService,
    RegistrationResponse, RegistrationVerification, SignupRegistration, VerifiedAuthentication,
    VerifiedRegistration,
};
use chrono::Duration;
use common::{fixed_clock, Stores};
use secrecy::SecretString;
use std::sync::Arc;
use uuid::Uuid;

const RP_ID: &str = "captura.test";
const RP_ORIGIN: &str = "https://captura.test";
const CHALLENGE_TTL_SECONDS: i64 = 300;

/// Accepts any response whose client data targets our origin, echoing the
/// response id back as the credential id. Authentication advances the
/// stored counter by one.
struct FakeVerifier;

impl CeremonyVerifier for FakeVerifier {
    fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected_origin: &str,
        _expected_rp_id: &str,
    ) -> Result<VerifiedRegistration, CeremonyError> {
        if response.client_data.origin != expected_origin {
            return Err(CeremonyError("origin mismatch".to_string()));
        }
        Ok(VerifiedRegistration {
            credential_id: response.id.clone(),
            public_key: vec![1, 2, 3, 4],
            counter: 0,
            device_type: DeviceType::MultiDevice,
            backed_up: true,
        })
    }

    fn verify_authentication(
        &self,
        response: &AuthenticationResponse,
        _stored_public_key: &[u8],
        stored_counter: u32,
        expected_origin: &str,
        _expected_rp_id: &str,
    ) -> Result<VerifiedAuthentication, CeremonyError> {
        if response.client_data.origin != expected_origin {
            return Err(CeremonyError("origin mismatch".to_string()));
        }
        Ok(VerifiedAuthentication {
            new_counter: stored_counter + 1,
        })
    }
}

fn service(stores: &Stores, clock: Arc<FixedClock>) -> PasskeyService {
    let config = AuthConfig::new(RP_ID, RP_ORIGIN)
        .with_challenge_ttl_seconds(CHALLENGE_TTL_SECONDS);
    let challenges = Arc::new(ChallengeManager::new(
        SecretString::from("integration signing secret"),
        clock.clone(),
        config.challenge_ttl_seconds(),
    ));
    PasskeyService::new(
        stores.users.clone(),
        stores.credentials.clone(),
        challenges,
        Arc::new(FakeVerifier),
        clock,
        &config,
    )
}

fn registration_response(challenge: &str, credential_id: &str) -> RegistrationResponse {
    RegistrationResponse {
        id: credential_id.to_string(),
        client_data: ClientData {
            ceremony_type: "webauthn.create".to_string(),
            challenge: challenge.to_string(),
            origin: RP_ORIGIN.to_string(),
        },
        attestation_object: "o2NmbXQ".to_string(),
        transports: Some(vec!["internal".to_string()]),
    }
}

fn authentication_response(challenge: &str, credential_id: &str) -> AuthenticationResponse {
    AuthenticationResponse {
        id: credential_id.to_string(),
        client_data: ClientData {
            ceremony_type: "webauthn.get".to_string(),
            challenge: challenge.to_string(),
            origin: RP_ORIGIN.to_string(),
        },
        authenticator_data: "SZYN5Q".to_string(),
        signature: "MEUCIQ".to_string(),
    }
}

async fn register(
    passkeys: &PasskeyService,
    user_id: Uuid,
    credential_id: &str,
) -> Result<(), PasskeyError> {
    let options = passkeys.generate_registration_options(user_id).await?;
    passkeys
        .verify_registration(RegistrationVerification {
            user_id,
            challenge: options.challenge.clone(),
            response: registration_response(&options.challenge, credential_id),
            credential_name: None,
            skip_user_id_check: false,
        })
        .await?;
    Ok(())
}

#[tokio::test]
async fn registration_options_require_a_user_and_exclude_existing_credentials() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());

    let err = passkeys
        .generate_registration_options(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::UserNotFound));

    let user = stores.seed_user(clock.as_ref(), "dev@acme.dev").await;
    let options = passkeys.generate_registration_options(user.id).await?;
    assert!(options.exclude_credentials.is_empty());
    assert_eq!(options.rp.id, RP_ID);
    assert_eq!(options.user.id, user.id.to_string());

    register(&passkeys, user.id, "cred-1").await?;
    let options = passkeys.generate_registration_options(user.id).await?;
    assert_eq!(options.exclude_credentials.len(), 1);
    assert_eq!(options.exclude_credentials[0].id, "cred-1");
    assert_eq!(options.exclude_credentials[0].credential_type, "public-key");
    Ok(())
}

#[tokio::test]
async fn signup_options_carry_the_provisional_identifier() -> Result<()> {
    let stores = Stores::new();
    let passkeys = service(&stores, fixed_clock());

    let options = passkeys.generate_signup_registration_options(SignupRegistration {
        email: "new@acme.dev".to_string(),
        identifier: "signup-abc123".to_string(),
    })?;
    assert!(options.exclude_credentials.is_empty());
    assert_eq!(options.user.id, "signup-abc123");
    assert_eq!(options.user.name, "new@acme.dev");
    Ok(())
}

#[tokio::test]
async fn verified_registration_is_persisted() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let user = stores.seed_user(clock.as_ref(), "dev@acme.dev").await;

    let options = passkeys.generate_registration_options(user.id).await?;
    let credential = passkeys
        .verify_registration(RegistrationVerification {
            user_id: user.id,
            challenge: options.challenge.clone(),
            response: registration_response(&options.challenge, "cred-1"),
            credential_name: Some("Work laptop".to_string()),
            skip_user_id_check: false,
        })
        .await?;

    assert_eq!(credential.id, "cred-1");
    assert_eq!(credential.user_id, user.id);
    assert_eq!(credential.counter, 0);
    assert_eq!(credential.device_type, DeviceType::MultiDevice);
    assert!(credential.backed_up);
    assert_eq!(credential.name.as_deref(), Some("Work laptop"));
    assert_eq!(credential.created_at, clock.now());
    assert_eq!(credential.last_used_at, None);

    let listed = passkeys.list_credentials(user.id).await?;
    assert_eq!(listed, vec![credential]);
    Ok(())
}

#[tokio::test]
async fn registration_rejects_a_challenge_bound_to_another_user() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let alice = stores.seed_user(clock.as_ref(), "alice@acme.dev").await;
    let mallory = stores.seed_user(clock.as_ref(), "mallory@acme.dev").await;

    let options = passkeys.generate_registration_options(alice.id).await?;
    let err = passkeys
        .verify_registration(RegistrationVerification {
            user_id: mallory.id,
            challenge: options.challenge.clone(),
            response: registration_response(&options.challenge, "cred-1"),
            credential_name: None,
            skip_user_id_check: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::VerificationFailed(_)));
    assert_eq!(err.code(), "VERIFICATION_FAILED");
    Ok(())
}

/// Signup flows bind a provisional identifier into the challenge, so the
/// user-binding check has to be skippable once the real user row exists.
#[tokio::test]
async fn signup_registration_skips_the_user_binding_check() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());

    let options = passkeys.generate_signup_registration_options(SignupRegistration {
        email: "new@acme.dev".to_string(),
        identifier: "signup-abc123".to_string(),
    })?;

    let user = stores.seed_user(clock.as_ref(), "new@acme.dev").await;
    let credential = passkeys
        .verify_registration(RegistrationVerification {
            user_id: user.id,
            challenge: options.challenge.clone(),
            response: registration_response(&options.challenge, "cred-1"),
            credential_name: None,
            skip_user_id_check: true,
        })
        .await?;
    assert_eq!(credential.user_id, user.id);
    Ok(())
}

#[tokio::test]
async fn registration_rejects_a_mismatched_challenge_echo() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let user = stores.seed_user(clock.as_ref(), "dev@acme.dev").await;

    let options = passkeys.generate_registration_options(user.id).await?;
    let mut response = registration_response(&options.challenge, "cred-1");
    response.client_data.challenge = "a-challenge-we-never-issued".to_string();

    let err = passkeys
        .verify_registration(RegistrationVerification {
            user_id: user.id,
            challenge: options.challenge,
            response,
            credential_name: None,
            skip_user_id_check: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::VerificationFailed(_)));
    Ok(())
}

#[tokio::test]
async fn expired_challenges_are_rejected() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let user = stores.seed_user(clock.as_ref(), "dev@acme.dev").await;

    let options = passkeys.generate_registration_options(user.id).await?;
    clock.advance(Duration::seconds(CHALLENGE_TTL_SECONDS));

    let err = passkeys
        .verify_registration(RegistrationVerification {
            user_id: user.id,
            challenge: options.challenge.clone(),
            response: registration_response(&options.challenge, "cred-1"),
            credential_name: None,
            skip_user_id_check: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::Challenge(ChallengeError::Expired)));
    assert_eq!(err.code(), "CHALLENGE_EXPIRED");
    Ok(())
}

#[tokio::test]
async fn authentication_options_restrict_to_the_users_credentials() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let user = stores.seed_user(clock.as_ref(), "dev@acme.dev").await;

    // A user with zero credentials cannot start an allow-listed ceremony.
    let err = passkeys
        .generate_authentication_options(Some(user.id))
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::UserNotFound));

    register(&passkeys, user.id, "cred-1").await?;
    let options = passkeys.generate_authentication_options(Some(user.id)).await?;
    let allowed = options.allow_credentials.as_deref().unwrap_or_default();
    assert_eq!(allowed.len(), 1);
    assert_eq!(allowed[0].id, "cred-1");
    assert_eq!(options.rp_id, RP_ID);
    Ok(())
}

#[tokio::test]
async fn discoverable_authentication_has_no_allow_list() -> Result<()> {
    let stores = Stores::new();
    let passkeys = service(&stores, fixed_clock());
    let options = passkeys.generate_authentication_options(None).await?;
    assert!(options.allow_credentials.is_none());
    Ok(())
}

#[tokio::test]
async fn successful_authentication_advances_the_counter() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let user = stores.seed_user(clock.as_ref(), "dev@acme.dev").await;
    register(&passkeys, user.id, "cred-1").await?;

    let options = passkeys.generate_authentication_options(Some(user.id)).await?;
    clock.advance(Duration::minutes(1));
    let authenticated = passkeys
        .verify_authentication(AuthenticationVerification {
            challenge: options.challenge.clone(),
            response: authentication_response(&options.challenge, "cred-1"),
        })
        .await?;
    assert_eq!(authenticated.user_id, user.id);
    assert_eq!(authenticated.credential_id, "cred-1");

    let listed = passkeys.list_credentials(user.id).await?;
    assert_eq!(listed[0].counter, 1);
    assert_eq!(listed[0].last_used_at, Some(clock.now()));
    Ok(())
}

#[tokio::test]
async fn authentication_rejects_an_unknown_credential() -> Result<()> {
    let stores = Stores::new();
    let passkeys = service(&stores, fixed_clock());

    let options = passkeys.generate_authentication_options(None).await?;
    let err = passkeys
        .verify_authentication(AuthenticationVerification {
            challenge: options.challenge.clone(),
            response: authentication_response(&options.challenge, "no-such-cred"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::CredentialNotFound));
    assert_eq!(err.code(), "CREDENTIAL_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn user_bound_challenges_reject_other_users_credentials() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let alice = stores.seed_user(clock.as_ref(), "alice@acme.dev").await;
    let bob = stores.seed_user(clock.as_ref(), "bob@acme.dev").await;
    register(&passkeys, alice.id, "alice-cred").await?;
    register(&passkeys, bob.id, "bob-cred").await?;

    let options = passkeys.generate_authentication_options(Some(alice.id)).await?;
    let err = passkeys
        .verify_authentication(AuthenticationVerification {
            challenge: options.challenge.clone(),
            response: authentication_response(&options.challenge, "bob-cred"),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::VerificationFailed(_)));
    Ok(())
}

#[tokio::test]
async fn credential_deletion_enforces_ownership_and_keeps_the_last_passkey() -> Result<()> {
    let stores = Stores::new();
    let clock = fixed_clock();
    let passkeys = service(&stores, clock.clone());
    let alice = stores.seed_user(clock.as_ref(), "alice@acme.dev").await;
    let bob = stores.seed_user(clock.as_ref(), "bob@acme.dev").await;
    register(&passkeys, alice.id, "alice-cred-1").await?;

    let err = passkeys
        .delete_credential_for_user(CredentialDeletion {
            credential_id: "no-such-cred".to_string(),
            user_id: alice.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::CredentialNotFound));

    let err = passkeys
        .delete_credential_for_user(CredentialDeletion {
            credential_id: "alice-cred-1".to_string(),
            user_id: bob.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::CredentialOwnershipError));
    assert_eq!(err.code(), "CREDENTIAL_OWNERSHIP_ERROR");

    // The only passkey on the account is not deletable.
    let err = passkeys
        .delete_credential_for_user(CredentialDeletion {
            credential_id: "alice-cred-1".to_string(),
            user_id: alice.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PasskeyError::CannotDeleteLastPasskey));
    assert_eq!(err.code(), "CANNOT_DELETE_LAST_PASSKEY");

    register(&passkeys, alice.id, "alice-cred-2").await?;
    passkeys
        .delete_credential_for_user(CredentialDeletion {
            credential_id: "alice-cred-1".to_string(),
            user_id: alice.id,
        })
        .await?;

    let remaining = passkeys.list_credentials(alice.id).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "alice-cred-2");
    Ok(())
}
