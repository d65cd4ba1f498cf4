//! Ceremony verification port.
//!
//! The cryptographic checks over attestation and assertion objects
//! (signature verification, origin and RP ID binding, counter regression)
//! are an external collaborator; a production adapter wraps a WebAuthn
//! library. This core only consumes the verified summary.

use super::models::{AuthenticationResponse, DeviceType, RegistrationResponse};
use thiserror::Error;

/// Reason-preserving failure from the external verifier. Callers see it
/// collapsed into a single `VERIFICATION_FAILED`; the reason stays for
/// operator-side diagnostics.
#[derive(Debug, Error)]
#[error("ceremony verification failed: {0}")]
pub struct CeremonyError(pub String);

/// Summary of a cryptographically verified registration.
#[derive(Debug, Clone)]
pub struct VerifiedRegistration {
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub device_type: DeviceType,
    pub backed_up: bool,
}

/// Summary of a cryptographically verified assertion.
#[derive(Debug, Clone)]
pub struct VerifiedAuthentication {
    pub new_counter: u32,
}

/// Verification is CPU-bound and does no I/O, so the port is synchronous
/// and may run inline in a request handler.
pub trait CeremonyVerifier: Send + Sync {
    /// # Errors
    /// Any cryptographic or structural failure in the attestation object.
    fn verify_registration(
        &self,
        response: &RegistrationResponse,
        expected_origin: &str,
        expected_rp_id: &str,
    ) -> Result<VerifiedRegistration, CeremonyError>;

    /// # Errors
    /// Any cryptographic or structural failure in the assertion, including
    /// a signature-counter regression for `stored_counter`.
    fn verify_authentication(
        &self,
        response: &AuthenticationResponse,
        stored_public_key: &[u8],
        stored_counter: u32,
        expected_origin: &str,
        expected_rp_id: &str,
    ) -> Result<VerifiedAuthentication, CeremonyError>;
}
