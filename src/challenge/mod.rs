//! Stateless, signed, time-boxed challenges for WebAuthn ceremonies.
//!
//! A challenge is `base64url(random(32) ‖ len_be(4) ‖ payload ‖ mac)` where
//! `payload` is JSON `{purpose, userId?, expiresAt}` and
//! `mac = HMAC-SHA256(random ‖ payload, secret)`. The MAC is the only
//! storage: nothing is kept server-side, which keeps horizontally scaled
//! deployments free of a challenge table and its cleanup. The tradeoff is
//! that a challenge cannot be invalidated early and reuse within the TTL is
//! not detectable here; the short TTL (5 minutes by default) bounds both.
//!
//! MAC comparison is constant time so a forger learns nothing from how far
//! a guess got.

use crate::clock::Clock;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const RANDOM_LEN: usize = 32;
const LEN_PREFIX_LEN: usize = 4;
const MAC_LEN: usize = 32;
/// Smallest well-formed blob: random + length prefix + one payload byte + MAC.
const MIN_BLOB_LEN: usize = RANDOM_LEN + LEN_PREFIX_LEN + 1 + MAC_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("challenge is malformed or does not match the expected purpose")]
    Invalid,
    #[error("challenge signature mismatch")]
    Tampered,
    #[error("challenge expired")]
    Expired,
}

impl ChallengeError {
    /// Stable discriminator for the HTTP layer.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid => "CHALLENGE_INVALID",
            Self::Tampered => "CHALLENGE_TAMPERED",
            Self::Expired => "CHALLENGE_EXPIRED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengePurpose {
    Registration,
    Authentication,
}

impl ChallengePurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

/// Signed challenge contents. `user_id` is free-form text so pre-account
/// signup flows can bind a provisional identifier instead of a user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    pub purpose: ChallengePurpose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

pub struct ChallengeManager {
    secret: SecretString,
    clock: Arc<dyn Clock>,
    ttl_seconds: i64,
}

impl ChallengeManager {
    #[must_use]
    pub fn new(secret: SecretString, clock: Arc<dyn Clock>, ttl_seconds: i64) -> Self {
        Self {
            secret,
            clock,
            ttl_seconds,
        }
    }

    /// # Errors
    /// Returns `Invalid` if payload encoding fails.
    pub fn generate_registration_challenge(&self, user_id: &str) -> Result<String, ChallengeError> {
        self.generate(ChallengePurpose::Registration, Some(user_id))
    }

    /// `user_id` is absent for discoverable-credential flows.
    ///
    /// # Errors
    /// Returns `Invalid` if payload encoding fails.
    pub fn generate_authentication_challenge(
        &self,
        user_id: Option<&str>,
    ) -> Result<String, ChallengeError> {
        self.generate(ChallengePurpose::Authentication, user_id)
    }

    fn generate(
        &self,
        purpose: ChallengePurpose,
        user_id: Option<&str>,
    ) -> Result<String, ChallengeError> {
        let payload = ChallengePayload {
            purpose,
            user_id: user_id.map(str::to_string),
            expires_at: (self.clock.now() + chrono::Duration::seconds(self.ttl_seconds))
                .timestamp_millis(),
        };
        let payload_bytes = serde_json::to_vec(&payload).map_err(|_| ChallengeError::Invalid)?;
        let payload_len =
            u32::try_from(payload_bytes.len()).map_err(|_| ChallengeError::Invalid)?;

        let mut random = [0u8; RANDOM_LEN];
        OsRng.fill_bytes(&mut random);

        let mac = self.compute_mac(&random, &payload_bytes)?;

        let mut blob =
            Vec::with_capacity(RANDOM_LEN + LEN_PREFIX_LEN + payload_bytes.len() + MAC_LEN);
        blob.extend_from_slice(&random);
        blob.extend_from_slice(&payload_len.to_be_bytes());
        blob.extend_from_slice(&payload_bytes);
        blob.extend_from_slice(&mac);
        Ok(URL_SAFE_NO_PAD.encode(blob))
    }

    /// Decode and authenticate a challenge, then check purpose and TTL.
    ///
    /// # Errors
    /// `Invalid` for malformed blobs or a purpose mismatch, `Tampered` for a
    /// MAC mismatch, `Expired` once the embedded deadline has passed.
    pub fn validate(
        &self,
        challenge: &str,
        expected_purpose: ChallengePurpose,
    ) -> Result<ChallengePayload, ChallengeError> {
        let blob = URL_SAFE_NO_PAD
            .decode(challenge)
            .map_err(|_| ChallengeError::Invalid)?;
        if blob.len() < MIN_BLOB_LEN {
            return Err(ChallengeError::Invalid);
        }

        let random = &blob[..RANDOM_LEN];
        let len_bytes: [u8; LEN_PREFIX_LEN] = blob[RANDOM_LEN..RANDOM_LEN + LEN_PREFIX_LEN]
            .try_into()
            .map_err(|_| ChallengeError::Invalid)?;
        let payload_len = u32::from_be_bytes(len_bytes) as usize;
        let payload_end = RANDOM_LEN + LEN_PREFIX_LEN + payload_len;
        if payload_end + MAC_LEN != blob.len() {
            return Err(ChallengeError::Invalid);
        }
        let payload_bytes = &blob[RANDOM_LEN + LEN_PREFIX_LEN..payload_end];
        let mac = &blob[payload_end..];

        let expected_mac = self.compute_mac(random, payload_bytes)?;
        if mac.ct_eq(expected_mac.as_slice()).unwrap_u8() == 0 {
            return Err(ChallengeError::Tampered);
        }

        let payload: ChallengePayload =
            serde_json::from_slice(payload_bytes).map_err(|_| ChallengeError::Invalid)?;
        if payload.purpose != expected_purpose {
            return Err(ChallengeError::Invalid);
        }
        if self.clock.now().timestamp_millis() >= payload.expires_at {
            return Err(ChallengeError::Expired);
        }
        Ok(payload)
    }

    fn compute_mac(&self, random: &[u8], payload: &[u8]) -> Result<[u8; MAC_LEN], ChallengeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| ChallengeError::Invalid)?;
        mac.update(random);
        mac.update(payload);
        Ok(mac.finalize().into_bytes().into())
    }
}
