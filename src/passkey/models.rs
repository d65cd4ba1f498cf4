//! Passkey credential model and ceremony DTOs.
//!
//! The DTO field names follow the WebAuthn wire format (camelCase) because
//! these structures are handed to and received from the browser unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Whether the credential is bound to one authenticator or synced across
/// devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "singleDevice")]
    SingleDevice,
    #[serde(rename = "multiDevice")]
    MultiDevice,
}

impl DeviceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleDevice => "singleDevice",
            Self::MultiDevice => "multiDevice",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown device type: {0}")]
pub struct DeviceTypeParseError(String);

impl FromStr for DeviceType {
    type Err = DeviceTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "singleDevice" => Ok(Self::SingleDevice),
            "multiDevice" => Ok(Self::MultiDevice),
            other => Err(DeviceTypeParseError(other.to_string())),
        }
    }
}

/// A registered WebAuthn credential. `id` is the authenticator's credential
/// id as base64url text; `counter` is the monotonic signature counter used
/// for clone detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeyCredential {
    pub id: String,
    pub user_id: Uuid,
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub transports: Option<Vec<String>>,
    pub device_type: DeviceType,
    pub backed_up: bool,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for PasskeyCredential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let counter: i64 = row.try_get("counter")?;
        let device_type: String = row.try_get("device_type")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            public_key: row.try_get("public_key")?,
            counter: u32::try_from(counter).map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            transports: row.try_get("transports")?,
            device_type: device_type
                .parse()
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            backed_up: row.try_get("backed_up")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// Reference to an existing credential in exclude/allow lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

impl CredentialDescriptor {
    #[must_use]
    pub fn public_key(id: String, transports: Option<Vec<String>>) -> Self {
        Self {
            id,
            credential_type: "public-key".to_string(),
            transports,
        }
    }
}

/// Options handed to `navigator.credentials.create()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub challenge: String,
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub timeout: u64,
    pub attestation: String,
}

/// Options handed to `navigator.credentials.get()`. `allow_credentials` is
/// absent for discoverable-credential flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub challenge: String,
    pub rp_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Vec<CredentialDescriptor>>,
    pub timeout: u64,
    pub user_verification: String,
}

/// Parsed `clientDataJSON` fields this core inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientData {
    #[serde(rename = "type")]
    pub ceremony_type: String,
    pub challenge: String,
    pub origin: String,
}

/// Authenticator response to a registration ceremony. The attestation
/// object stays opaque here; decoding it is the ceremony verifier's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub client_data: ClientData,
    pub attestation_object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
}

/// Authenticator response to an authentication ceremony.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub id: String,
    pub client_data: ClientData,
    pub authenticator_data: String,
    pub signature: String,
}

/// Output of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPasskey {
    pub user_id: Uuid,
    pub credential_id: String,
}
