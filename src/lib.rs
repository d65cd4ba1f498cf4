//! # captura-iam (Authorization & Credential Core)
//!
//! `captura-iam` is the authorization and credential core of the Captura
//! capture/task platform. It decides who may act on behalf of whom, issues
//! and validates long-lived and short-lived credentials, and mediates
//! organization membership changes.
//!
//! ## Tenant Model (Organizations & Memberships)
//!
//! Organizations are the tenant boundary. Access inside one is controlled
//! by a three-level role hierarchy (`owner > admin > member`):
//!
//! - **Personal organizations** are auto-created at signup; their sole
//!   membership cannot be left and the owner role cannot be reassigned.
//! - **Last-admin protection:** an organization can never be left without
//!   at least one `admin` or `owner`.
//! - **Invitations** are single-use, time-boxed codes; accepting one is
//!   terminal and deliberately separate from membership creation so signup
//!   flows can create the user first.
//!
//! ## Credentials
//!
//! - **API tokens** are opaque `id:secret` strings; only an argon2 digest
//!   of the secret is stored, and validation performs exactly one hash
//!   comparison whether or not the id exists (no token-enumeration timing
//!   oracle).
//! - **Passkeys** (WebAuthn) are managed through stateless, HMAC-signed,
//!   time-boxed challenges; attestation/assertion cryptography is delegated
//!   to an external ceremony verifier behind a port.
//!
//! ## Architecture
//!
//! The domain layer holds no shared mutable state: persistence sits behind
//! async store ports (Postgres and in-memory adapters ship in
//! [`store`]), and time, id generation, code generation, and secret hashing
//! are constructor-injected capabilities so tests run with deterministic
//! fakes. Every public operation returns a typed success value or a typed
//! error with a stable `code()` discriminator; an HTTP layer maps those
//! 1:1 onto routes and status codes.

pub mod challenge;
pub mod clock;
pub mod config;
pub mod ids;
pub mod invitation;
pub mod membership;
pub mod models;
pub mod passkey;
pub mod password;
pub mod store;
pub mod token;

pub use config::AuthConfig;
