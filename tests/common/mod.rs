//! Shared fixtures for the integration suites: deterministic clock and
//! generators, in-memory stores, and seeded tenants.

use captura_iam::clock::{Clock, FixedClock};
use captura_iam::ids::{CodeGenerator, IdGenerator};
use captura_iam::models::{Organization, User};
use captura_iam::store::memory::{
    MemoryInvitationStore, MemoryMembershipStore, MemoryOrganizationStore,
    MemoryPasskeyCredentialStore, MemoryTokenStore, MemoryUserStore,
};
use captura_iam::store::{OrganizationStore, UserStore};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(start_instant()))
}

/// Sequential UUIDs so test failures print stable ids.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU32,
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> Uuid {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        Uuid::from_u128(u128::from(n))
    }
}

/// Sequential invitation codes (`CODE-0001`, `CODE-0002`, ...).
#[derive(Debug, Default)]
pub struct SequentialCodes {
    next: AtomicU32,
}

impl CodeGenerator for SequentialCodes {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("CODE-{n:04}")
    }
}

pub struct Stores {
    pub organizations: Arc<MemoryOrganizationStore>,
    pub users: Arc<MemoryUserStore>,
    pub memberships: Arc<MemoryMembershipStore>,
    pub invitations: Arc<MemoryInvitationStore>,
    pub tokens: Arc<MemoryTokenStore>,
    pub credentials: Arc<MemoryPasskeyCredentialStore>,
}

impl Stores {
    pub fn new() -> Self {
        Self {
            organizations: Arc::new(MemoryOrganizationStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            memberships: Arc::new(MemoryMembershipStore::new()),
            invitations: Arc::new(MemoryInvitationStore::new()),
            tokens: Arc::new(MemoryTokenStore::new()),
            credentials: Arc::new(MemoryPasskeyCredentialStore::new()),
        }
    }

    pub async fn seed_user(&self, clock: &dyn Clock, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: clock.now(),
        };
        self.users.save(&user).await.expect("seed user");
        user
    }

    pub async fn seed_organization(&self, clock: &dyn Clock, name: &str) -> Organization {
        let organization = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: clock.now(),
        };
        self.organizations
            .save(&organization)
            .await
            .expect("seed organization");
        organization
    }
}
