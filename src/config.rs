//! Core configuration with environment overrides and safe defaults.

const DEFAULT_MAX_TOKENS_PER_USER_PER_ORG: usize = 10;
const DEFAULT_INVITATION_EXPIRY_DAYS: i64 = 7;
const DEFAULT_CHALLENGE_TTL_SECONDS: i64 = 300;
const DEFAULT_RP_NAME: &str = "Captura";

const ENV_MAX_TOKENS: &str = "CAPTURA_IAM_MAX_TOKENS_PER_USER_PER_ORG";
const ENV_INVITATION_EXPIRY_DAYS: &str = "CAPTURA_IAM_INVITATION_EXPIRY_DAYS";
const ENV_CHALLENGE_TTL_SECONDS: &str = "CAPTURA_IAM_CHALLENGE_TTL_SECONDS";
const ENV_RP_ID: &str = "CAPTURA_IAM_RP_ID";
const ENV_RP_NAME: &str = "CAPTURA_IAM_RP_NAME";
const ENV_RP_ORIGIN: &str = "CAPTURA_IAM_RP_ORIGIN";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    max_tokens_per_user_per_org: usize,
    invitation_expiry_days: i64,
    challenge_ttl_seconds: i64,
    rp_id: String,
    rp_name: String,
    rp_origin: String,
}

impl AuthConfig {
    /// Create a configuration with defaults for everything except the
    /// relying-party binding, which is deployment specific.
    #[must_use]
    pub fn new(rp_id: impl Into<String>, rp_origin: impl Into<String>) -> Self {
        Self {
            max_tokens_per_user_per_org: DEFAULT_MAX_TOKENS_PER_USER_PER_ORG,
            invitation_expiry_days: DEFAULT_INVITATION_EXPIRY_DAYS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            rp_id: rp_id.into(),
            rp_name: DEFAULT_RP_NAME.to_string(),
            rp_origin: rp_origin.into(),
        }
    }

    /// Build from environment with the given fallbacks.
    #[must_use]
    pub fn from_env(rp_id: &str, rp_origin: &str) -> Self {
        let mut config = Self::new(
            env_string(ENV_RP_ID).unwrap_or_else(|| rp_id.to_string()),
            env_string(ENV_RP_ORIGIN).unwrap_or_else(|| rp_origin.to_string()),
        );
        if let Some(name) = env_string(ENV_RP_NAME) {
            config.rp_name = name;
        }
        if let Some(max) = env_parse::<usize>(ENV_MAX_TOKENS).filter(|max| *max > 0) {
            config.max_tokens_per_user_per_org = max;
        }
        if let Some(days) = env_parse::<i64>(ENV_INVITATION_EXPIRY_DAYS).filter(|days| *days > 0) {
            config.invitation_expiry_days = days;
        }
        if let Some(ttl) = env_parse::<i64>(ENV_CHALLENGE_TTL_SECONDS).filter(|ttl| *ttl > 0) {
            config.challenge_ttl_seconds = ttl;
        }
        config
    }

    #[must_use]
    pub fn with_max_tokens_per_user_per_org(mut self, max: usize) -> Self {
        self.max_tokens_per_user_per_org = max;
        self
    }

    #[must_use]
    pub fn with_invitation_expiry_days(mut self, days: i64) -> Self {
        self.invitation_expiry_days = days;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: i64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rp_name(mut self, name: impl Into<String>) -> Self {
        self.rp_name = name.into();
        self
    }

    #[must_use]
    pub fn max_tokens_per_user_per_org(&self) -> usize {
        self.max_tokens_per_user_per_org
    }

    #[must_use]
    pub fn invitation_expiry_days(&self) -> i64 {
        self.invitation_expiry_days
    }

    #[must_use]
    pub fn challenge_ttl_seconds(&self) -> i64 {
        self.challenge_ttl_seconds
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    #[must_use]
    pub fn rp_name(&self) -> &str {
        &self.rp_name
    }

    #[must_use]
    pub fn rp_origin(&self) -> &str {
        &self.rp_origin
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|value| value.parse().ok())
}
