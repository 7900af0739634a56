//! Security configuration: secrets and sensitive-action rate limits.

use serde::Deserialize;

/// Security configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Secret key for HMAC-signed step-up tokens.
    /// MUST be kept private and should be at least 32 characters.
    #[serde(default)]
    pub step_up_secret: String,
    /// Step-up token lifetime in seconds.
    #[serde(default = "default_step_up_ttl")]
    pub step_up_ttl_secs: u64,
    /// Pre-shared token the game-server consumer presents on the
    /// notification channel (`AUTH <token>` first frame). The server
    /// refuses to start when this is empty or known-weak.
    #[serde(default)]
    pub consumer_token: String,
    /// Rate limiting configuration for sensitive endpoints.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            step_up_secret: String::new(),
            step_up_ttl_secs: default_step_up_ttl(),
            consumer_token: String::new(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

fn default_step_up_ttl() -> u64 {
    3600
}

/// Placeholder values shipped in example configs. Refusing these at startup
/// prevents accidentally running production with forgeable step-up tokens.
const WEAK_SECRETS: &[&str] = &["", "changeme", "secret", "step-up-secret"];

impl SecurityConfig {
    /// Whether the configured step-up secret is unusable for production.
    pub fn step_up_secret_is_weak(&self) -> bool {
        self.step_up_secret.len() < 32
            || WEAK_SECRETS.contains(&self.step_up_secret.to_lowercase().as_str())
    }

    /// Whether the consumer channel token is unusable for production.
    pub fn consumer_token_is_weak(&self) -> bool {
        self.consumer_token.len() < 16
            || WEAK_SECRETS.contains(&self.consumer_token.to_lowercase().as_str())
    }
}

/// Sensitive-action rate limiting.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained sensitive actions allowed per minute, per identity.
    #[serde(default = "default_actions_per_minute")]
    pub sensitive_per_minute: u32,
    /// Burst allowance on top of the sustained rate.
    #[serde(default = "default_burst")]
    pub sensitive_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sensitive_per_minute: default_actions_per_minute(),
            sensitive_burst: default_burst(),
        }
    }
}

fn default_actions_per_minute() -> u32 {
    30
}

fn default_burst() -> u32 {
    10
}
