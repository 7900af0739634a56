//! Configuration loading and management.
//!
//! Split into logical submodules:
//! - [`types`]: Core config structs (Config, ServerConfig, DatabaseConfig, LinkConfig)
//! - [`security`]: Security configuration (step-up secret, consumer token, rate limits)
//! - [`policy`]: Role hierarchy, owner allow-list, and sensitive-verb rules
//! - [`validation`]: Startup validation pass

mod policy;
mod security;
mod types;
mod validation;

pub use policy::{PolicyConfig, SensitiveRule};
pub use security::{RateLimitConfig, SecurityConfig};
pub use types::{
    Config, ConfigError, DatabaseConfig, IdentityConfig, LinkConfig, ServerConfig, TokenBlock,
};
pub use validation::{ValidationError, validate};
