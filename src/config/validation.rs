//! Startup configuration validation.
//!
//! Collects every problem instead of stopping at the first, so an operator
//! gets one actionable report per boot attempt.

use super::Config;
use std::fmt;

/// A single validation problem.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the loaded configuration.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.http_listen == config.server.consumer_listen {
        errors.push(ValidationError {
            field: "server.consumer_listen",
            message: "must differ from server.http_listen".to_string(),
        });
    }

    if config.policy.hierarchy.is_empty() {
        errors.push(ValidationError {
            field: "policy.hierarchy",
            message: "role hierarchy must not be empty".to_string(),
        });
    }

    for rule in &config.policy.rules {
        if rule.prefix.trim().is_empty() {
            errors.push(ValidationError {
                field: "policy.rules",
                message: "rule prefix must not be empty".to_string(),
            });
        }
        if !rule.owner_only && rule.min_rank.is_none() {
            errors.push(ValidationError {
                field: "policy.rules",
                message: format!(
                    "rule '{}' must set owner_only or min_rank",
                    rule.prefix
                ),
            });
        }
        if let Some(rank) = &rule.min_rank {
            let known = config
                .policy
                .hierarchy
                .iter()
                .any(|r| r.eq_ignore_ascii_case(rank));
            if !known {
                errors.push(ValidationError {
                    field: "policy.rules",
                    message: format!("min_rank '{}' is not in the hierarchy", rank),
                });
            }
        }
    }

    if config.link.code_ttl_secs == 0 {
        errors.push(ValidationError {
            field: "link.code_ttl_secs",
            message: "code TTL must be positive".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
