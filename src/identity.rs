//! Identity resolution.
//!
//! The bridge does not own web accounts. The identity provider is an
//! external collaborator exposed through [`IdentityResolver`]: given a
//! bearer credential, resolve who is calling. Deployments front the real
//! provider; the bundled [`TokenTableResolver`] serves static token blocks
//! from config, which is also what the test harness uses.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use std::collections::HashMap;

/// A resolved caller identity.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Opaque web identity id.
    pub id: String,
    /// Public display name.
    pub display_name: String,
    /// Role name; policy interprets it.
    pub role: String,
    /// Whether a second factor is enrolled for this account. Drives the
    /// step-up gate on sensitive endpoints.
    pub second_factor_enabled: bool,
}

/// Resolves bearer credentials to identities.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a bearer token. `None` means no such session; the caller
    /// maps that to an unauthorized response.
    async fn resolve(&self, bearer: &str) -> Option<Identity>;
}

/// Static token-table resolver built from config blocks.
pub struct TokenTableResolver {
    tokens: HashMap<String, Identity>,
}

impl TokenTableResolver {
    pub fn new(config: &IdentityConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|block| {
                (
                    block.token.clone(),
                    Identity {
                        id: block.id.clone(),
                        display_name: block.display_name.clone(),
                        role: block.role.clone(),
                        second_factor_enabled: block.second_factor_enabled,
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl IdentityResolver for TokenTableResolver {
    async fn resolve(&self, bearer: &str) -> Option<Identity> {
        self.tokens.get(bearer).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenBlock;

    #[tokio::test]
    async fn test_token_table_resolution() {
        let config = IdentityConfig {
            tokens: vec![TokenBlock {
                token: "bearer-1".into(),
                id: "web-abc".into(),
                display_name: "Steve".into(),
                role: "admin".into(),
                second_factor_enabled: true,
            }],
        };
        let resolver = TokenTableResolver::new(&config);

        let identity = resolver.resolve("bearer-1").await.unwrap();
        assert_eq!(identity.id, "web-abc");
        assert!(identity.second_factor_enabled);

        assert!(resolver.resolve("bearer-2").await.is_none());
        assert!(resolver.resolve("").await.is_none());
    }
}
