//! Role hierarchy, staff set, owner allow-list, and sensitive-verb rules.

use serde::Deserialize;

/// Authorization policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Role hierarchy from lowest to highest privilege. Unknown roles rank
    /// below all of these.
    #[serde(default = "default_hierarchy")]
    pub hierarchy: Vec<String>,
    /// Lateral staff roles that are part of the staff set but not part of
    /// the strict escalation order (e.g. trial moderators).
    #[serde(default = "default_staff_extra")]
    pub staff_extra: Vec<String>,
    /// Identity ids allowed to run owner-only verbs. Role rank never
    /// substitutes for membership here.
    #[serde(default)]
    pub owners: Vec<String>,
    /// Declarative table of high-risk command verbs and the extra check
    /// each one requires, evaluated before the generic role gate.
    #[serde(default = "default_rules")]
    pub rules: Vec<SensitiveRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            hierarchy: default_hierarchy(),
            staff_extra: default_staff_extra(),
            owners: Vec::new(),
            rules: default_rules(),
        }
    }
}

/// One sensitive-verb rule: commands whose first word matches `prefix`
/// (case-insensitively) require the extra check.
#[derive(Debug, Clone, Deserialize)]
pub struct SensitiveRule {
    /// Command verb, matched against the first whitespace-delimited word.
    pub prefix: String,
    /// Restrict the verb to the owner allow-list.
    #[serde(default)]
    pub owner_only: bool,
    /// Minimum hierarchy role required to use the verb.
    #[serde(default)]
    pub min_rank: Option<String>,
}

fn default_hierarchy() -> Vec<String> {
    ["helper", "moderator", "admin", "developer", "killu", "neroferno"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_staff_extra() -> Vec<String> {
    vec!["mod".to_string(), "staff".to_string()]
}

fn default_rules() -> Vec<SensitiveRule> {
    // Granting operator privileges is restricted to named individuals,
    // never to ranks.
    vec![SensitiveRule {
        prefix: "op".to_string(),
        owner_only: true,
        min_rank: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_gate_op() {
        let config = PolicyConfig::default();
        assert!(config.rules.iter().any(|r| r.prefix == "op" && r.owner_only));
    }

    #[test]
    fn test_rules_parse_from_toml() {
        let toml = r#"
            owners = ["web-owner-1"]

            [[rules]]
            prefix = "op"
            owner_only = true

            [[rules]]
            prefix = "whitelist"
            min_rank = "admin"
        "#;
        let config: PolicyConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].min_rank.as_deref(), Some("admin"));
    }
}
