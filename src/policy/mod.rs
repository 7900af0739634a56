//! Authorization policy: role hierarchy, staff set, owner allow-list, and
//! the sensitive-verb table.
//!
//! Every gate here fails closed: a missing identity, an unknown role, or an
//! empty allow-list always denies. High-risk command verbs are declarable
//! data ([`crate::config::SensitiveRule`]) evaluated before the generic
//! role gate, so new dangerous verbs are a config change, not a code change.

use crate::config::{PolicyConfig, SensitiveRule};
use crate::identity::Identity;
use std::collections::HashSet;

/// The extra check a sensitive verb requires beyond the staff gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredCheck {
    /// Caller must be on the owner allow-list, regardless of rank.
    OwnerOnly,
    /// Caller must hold at least this hierarchy rank.
    MinimumRank(String),
}

/// Compiled role policy.
#[derive(Debug)]
pub struct RolePolicy {
    /// Hierarchy from lowest to highest, lowercased.
    hierarchy: Vec<String>,
    /// Full staff set: hierarchy roles plus lateral staff roles.
    staff: HashSet<String>,
    /// Identity ids allowed to run owner-only verbs.
    owners: HashSet<String>,
    /// Sensitive-verb rules in declaration order; first match wins.
    rules: Vec<SensitiveRule>,
}

impl RolePolicy {
    pub fn new(config: &PolicyConfig) -> Self {
        let hierarchy: Vec<String> = config
            .hierarchy
            .iter()
            .map(|r| r.to_lowercase())
            .collect();

        let mut staff: HashSet<String> = hierarchy.iter().cloned().collect();
        staff.extend(config.staff_extra.iter().map(|r| r.to_lowercase()));

        Self {
            hierarchy,
            staff,
            owners: config.owners.iter().cloned().collect(),
            rules: config.rules.clone(),
        }
    }

    /// Membership gate used by most endpoints.
    pub fn is_staff(&self, role: &str) -> bool {
        self.staff.contains(&role.to_lowercase())
    }

    /// Position of a role in the hierarchy; unknown roles rank below all
    /// known roles.
    fn rank(&self, role: &str) -> Option<usize> {
        let role = role.to_lowercase();
        self.hierarchy.iter().position(|r| *r == role)
    }

    /// True iff `role` ranks at or above `required` in the hierarchy.
    pub fn has_minimum_rank(&self, role: &str, required: &str) -> bool {
        match (self.rank(role), self.rank(required)) {
            (Some(have), Some(need)) => have >= need,
            // Unknown role, or a required rank outside the hierarchy: deny.
            _ => false,
        }
    }

    /// Hard-coded allow-list check, independent of role. An empty list
    /// denies everyone.
    pub fn is_owner(&self, identity: &Identity) -> bool {
        self.owners.contains(&identity.id)
    }

    /// Find the sensitive-verb rule matching a command, if any.
    ///
    /// Matches the first whitespace-delimited word of the command text,
    /// case-insensitively, so `"OP Steve"` and `"op Steve"` hit the same
    /// rule while `"optimize"` does not.
    pub fn rule_for(&self, command: &str) -> Option<&SensitiveRule> {
        let verb = command.split_whitespace().next()?;
        self.rules
            .iter()
            .find(|r| r.prefix.eq_ignore_ascii_case(verb))
    }

    /// Evaluate the extra check a command requires, if its verb is in the
    /// sensitive table.
    pub fn required_check(&self, command: &str) -> Option<RequiredCheck> {
        let rule = self.rule_for(command)?;
        if rule.owner_only {
            Some(RequiredCheck::OwnerOnly)
        } else {
            rule.min_rank.clone().map(RequiredCheck::MinimumRank)
        }
    }

    /// Full authorization decision for enqueueing a command: staff gate
    /// first, then the sensitive-verb table. Returns `Ok(())` or the reason
    /// for denial; the step-up gate is layered separately by the caller.
    pub fn authorize_command(&self, identity: &Identity, command: &str) -> Result<(), Denial> {
        if !self.is_staff(&identity.role) {
            return Err(Denial::NotStaff);
        }

        match self.required_check(command) {
            Some(RequiredCheck::OwnerOnly) => {
                if self.is_owner(identity) {
                    Ok(())
                } else {
                    Err(Denial::NotOwner)
                }
            }
            Some(RequiredCheck::MinimumRank(required)) => {
                if self.has_minimum_rank(&identity.role, &required) {
                    Ok(())
                } else {
                    Err(Denial::InsufficientRank)
                }
            }
            None => Ok(()),
        }
    }
}

/// Why a command authorization was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotStaff,
    NotOwner,
    InsufficientRank,
}
