//! Routing rule configuration for group repositories.

use serde::{Deserialize, Serialize};

/// A single routing rule: a path pattern plus the member repositories it
/// refers to. Repositories may be bare ids (resolved within the group's
/// storage) or `storage:repository`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Regular expression matched against the repository-relative path.
    pub pattern: String,
    /// Member repositories this rule applies to.
    pub repositories: Vec<String>,
}

/// An ordered list of rules bound to one group repository, or to all groups
/// via the `*` wildcard.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleSet {
    /// Group repository id, `storage:group`, or `*`.
    pub group_id: String,
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

impl RuleSet {
    /// Whether this rule set applies to the given group repository.
    pub fn applies_to(&self, storage_id: &str, group_id: &str) -> bool {
        self.group_id == crate::WILDCARD_GROUP
            || self.group_id == group_id
            || self.group_id == format!("{storage_id}:{group_id}")
    }
}

/// Accept/deny rule sets. Denied rules always override accepted ones for a
/// matching path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoutingRules {
    #[serde(default)]
    pub accepted: Vec<RuleSet>,
    #[serde(default)]
    pub denied: Vec<RuleSet>,
}

impl RoutingRules {
    /// Validate that every pattern is a well-formed regular expression and
    /// every rule names at least one repository.
    pub fn validate(&self) -> crate::Result<()> {
        for rule_set in self.accepted.iter().chain(self.denied.iter()) {
            if rule_set.group_id.is_empty() {
                return Err(crate::Error::Configuration(
                    "routing rule set group_id cannot be empty".to_string(),
                ));
            }
            for rule in &rule_set.rules {
                if rule.repositories.is_empty() {
                    return Err(crate::Error::Configuration(format!(
                        "routing rule {:?} names no repositories",
                        rule.pattern
                    )));
                }
                regex::Regex::new(&rule.pattern).map_err(|e| {
                    crate::Error::InvalidRoutingPattern {
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    }
                })?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.denied.is_empty()
    }
}
