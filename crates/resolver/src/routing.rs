//! Routing rule evaluation for group resolution.

use crate::error::ResolveResult;
use depot_core::routing::RoutingRules;
use depot_core::{Error as CoreError, RepoKey, WILDCARD_GROUP};
use regex::Regex;

struct CompiledRule {
    pattern: Regex,
    /// Raw member references; resolved against the group's storage at
    /// evaluation time so wildcard sets work for groups in any storage.
    repositories: Vec<String>,
}

impl CompiledRule {
    fn lists(&self, group_storage: &str, member: &RepoKey) -> bool {
        self.repositories
            .iter()
            .any(|raw| RepoKey::parse_member_ref(group_storage, raw) == *member)
    }
}

struct CompiledRuleSet {
    group_id: String,
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    fn applies_to(&self, group: &RepoKey) -> bool {
        self.group_id == WILDCARD_GROUP
            || self.group_id == group.repository_id
            || self.group_id == format!("{}:{}", group.storage_id, group.repository_id)
    }
}

/// Pre-compiled accept/deny rule sets.
///
/// A member is rejected when any applicable denied rule matching the path
/// lists it; deny always overrides accept. It is accepted when no accepted
/// rule set applies to the group, no accepted rule matches the path, or
/// some matching accepted rule lists the member.
pub struct RoutingRuleEngine {
    accepted: Vec<CompiledRuleSet>,
    denied: Vec<CompiledRuleSet>,
}

impl RoutingRuleEngine {
    pub fn new(rules: &RoutingRules) -> ResolveResult<Self> {
        Ok(Self {
            accepted: compile(&rules.accepted)?,
            denied: compile(&rules.denied)?,
        })
    }

    pub fn is_path_accepted(&self, group: &RepoKey, member: &RepoKey, path: &str) -> bool {
        let denied = self
            .denied
            .iter()
            .filter(|set| set.applies_to(group))
            .flat_map(|set| set.rules.iter())
            .any(|rule| rule.pattern.is_match(path) && rule.lists(&group.storage_id, member));
        if denied {
            return false;
        }

        let mut any_set_applies = false;
        let mut any_rule_matches = false;
        for set in self.accepted.iter().filter(|set| set.applies_to(group)) {
            any_set_applies = true;
            for rule in set.rules.iter().filter(|rule| rule.pattern.is_match(path)) {
                any_rule_matches = true;
                if rule.lists(&group.storage_id, member) {
                    return true;
                }
            }
        }
        // Default allow: no whitelist in play, or no whitelist rule
        // addresses this path at all.
        !any_set_applies || !any_rule_matches
    }
}

fn compile(sets: &[depot_core::routing::RuleSet]) -> ResolveResult<Vec<CompiledRuleSet>> {
    sets.iter()
        .map(|set| {
            let rules = set
                .rules
                .iter()
                .map(|rule| {
                    let pattern = Regex::new(&rule.pattern).map_err(|e| {
                        CoreError::InvalidRoutingPattern {
                            pattern: rule.pattern.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                    Ok(CompiledRule {
                        pattern,
                        repositories: rule.repositories.clone(),
                    })
                })
                .collect::<ResolveResult<Vec<_>>>()?;
            Ok(CompiledRuleSet {
                group_id: set.group_id.clone(),
                rules,
            })
        })
        .collect()
}
