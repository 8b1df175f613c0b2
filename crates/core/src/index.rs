//! Id-keyed repository index with reverse group membership lookups.
//!
//! The topology is stored arena-style: repositories are addressed by
//! (storage, repository) key, group membership is a list of keys, and
//! "which groups contain X" is an explicit reverse index. No entity holds a
//! back-reference to its parent.

use crate::config::Storage;
use crate::repository::Repository;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fully qualified repository key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    pub storage_id: String,
    pub repository_id: String,
}

impl RepoKey {
    pub fn new(storage_id: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            repository_id: repository_id.into(),
        }
    }

    /// Parse a member reference: either a bare repository id (resolved in
    /// `default_storage`) or `storage:repository`.
    pub fn parse_member_ref(default_storage: &str, raw: &str) -> Self {
        match raw.split_once(':') {
            Some((storage, repository)) => Self::new(storage, repository),
            None => Self::new(default_storage, raw),
        }
    }
}

impl fmt::Debug for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoKey({self})")
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage_id, self.repository_id)
    }
}

/// Immutable, id-keyed view of the configured topology.
#[derive(Debug)]
pub struct RepositoryIndex {
    repositories: HashMap<RepoKey, Repository>,
    /// Group key -> member keys, in configured order.
    members: HashMap<RepoKey, Vec<RepoKey>>,
    /// Member key -> groups that contain it.
    containing_groups: HashMap<RepoKey, Vec<RepoKey>>,
    /// All keys in configuration order, for deterministic iteration.
    ordered: Vec<RepoKey>,
}

impl RepositoryIndex {
    /// Build the index, validating that every group member reference resolves
    /// and that the membership graph is acyclic.
    pub fn build(storages: &[Storage]) -> crate::Result<Self> {
        let index = Self::build_unvalidated(storages);
        index.check_member_references()?;
        index.check_cycles()?;
        Ok(index)
    }

    /// Build without reference/cycle validation.
    ///
    /// Callers own validation; resolution still guards against cycles at
    /// runtime, so a cyclic index fails per-request instead of at build time.
    pub fn build_unvalidated(storages: &[Storage]) -> Self {
        let mut repositories = HashMap::new();
        let mut members: HashMap<RepoKey, Vec<RepoKey>> = HashMap::new();
        let mut containing_groups: HashMap<RepoKey, Vec<RepoKey>> = HashMap::new();
        let mut ordered = Vec::new();

        for storage in storages {
            for repository in &storage.repositories {
                let key = RepoKey::new(&storage.id, &repository.id);
                ordered.push(key.clone());
                repositories.insert(key, repository.clone());
            }
        }
        for storage in storages {
            for repository in &storage.repositories {
                if !repository.is_group() {
                    continue;
                }
                let group_key = RepoKey::new(&storage.id, &repository.id);
                let member_keys: Vec<RepoKey> = repository
                    .members
                    .iter()
                    .map(|raw| RepoKey::parse_member_ref(&storage.id, raw))
                    .collect();
                for member in &member_keys {
                    containing_groups
                        .entry(member.clone())
                        .or_default()
                        .push(group_key.clone());
                }
                members.insert(group_key, member_keys);
            }
        }

        Self {
            repositories,
            members,
            containing_groups,
            ordered,
        }
    }

    pub fn repository(&self, key: &RepoKey) -> Option<&Repository> {
        self.repositories.get(key)
    }

    pub fn get(&self, storage_id: &str, repository_id: &str) -> Option<&Repository> {
        self.repositories
            .get(&RepoKey::new(storage_id, repository_id))
    }

    /// Member keys of a group, in fan-out order. Empty for non-groups.
    pub fn members_of(&self, key: &RepoKey) -> &[RepoKey] {
        self.members.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups that list the given repository as a member.
    pub fn containing_groups(&self, key: &RepoKey) -> &[RepoKey] {
        self.containing_groups
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All repositories in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&RepoKey, &Repository)> {
        self.ordered
            .iter()
            .filter_map(|key| self.repositories.get(key).map(|repository| (key, repository)))
    }

    /// All proxy repositories in configuration order.
    pub fn proxy_repositories(&self) -> impl Iterator<Item = (&RepoKey, &Repository)> {
        self.iter().filter(|(_, repository)| repository.is_proxy())
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    fn check_member_references(&self) -> crate::Result<()> {
        for (group, member_keys) in &self.members {
            for member in member_keys {
                if !self.repositories.contains_key(member) {
                    return Err(crate::Error::Configuration(format!(
                        "group {group} references unknown member {member}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_cycles(&self) -> crate::Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            index: &RepositoryIndex,
            key: &RepoKey,
            marks: &mut HashMap<RepoKey, Mark>,
            trail: &mut Vec<RepoKey>,
        ) -> crate::Result<()> {
            match marks.get(key) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let mut chain: Vec<String> =
                        trail.iter().map(ToString::to_string).collect();
                    chain.push(key.to_string());
                    return Err(crate::Error::GroupCycle(chain.join(" -> ")));
                }
                None => {}
            }
            marks.insert(key.clone(), Mark::Visiting);
            trail.push(key.clone());
            for member in index.members_of(key) {
                visit(index, member, marks, trail)?;
            }
            trail.pop();
            marks.insert(key.clone(), Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut trail = Vec::new();
        for group in self.members.keys() {
            visit(self, group, &mut marks, &mut trail)?;
        }
        Ok(())
    }
}
