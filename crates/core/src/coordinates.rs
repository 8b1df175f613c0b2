//! Maven-style artifact coordinates decomposed from repository paths.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Structured coordinates of an artifact, derived from its repository-relative
/// path under the `maven2` layout convention:
/// `<group path>/<artifact>/<version>/<file>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl ArtifactCoordinates {
    /// Decompose a repository-relative path into coordinates.
    ///
    /// Returns `None` for paths that do not follow the layout convention
    /// (directory listings, top-level metadata, too few segments). Such paths
    /// are still served and tracked, just without structured coordinates.
    pub fn from_path(relative_path: &str) -> Option<Self> {
        let segments: Vec<&str> = relative_path.split('/').collect();
        if segments.len() < 4 {
            return None;
        }
        let file_name = *segments.last()?;
        let version = segments[segments.len() - 2];
        let artifact_id = segments[segments.len() - 3];
        if file_name.is_empty() || version.is_empty() || artifact_id.is_empty() {
            return None;
        }
        let group_id = segments[..segments.len() - 3].join(".");

        let prefix = format!("{artifact_id}-{version}");
        let (classifier, extension) = match file_name.strip_prefix(&prefix) {
            Some(rest) => split_classifier_extension(rest),
            // File name does not embed artifact-version (e.g. checksums of
            // oddly named files); keep the extension only.
            None => (None, file_name.split_once('.').map(|(_, e)| e.to_string())),
        };

        Some(Self {
            group_id,
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier,
            extension,
        })
    }

    /// Whether this is a snapshot version.
    pub fn is_snapshot(&self) -> bool {
        self.version.ends_with("-SNAPSHOT")
    }

    /// Coordinates as a flat map, the shape persisted on artifact records.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("groupId".to_string(), self.group_id.clone());
        map.insert("artifactId".to_string(), self.artifact_id.clone());
        map.insert("version".to_string(), self.version.clone());
        if let Some(classifier) = &self.classifier {
            map.insert("classifier".to_string(), classifier.clone());
        }
        if let Some(extension) = &self.extension {
            map.insert("extension".to_string(), extension.clone());
        }
        map
    }
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        Ok(())
    }
}

/// Split the remainder after `<artifact>-<version>` into classifier and
/// extension. `-sources.jar` -> (Some("sources"), Some("jar")),
/// `.tar.gz` -> (None, Some("tar.gz")).
fn split_classifier_extension(rest: &str) -> (Option<String>, Option<String>) {
    if let Some(classified) = rest.strip_prefix('-') {
        match classified.split_once('.') {
            Some((classifier, extension)) => (
                Some(classifier.to_string()),
                Some(extension.to_string()),
            ),
            None => (Some(classified.to_string()), None),
        }
    } else if let Some(extension) = rest.strip_prefix('.') {
        (None, Some(extension.to_string()))
    } else {
        (None, None)
    }
}

/// The artifact-level directory prefix of a repository-relative path
/// (`<group path>/<artifact>/`), used to enumerate all versions of an
/// artifact. `None` when the path is too shallow to carry coordinates.
pub fn artifact_prefix_of(relative_path: &str) -> Option<String> {
    let segments: Vec<&str> = relative_path.split('/').collect();
    if segments.len() < 4 {
        return None;
    }
    Some(format!("{}/", segments[..segments.len() - 2].join("/")))
}

/// Compare two version strings segment-wise: dot/dash separated, numeric
/// segments compare numerically, mixed segments fall back to lexical order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.split(['.', '-']).map(|s| s.to_string()).collect()
    };
    let left = split(a);
    let right = split(b);
    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(ln), Ok(rn)) => ln.cmp(&rn),
            _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}
