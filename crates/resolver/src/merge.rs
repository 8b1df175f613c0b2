//! Metadata merging contract.

use bytes::Bytes;

/// Combines a pre-existing local metadata file with freshly fetched or
/// contributed content. The engine decides *when* to merge (staleness,
/// multi-member groups); implementations decide *how*.
pub trait MetadataMerger: Send + Sync {
    fn merge(&self, existing: &[u8], incoming: &[u8]) -> Bytes;
}

/// Format-agnostic line-union merge: keeps the existing lines in order and
/// appends incoming lines not already present. Deterministic and idempotent.
pub struct LineUnionMerger;

impl MetadataMerger for LineUnionMerger {
    fn merge(&self, existing: &[u8], incoming: &[u8]) -> Bytes {
        let existing_text = String::from_utf8_lossy(existing);
        let incoming_text = String::from_utf8_lossy(incoming);

        let mut lines: Vec<&str> = existing_text.lines().collect();
        for line in incoming_text.lines() {
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        let mut merged = lines.join("\n");
        merged.push('\n');
        Bytes::from(merged)
    }
}
