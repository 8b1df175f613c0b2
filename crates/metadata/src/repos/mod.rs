//! Repository traits implemented by the ledger stores.

pub mod records;

pub use records::ArtifactRecordRepo;
