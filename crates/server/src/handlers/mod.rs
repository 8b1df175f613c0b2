//! HTTP request handlers.

pub mod admin;
pub mod artifacts;

pub use admin::*;
pub use artifacts::*;
