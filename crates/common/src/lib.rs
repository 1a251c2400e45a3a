//! Utilities shared by the relay indexer binaries.

pub mod logging;
