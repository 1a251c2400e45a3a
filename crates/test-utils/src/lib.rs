//! This crate provides test-utilities for the relay indexer.
//!
//! These utilities generate random identifiers and consistent ledger records, so that tests can
//! focus on the behavior under test rather than on building fixtures.

pub mod generators;
pub mod ledger;
pub mod prelude;
pub mod token;
