//! The correlation, compensation and aggregation engine of the relay indexer.
//!
//! Chain listeners feed decoded legs to the [`correlator`] (usually through an [`ingest`] worker),
//! which merges them into the ledger and moves the chain's [`checkpoint`]. Reorganizations are
//! undone by the [`compensator`]. The [`stats`] aggregator and the [`fee_effect`] evaluator run on
//! their own schedule over the merged ledger, using the equivalence graph kept by [`token_map`].
//! The [`service`] module runs all of them for one instance.

pub mod checkpoint;
pub mod compensator;
pub mod config;
pub mod correlator;
pub mod errors;
pub mod fee_effect;
pub mod ingest;
pub mod service;
pub mod stats;
pub mod token_map;
