//! Persistence gateway of the relay indexer.
//!
//! The interface is split by concern into [`ledger`], [`chain`], [`token`] and [`stats`] traits.
//! Two implementations are provided: [`inmemory`] for tests and local development, and
//! [`persistent`] backed by SQLite.

pub mod chain;
pub mod errors;
pub mod inmemory;
pub mod ledger;
pub mod persistent;
pub mod stats;
pub mod token;

/// Any store that implements every part of the gateway.
pub trait IndexerDb:
    ledger::LedgerDb + chain::ChainDb + token::TokenDb + stats::StatsDb + Send + Sync
{
}

impl<T> IndexerDb for T where
    T: ledger::LedgerDb + chain::ChainDb + token::TokenDb + stats::StatsDb + Send + Sync
{
}
