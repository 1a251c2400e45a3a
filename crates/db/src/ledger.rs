//! This module defines the [`LedgerDb`] trait, which is used to write and read the cross-chain
//! transaction ledger.

use async_trait::async_trait;
use relay_indexer_primitives::prelude::*;

use crate::errors::DbResult;

/// How wrapper transactions of a [`MergeBatch`] are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapperMergePolicy {
    /// Insert if absent, overwrite every column if present.
    #[default]
    Upsert,

    /// Only touch rows that already exist, overwriting them with the status forced to
    /// [`WrapperStatus::Unconfirmed`]. Absent rows are left absent.
    ForceUnconfirmed,
}

/// Everything a listener observed in one step, to be merged in a single durable operation.
///
/// The stages are written in the order wrappers, src legs, poly legs, dst legs and finally the
/// chain checkpoint, so the checkpoint can never move past data that was not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeBatch {
    /// The updated chain state, if the checkpoint should move.
    pub chain: Option<Chain>,

    /// How [`MergeBatch::wrappers`] are written.
    pub wrapper_policy: WrapperMergePolicy,

    pub wrappers: Vec<WrapperTransaction>,
    pub src: Vec<SrcTransaction>,
    pub poly: Vec<PolyTransaction>,
    pub dst: Vec<DstTransaction>,
}

impl MergeBatch {
    /// Whether the batch would write anything at all.
    pub fn is_empty(&self) -> bool {
        self.chain.is_none()
            && self.wrappers.is_empty()
            && self.src.is_empty()
            && self.poly.is_empty()
            && self.dst.is_empty()
    }
}

/// Hashes invalidated by a chain reorganization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidatedHashes {
    /// Source leg hashes. The wrappers with these hashes are removed as well.
    pub src: Vec<String>,

    /// Relay chain leg hashes.
    pub poly: Vec<String>,

    /// Destination leg hashes.
    pub dst: Vec<String>,
}

impl InvalidatedHashes {
    /// Whether there is nothing to remove.
    pub fn is_empty(&self) -> bool {
        self.src.is_empty() && self.poly.is_empty() && self.dst.is_empty()
    }
}

/// Interface to the transaction ledger.
///
/// Conflicts are resolved by upserting on the primary key: the last writer wins. This is sound
/// because only one authoritative (primary) instance writes wrapper and leg records at a time.
#[async_trait]
pub trait LedgerDb {
    /// Merges all non-empty parts of `batch` atomically.
    ///
    /// A failure in any stage aborts the remaining stages and rolls back the earlier ones, see
    /// [`DbError::PartialBatch`](crate::errors::DbError::PartialBatch).
    async fn merge_batch(&self, batch: MergeBatch) -> DbResult<()>;

    /// Removes transfers, legs and (for source hashes) wrappers, in that order.
    ///
    /// Removing a hash that is not present is a no-op.
    async fn delete_by_hashes(&self, hashes: &InvalidatedHashes) -> DbResult<()>;

    /// Returns the wrapper transaction with the given hash.
    async fn get_wrapper(&self, hash: &str) -> DbResult<Option<WrapperTransaction>>;

    /// Returns the source leg with the given hash, including its transfer.
    async fn get_src_transaction(&self, hash: &str) -> DbResult<Option<SrcTransaction>>;

    /// Returns the relay chain leg with the given hash.
    async fn get_poly_transaction(&self, hash: &str) -> DbResult<Option<PolyTransaction>>;

    /// Returns the destination leg with the given hash, including its transfer.
    async fn get_dst_transaction(&self, hash: &str) -> DbResult<Option<DstTransaction>>;

    /// Returns at most `limit` wrappers in the given status, oldest first.
    async fn list_wrappers_by_status(
        &self,
        status: WrapperStatus,
        limit: usize,
    ) -> DbResult<Vec<WrapperTransaction>>;
}
