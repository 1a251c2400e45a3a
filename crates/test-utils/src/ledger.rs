//! Fixtures for ledger records.
//!
//! The generated legs of one logical transfer are linked the same way a chain listener links
//! them: the source leg shares its hash with the wrapper, the relay chain leg points back at the
//! source leg and the destination leg points at the relay chain leg.

use relay_indexer_primitives::prelude::*;

use crate::generators::{generate_address, generate_hash};

/// A full set of records for one logical transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFixture {
    pub wrapper: WrapperTransaction,
    pub src: SrcTransaction,
    pub poly: PolyTransaction,
    pub dst: DstTransaction,
}

/// Generates a pending wrapper transaction with a random hash.
pub fn generate_wrapper(
    src_chain_id: ChainId,
    dst_chain_id: ChainId,
    block_height: BlockHeight,
    time: Timestamp,
) -> WrapperTransaction {
    WrapperTransaction {
        hash: generate_hash(),
        user: generate_address(),
        src_chain_id,
        block_height,
        time,
        dst_chain_id,
        dst_user: generate_address(),
        server_id: 1,
        fee_token_hash: generate_address(),
        fee_amount: Amount::zero(),
        status: WrapperStatus::Pending,
    }
}

/// Generates the source leg of `wrapper`, moving `amount` of `asset`.
pub fn generate_src_transaction(
    wrapper: &WrapperTransaction,
    asset: &str,
    dst_asset: &str,
    amount: Amount,
) -> SrcTransaction {
    SrcTransaction {
        hash: wrapper.hash.clone(),
        wrapper_hash: wrapper.hash.clone(),
        chain_id: wrapper.src_chain_id,
        state: 1,
        time: wrapper.time,
        fee: Amount::from(21_000u64),
        height: wrapper.block_height,
        user: wrapper.user.clone(),
        dst_chain_id: wrapper.dst_chain_id,
        contract: generate_address(),
        key: generate_hash(),
        param: String::new(),
        transfer: Some(SrcTransfer {
            tx_hash: wrapper.hash.clone(),
            chain_id: wrapper.src_chain_id,
            time: wrapper.time,
            asset: asset.to_string(),
            from: wrapper.user.clone(),
            to: generate_address(),
            amount,
            dst_chain_id: wrapper.dst_chain_id,
            dst_asset: dst_asset.to_string(),
            dst_user: wrapper.dst_user.clone(),
        }),
    }
}

/// Generates the relay chain leg confirming `src`.
pub fn generate_poly_transaction(src: &SrcTransaction, relay_chain_id: ChainId) -> PolyTransaction {
    PolyTransaction {
        hash: generate_hash(),
        wrapper_hash: src.wrapper_hash.clone(),
        chain_id: relay_chain_id,
        state: 1,
        time: src.time + 60,
        fee: Amount::zero(),
        height: src.height,
        src_chain_id: src.chain_id,
        src_hash: src.hash.clone(),
        dst_chain_id: src.dst_chain_id,
        key: src.key.clone(),
    }
}

/// Generates the destination leg following `poly`, releasing `amount` of `asset`.
pub fn generate_dst_transaction(
    poly: &PolyTransaction,
    asset: &str,
    amount: Amount,
) -> DstTransaction {
    let hash = generate_hash();

    DstTransaction {
        hash: hash.clone(),
        wrapper_hash: poly.wrapper_hash.clone(),
        chain_id: poly.dst_chain_id,
        state: 1,
        time: poly.time + 60,
        fee: Amount::from(21_000u64),
        height: poly.height,
        src_chain_id: poly.src_chain_id,
        contract: generate_address(),
        poly_hash: poly.hash.clone(),
        transfer: Some(DstTransfer {
            tx_hash: hash,
            chain_id: poly.dst_chain_id,
            time: poly.time + 60,
            asset: asset.to_string(),
            from: generate_address(),
            to: generate_address(),
            amount,
        }),
    }
}

/// Generates every record of a transfer of `amount` from `src_asset` to `dst_asset`.
pub fn generate_transfer(
    src_asset: &TokenKey,
    dst_asset: &TokenKey,
    relay_chain_id: ChainId,
    block_height: BlockHeight,
    time: Timestamp,
    amount: Amount,
) -> TransferFixture {
    let wrapper = generate_wrapper(src_asset.chain_id, dst_asset.chain_id, block_height, time);
    let src = generate_src_transaction(&wrapper, &src_asset.hash, &dst_asset.hash, amount.clone());
    let poly = generate_poly_transaction(&src, relay_chain_id);
    let dst = generate_dst_transaction(&poly, &dst_asset.hash, amount);

    TransferFixture {
        wrapper,
        src,
        poly,
        dst,
    }
}
