//! Drives a transfer through merge, fee check, reorg and resubmission against both stores.

use std::sync::Arc;

use relay_indexer_core::{
    compensator::{ReorgCompensator, ReorgNotice},
    config::IndexerMode,
    correlator::{ChainEvents, EventCorrelator},
    fee_effect::FeeEffectEvaluator,
    token_map::TokenMapBuilder,
};
use relay_indexer_db::{
    chain::ChainDb,
    inmemory::prelude::InMemoryDb,
    ledger::{InvalidatedHashes, LedgerDb},
    persistent::sqlite::SqliteDb,
    IndexerDb,
};
use relay_indexer_primitives::prelude::*;
use relay_indexer_test_utils::prelude::*;
use sqlx::SqlitePool;

const SRC_CHAIN: ChainId = 2;
const DST_CHAIN: ChainId = 6;
const RELAY_CHAIN: ChainId = 0;
const FEE_TOKEN: &str = "0xfee0";

/// Everything the ledger knows about one transfer, plus the checkpoint of its source chain.
#[derive(Debug, PartialEq, Eq)]
struct Observed {
    wrapper: Option<WrapperTransaction>,
    src: Option<SrcTransaction>,
    poly: Option<PolyTransaction>,
    dst: Option<DstTransaction>,
    height: BlockHeight,
}

async fn observe<Db: IndexerDb>(db: &Db, transfer: &TransferFixture) -> Observed {
    Observed {
        wrapper: db.get_wrapper(&transfer.wrapper.hash).await.unwrap(),
        src: db.get_src_transaction(&transfer.src.hash).await.unwrap(),
        poly: db.get_poly_transaction(&transfer.poly.hash).await.unwrap(),
        dst: db.get_dst_transaction(&transfer.dst.hash).await.unwrap(),
        height: db.get_chain(SRC_CHAIN).await.unwrap().unwrap().height,
    }
}

/// The `0xabc` transfer, paying a fee of 5 where 3 is required.
fn transfer_0xabc() -> TransferFixture {
    let mut transfer = generate_transfer(
        &TokenKey::new(SRC_CHAIN, "0xaaaa"),
        &TokenKey::new(DST_CHAIN, "0xbbbb"),
        RELAY_CHAIN,
        100,
        1_000,
        Amount::from(42u64),
    );

    transfer.wrapper.hash = "0xabc".to_string();
    transfer.wrapper.fee_token_hash = FEE_TOKEN.to_string();
    transfer.wrapper.fee_amount = Amount::from(5u64);
    transfer.src = generate_src_transaction(&transfer.wrapper, "0xaaaa", "0xbbbb", Amount::from(42u64));
    transfer.poly.wrapper_hash = "0xabc".to_string();
    transfer.poly.src_hash = "0xabc".to_string();
    transfer.dst.wrapper_hash = "0xabc".to_string();

    transfer
}

fn events_of(transfer: &TransferFixture) -> ChainEvents {
    ChainEvents {
        wrappers: vec![transfer.wrapper.clone()],
        src: vec![transfer.src.clone()],
        poly: vec![transfer.poly.clone()],
        dst: vec![transfer.dst.clone()],
    }
}

async fn setup<Db: IndexerDb>(db: &Arc<Db>) {
    db.add_chains(
        &[
            Chain::new(SRC_CHAIN, "ethereum", 99),
            Chain::new(DST_CHAIN, "bsc", 0),
        ],
        &[chain_fee(DST_CHAIN, "FEE", 3, 1)],
    )
    .await
    .unwrap();

    TokenMapBuilder::new(db.clone())
        .add_tokens(
            &[
                token_basic("FEE", 0, 1, &[(SRC_CHAIN, FEE_TOKEN), (DST_CHAIN, "0xfee1")]),
                token_basic("USDT", 6, 1, &[(SRC_CHAIN, "0xaaaa"), (DST_CHAIN, "0xbbbb")]),
            ],
            &[],
        )
        .await
        .unwrap();
}

async fn scenario<Db: IndexerDb>(db: Arc<Db>) {
    setup(&db).await;

    let correlator = EventCorrelator::new(db.clone(), IndexerMode::Primary);
    let compensator = ReorgCompensator::new(db.clone(), IndexerMode::Primary);
    let evaluator = FeeEffectEvaluator::new(db.clone());
    let transfer = transfer_0xabc();
    let chain = Chain::new(SRC_CHAIN, "ethereum", 100);

    let before = observe(db.as_ref(), &transfer).await;
    assert_eq!(before.wrapper, None);
    assert_eq!(before.height, 99);

    correlator
        .merge(Some(chain.clone()), events_of(&transfer))
        .await
        .unwrap();
    let merged = observe(db.as_ref(), &transfer).await;
    assert_eq!(merged.wrapper.as_ref(), Some(&transfer.wrapper));
    assert_eq!(merged.src.as_ref(), Some(&transfer.src));
    assert_eq!(merged.poly.as_ref(), Some(&transfer.poly));
    assert_eq!(merged.dst.as_ref(), Some(&transfer.dst));
    assert_eq!(merged.height, 100);

    let check = evaluator.check_fee("0xabc").await.unwrap();
    assert_eq!(check.pay_state, PayState::Sufficient);
    assert_eq!(check.chain_id, SRC_CHAIN);

    correlator
        .merge(Some(chain.clone()), events_of(&transfer))
        .await
        .unwrap();
    assert_eq!(observe(db.as_ref(), &transfer).await, merged, "merge is idempotent");

    compensator
        .handle_reorg(&ReorgNotice {
            chain_id: SRC_CHAIN,
            rollback_to: 99,
            invalidated: InvalidatedHashes {
                src: vec![transfer.src.hash.clone()],
                poly: vec![transfer.poly.hash.clone()],
                dst: vec![transfer.dst.hash.clone()],
            },
        })
        .await
        .unwrap();
    assert_eq!(observe(db.as_ref(), &transfer).await, before);
    assert_eq!(
        evaluator.check_fee("0xabc").await.unwrap().pay_state,
        PayState::Missing
    );

    correlator
        .merge(Some(chain), events_of(&transfer))
        .await
        .unwrap();
    assert_eq!(observe(db.as_ref(), &transfer).await, merged);
    assert!(evaluator.check_fee("0xabc").await.unwrap().is_paid());
}

#[tokio::test]
async fn test_transfer_lifecycle_in_memory() {
    scenario(Arc::new(InMemoryDb::new())).await;
}

#[tokio::test]
async fn test_reorg_round_trip_restores_every_table() {
    let db = Arc::new(InMemoryDb::new());
    setup(&db).await;

    let correlator = EventCorrelator::new(db.clone(), IndexerMode::Primary);
    let compensator = ReorgCompensator::new(db.clone(), IndexerMode::Primary);
    let transfer = transfer_0xabc();
    let chain = Chain::new(SRC_CHAIN, "ethereum", 100);

    correlator
        .merge(Some(chain.clone()), events_of(&transfer))
        .await
        .unwrap();
    let once = db.snapshot().await;

    compensator
        .handle_reorg(&ReorgNotice {
            chain_id: SRC_CHAIN,
            rollback_to: 99,
            invalidated: InvalidatedHashes {
                src: vec![transfer.src.hash.clone()],
                poly: vec![transfer.poly.hash.clone()],
                dst: vec![transfer.dst.hash.clone()],
            },
        })
        .await
        .unwrap();
    assert_ne!(db.snapshot().await, once);

    correlator
        .merge(Some(chain), events_of(&transfer))
        .await
        .unwrap();
    assert_eq!(db.snapshot().await, once);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_transfer_lifecycle_sqlite(pool: SqlitePool) {
    scenario(Arc::new(SqliteDb::new(pool))).await;
}
