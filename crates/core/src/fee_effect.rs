//! Judges whether transfers paid enough fee for their destination chain.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use relay_indexer_db::IndexerDb;
use relay_indexer_primitives::prelude::*;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{config::FeeEffectConfig, errors::EngineResult};

/// Compares a paid fee with a chain's fee policy.
///
/// `paid` is expressed in the smallest unit of `fee_token` and the policy minimum in the smallest
/// unit of `policy_basic`. Both are brought to whole units first. If the fee was paid in another
/// token basic than the one the policy is denominated in, both sides are converted to value using
/// their basic's price, which requires both prices to be usable.
///
/// Returns the judgement together with the two compared quantities.
pub fn evaluate(
    paid: &Amount,
    fee_token: &Token,
    fee_basic: &TokenBasic,
    policy: &ChainFee,
    policy_basic: &TokenBasic,
) -> (PayState, BigDecimal, BigDecimal) {
    let mut amount = paid.in_whole_units(fee_token.precision);
    let mut min_proxy_fee = policy.min_fee.in_whole_units(policy_basic.precision);

    if fee_basic.name != policy_basic.name {
        if fee_basic.ind == 0 || policy_basic.ind == 0 {
            return (PayState::Missing, amount, min_proxy_fee);
        }

        amount *= BigDecimal::from(fee_basic.price);
        min_proxy_fee *= BigDecimal::from(policy_basic.price);
    }

    let state = if amount >= min_proxy_fee {
        PayState::Sufficient
    } else {
        PayState::Insufficient
    };

    (state, amount.normalized(), min_proxy_fee.normalized())
}

/// Evaluates the fees of merged wrapper transactions and records available amounts.
#[derive(Debug)]
pub struct FeeEffectEvaluator<Db> {
    db: Arc<Db>,
}

impl<Db> Clone for FeeEffectEvaluator<Db> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<Db: IndexerDb> FeeEffectEvaluator<Db> {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Evaluates the fee of the wrapper transaction with the given hash.
    ///
    /// An unknown hash yields a [`PayState::Missing`] judgement with chain id zero.
    pub async fn check_fee(&self, hash: &str) -> EngineResult<CheckFee> {
        match self.db.get_wrapper(hash).await? {
            Some(wrapper) => self.check_wrapper(&wrapper).await,
            None => {
                debug!(%hash, "no such wrapper transaction");
                Ok(CheckFee::missing(0, hash))
            }
        }
    }

    /// Evaluates the fee of `wrapper` against the fee policy of its destination chain.
    ///
    /// The fee token is looked up on the source chain, where the fee was paid.
    pub async fn check_wrapper(&self, wrapper: &WrapperTransaction) -> EngineResult<CheckFee> {
        let missing = || CheckFee::missing(wrapper.src_chain_id, wrapper.hash.as_str());

        let Some(policy) = self.db.get_chain_fee(wrapper.dst_chain_id).await? else {
            debug!(hash = %wrapper.hash, dst_chain_id = wrapper.dst_chain_id, "no fee policy");
            return Ok(missing());
        };

        let fee_key = TokenKey::new(wrapper.src_chain_id, &wrapper.fee_token_hash);
        let Some(fee_token) = self.db.get_token(&fee_key).await? else {
            debug!(hash = %wrapper.hash, fee_token = %fee_key.hash, "unknown fee token");
            return Ok(missing());
        };

        let fee_basic = self.db.get_token_basic(&fee_token.token_basic_name).await?;
        let policy_basic = self.db.get_token_basic(&policy.token_basic_name).await?;
        let (Some(fee_basic), Some(policy_basic)) = (fee_basic, policy_basic) else {
            debug!(hash = %wrapper.hash, fee_basic = %fee_token.token_basic_name, policy_basic = %policy.token_basic_name, "unknown token basic");
            return Ok(missing());
        };

        let (pay_state, amount, min_proxy_fee) = evaluate(
            &wrapper.fee_amount,
            &fee_token,
            &fee_basic,
            &policy,
            &policy_basic,
        );

        Ok(CheckFee {
            chain_id: wrapper.src_chain_id,
            hash: wrapper.hash.clone(),
            pay_state,
            amount,
            min_proxy_fee,
        })
    }

    /// Evaluates up to `limit` pending wrapper transactions, oldest first.
    pub async fn check_pending_fees(&self, limit: usize) -> EngineResult<Vec<CheckFee>> {
        let pending = self
            .db
            .list_wrappers_by_status(WrapperStatus::Pending, limit)
            .await?;

        let mut checks = Vec::with_capacity(pending.len());
        for wrapper in &pending {
            checks.push(self.check_wrapper(wrapper).await?);
        }

        Ok(checks)
    }

    /// Records the amount that can currently be unlocked for a token.
    ///
    /// Amounts too wide for storage are saturated.
    pub async fn update_available_amount(&self, key: &TokenKey, amount: &Amount) -> EngineResult<()> {
        if amount.exceeds_storage_width() {
            warn!(chain_id = key.chain_id, token = %key.hash, %amount, "available amount too wide, clamping");
        }

        self.db.set_available_amount(key, amount).await?;

        Ok(())
    }

    /// Periodically checks the pending wrapper transactions until `cancel` fires.
    pub async fn run(self, config: FeeEffectConfig, cancel: CancellationToken) {
        info!(interval = ?config.interval, batch_limit = config.batch_limit, "starting fee checks");

        let mut ticker = interval(config.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopping fee checks");
                    break;
                }
                _ = ticker.tick() => {
                    match self.check_pending_fees(config.batch_limit).await {
                        Ok(checks) => report(&checks),
                        Err(e) => error!(%e, "could not check pending fees"),
                    }
                }
            }
        }
    }
}

fn report(checks: &[CheckFee]) {
    let mut paid = 0;

    for check in checks {
        match check.pay_state {
            PayState::Sufficient => paid += 1,
            PayState::Insufficient => warn!(
                chain_id = check.chain_id,
                hash = %check.hash,
                amount = %check.amount,
                min_proxy_fee = %check.min_proxy_fee,
                "insufficient fee"
            ),
            PayState::Missing => debug!(hash = %check.hash, "could not evaluate fee"),
        }
    }

    debug!(checked = checks.len(), %paid, "checked pending fees");
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use relay_indexer_db::{
        chain::ChainDb,
        inmemory::prelude::InMemoryDb,
        ledger::{LedgerDb, MergeBatch},
        token::TokenDb,
    };
    use relay_indexer_test_utils::prelude::*;

    use super::*;

    const ETH_SRC: &str = "0xeeee";

    /// ETH on chain 2 (18 decimals) and USDT on chains 2 and 6 (6 decimals).
    async fn seeded_db() -> Arc<InMemoryDb> {
        let db = Arc::new(InMemoryDb::new());

        db.upsert_token_basics(&[
            token_basic("ETH", 18, 2_000, &[(2, ETH_SRC)]),
            token_basic("USDT", 6, 1, &[(2, "0xaaaa"), (6, "0xbbbb")]),
        ])
        .await
        .unwrap();
        db.add_chains(
            &[Chain::new(2, "ethereum", 0), Chain::new(6, "bsc", 0)],
            &[chain_fee(6, "USDT", 3_000_000, 1)],
        )
        .await
        .unwrap();

        db
    }

    async fn merged_wrapper(db: &InMemoryDb, fee_token: &str, fee: Amount) -> WrapperTransaction {
        let wrapper = WrapperTransaction {
            fee_token_hash: fee_token.to_string(),
            fee_amount: fee,
            ..generate_wrapper(2, 6, 100, 1_000)
        };
        db.merge_batch(MergeBatch {
            wrappers: vec![wrapper.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

        wrapper
    }

    fn decimal(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_same_basic_compares_whole_units() {
        let db = seeded_db().await;
        let evaluator = FeeEffectEvaluator::new(db.clone());

        let paid = merged_wrapper(&db, "0xAAAA", Amount::from(5_000_000u64)).await;
        let check = evaluator.check_fee(&paid.hash).await.unwrap();
        assert_eq!(check.pay_state, PayState::Sufficient);
        assert_eq!(check.amount, decimal("5"));
        assert_eq!(check.min_proxy_fee, decimal("3"));
        assert_eq!(check.chain_id, 2);

        let short = merged_wrapper(&db, "0xaaaa", Amount::from(2_999_999u64)).await;
        let check = evaluator.check_fee(&short.hash).await.unwrap();
        assert_eq!(check.pay_state, PayState::Insufficient);

        let exact = merged_wrapper(&db, "0xaaaa", Amount::from(3_000_000u64)).await;
        assert!(evaluator.check_fee(&exact.hash).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_other_basic_is_converted_through_prices() {
        let db = seeded_db().await;
        let evaluator = FeeEffectEvaluator::new(db.clone());

        // 0.001 ETH at 2000 is worth 2 USDT, below the minimum of 3.
        let cheap = merged_wrapper(&db, ETH_SRC, Amount::from(1_000_000_000_000_000u64)).await;
        let check = evaluator.check_fee(&cheap.hash).await.unwrap();
        assert_eq!(check.pay_state, PayState::Insufficient);
        assert_eq!(check.amount, decimal("2"));
        assert_eq!(check.min_proxy_fee, decimal("3"));

        let enough = merged_wrapper(&db, ETH_SRC, Amount::from(2_000_000_000_000_000u64)).await;
        assert!(evaluator.check_fee(&enough.hash).await.unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_unusable_price_is_missing() {
        let db = seeded_db().await;
        let evaluator = FeeEffectEvaluator::new(db.clone());
        db.upsert_token_basics(&[TokenBasic {
            ind: 0,
            ..token_basic("ETH", 18, 2_000, &[(2, ETH_SRC)])
        }])
        .await
        .unwrap();

        let wrapper = merged_wrapper(&db, ETH_SRC, Amount::from(u64::MAX)).await;
        let check = evaluator.check_fee(&wrapper.hash).await.unwrap();
        assert_eq!(check.pay_state, PayState::Missing);
    }

    #[tokio::test]
    async fn test_missing_prerequisites() {
        let db = seeded_db().await;
        let evaluator = FeeEffectEvaluator::new(db.clone());

        let unknown = evaluator.check_fee("0xnope").await.unwrap();
        assert_eq!(unknown, CheckFee::missing(0, "0xnope"));

        let foreign_token = merged_wrapper(&db, "0xffff", Amount::from(10u64)).await;
        let check = evaluator.check_fee(&foreign_token.hash).await.unwrap();
        assert_eq!(check.pay_state, PayState::Missing);
        assert_eq!(check.chain_id, 2);

        let no_policy = WrapperTransaction {
            dst_chain_id: 7,
            ..merged_wrapper(&db, "0xaaaa", Amount::from(10u64)).await
        };
        let check = evaluator.check_wrapper(&no_policy).await.unwrap();
        assert_eq!(check.pay_state, PayState::Missing);
    }

    #[tokio::test]
    async fn test_check_pending_fees_skips_other_statuses() {
        let db = seeded_db().await;
        let evaluator = FeeEffectEvaluator::new(db.clone());

        let pending = merged_wrapper(&db, "0xaaaa", Amount::from(5_000_000u64)).await;
        let finalized = WrapperTransaction {
            status: WrapperStatus::Finalized,
            ..generate_wrapper(2, 6, 101, 1_001)
        };
        db.merge_batch(MergeBatch {
            wrappers: vec![finalized],
            ..Default::default()
        })
        .await
        .unwrap();

        let checks = evaluator.check_pending_fees(10).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].hash, pending.hash);
        assert!(checks[0].is_paid());
    }

    #[tokio::test]
    async fn test_update_available_amount_clamps() {
        let db = seeded_db().await;
        let evaluator = FeeEffectEvaluator::new(db.clone());
        let key = TokenKey::new(6, "0xBBBB");
        let wide = Amount::from_str(&"7".repeat(70)).unwrap();

        evaluator.update_available_amount(&key, &wide).await.unwrap();

        let token = db.get_token(&key).await.unwrap().unwrap();
        assert_eq!(token.available_amount, Some(Amount::storage_max()));
    }
}
