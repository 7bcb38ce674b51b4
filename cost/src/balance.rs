//! Balance and credit admission checks.
//!
//! These are online admission-control checks, not ledger debits: the
//! available balance is recomputed from the balance table and the committed
//! costs of already-admitted messages on every call. The only cache is the
//! credit balance, invalidated by the ledger's last-change time.

use ccn_store::credit::CachedCreditBalance;
use ccn_store::{AccountCostStore, BalanceStore, CreditStore, Store};
use ccn_types::{Address, PaymentType, Timestamp};

use crate::engine::Cost;
use crate::pricing::CostPolicy;
use crate::CostError;

/// The address's current credit balance.
///
/// Recomputed from the ledger unless a cached value is still valid, i.e. no
/// ledger entry is newer than the cache's `as_of` stamp. Expired grants stop
/// counting; expenses always count.
pub fn credit_balance(
    store: &dyn Store,
    address: &Address,
    at: Timestamp,
) -> Result<i128, CostError> {
    let last_change = store.credit_last_change(address)?;
    if let (Some(cached), Some(last)) = (store.get_cached_credit_balance(address)?, last_change) {
        if cached.as_of >= last {
            return Ok(cached.balance);
        }
    }

    let history = store.credit_history(address)?;
    let mut balance: i128 = 0;
    for entry in &history {
        let expired = entry
            .expiration_date
            .map(|expiry| expiry <= at)
            .unwrap_or(false);
        if entry.amount > 0 && expired {
            continue;
        }
        balance += entry.amount;
    }

    if let Some(last) = last_change {
        store.put_cached_credit_balance(
            address,
            CachedCreditBalance {
                balance,
                as_of: last,
            },
        )?;
    }
    Ok(balance)
}

/// Sum of already-committed costs for an address under one payment model,
/// excluding rows belonging to `exclude` (the message being re-validated —
/// an idempotent re-admission must not count its own earlier snapshot).
fn committed_cost(
    store: &dyn Store,
    address: &Address,
    payment_type: PaymentType,
    exclude: Option<&ccn_types::ItemHash>,
) -> Result<u128, CostError> {
    let costs = store.costs_for_owner(address, payment_type)?;
    Ok(costs
        .iter()
        .filter(|c| exclude.map(|hash| &c.item_hash != hash).unwrap_or(true))
        .map(|c| match payment_type {
            PaymentType::Hold => c.cost_hold,
            PaymentType::Stream => c.cost_stream,
            PaymentType::Credit => c.cost_credit,
        })
        .sum())
}

/// Validate that `address` can pay for a message costing `cost` under
/// `payment_type`. `Ok(())` admits; the error is a permanent rejection.
pub fn validate_balance(
    store: &dyn Store,
    address: &Address,
    cost: &Cost,
    payment_type: PaymentType,
    policy: &CostPolicy,
    at: Timestamp,
    exclude: Option<&ccn_types::ItemHash>,
) -> Result<(), CostError> {
    policy.check_payment_type(payment_type)?;

    match payment_type {
        PaymentType::Hold | PaymentType::Stream => {
            let required = match payment_type {
                PaymentType::Hold => cost.hold,
                _ => cost.stream,
            };
            if required == 0 {
                return Ok(());
            }
            let balance = store.get_balance(address)?;
            let committed = committed_cost(store, address, payment_type, exclude)?;
            let available = balance.saturating_sub(committed);
            if available < required {
                return Err(CostError::InsufficientBalance {
                    available,
                    required,
                });
            }
            Ok(())
        }
        PaymentType::Credit => {
            // A credit-paid message must be able to fund its committed
            // siblings plus a minimum runtime of itself.
            let projected =
                i128::try_from(cost.credit * u128::from(policy.credit_min_runtime_hours))
                    .unwrap_or(i128::MAX);
            if projected == 0 {
                return Ok(());
            }
            let committed =
                i128::try_from(committed_cost(store, address, PaymentType::Credit, exclude)?)
                    .unwrap_or(i128::MAX);
            let balance = credit_balance(store, address, at)?;
            let required = committed.saturating_add(projected);
            if balance < required {
                return Err(CostError::InsufficientCredit {
                    available: balance - committed,
                    required: projected,
                });
            }
            Ok(())
        }
    }
}
