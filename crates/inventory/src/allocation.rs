//! FIFO-by-expiration allocation policy.
//!
//! Pure decision logic: given a requested quantity and a product's candidate lots,
//! decide how many units to draw from each lot. Nothing here mutates the candidates;
//! [`apply_plan`] is the separate step that executes a plan against a working copy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lotkeeper_core::{DomainError, DomainResult, LotId};

use crate::lot::{InventoryLot, StockPool};

/// Units to take from one lot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub lot_id: LotId,
    pub quantity: u64,
}

/// Ordered per-lot draw-down for one requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pool: StockPool,
    requested: u64,
    draws: Vec<Draw>,
}

impl AllocationPlan {
    pub fn pool(&self) -> StockPool {
        self.pool
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Draws in the order they are taken (earliest expiration first).
    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn into_draws(self) -> Vec<Draw> {
        self.draws
    }

    pub fn total(&self) -> u64 {
        self.draws.iter().map(|d| d.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("requested quantity must be greater than zero")]
    ZeroQuantity,

    #[error("insufficient {pool} stock: requested {requested}, available {available}")]
    InsufficientStock {
        pool: StockPool,
        requested: u64,
        available: u64,
    },
}

/// Sum of one pool across lots.
pub fn pool_total<'a>(lots: impl IntoIterator<Item = &'a InventoryLot>, pool: StockPool) -> u64 {
    lots.into_iter()
        .fold(0u64, |acc, lot| acc.saturating_add(lot.quantity_in(pool)))
}

/// Lots in draw order: ascending expiration date, ties broken by ascending lot id.
pub fn fifo_order(lots: &[InventoryLot]) -> Vec<&InventoryLot> {
    let mut ordered: Vec<&InventoryLot> = lots.iter().collect();
    ordered.sort_by_key(|lot| (lot.expiration_date(), lot.lot_id()));
    ordered
}

/// Plan drawing `requested` units from `pool` across `lots`, earliest expiration first.
///
/// Fails without producing a plan when the pool total is below `requested`.
pub fn plan_fifo(
    requested: u64,
    lots: &[InventoryLot],
    pool: StockPool,
) -> Result<AllocationPlan, AllocationError> {
    if requested == 0 {
        return Err(AllocationError::ZeroQuantity);
    }

    let available = pool_total(lots, pool);
    if available < requested {
        return Err(AllocationError::InsufficientStock {
            pool,
            requested,
            available,
        });
    }

    let mut remaining = requested;
    let mut draws = Vec::new();
    for lot in fifo_order(lots) {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(lot.quantity_in(pool));
        if take == 0 {
            continue;
        }
        draws.push(Draw {
            lot_id: lot.lot_id(),
            quantity: take,
        });
        remaining -= take;
    }

    Ok(AllocationPlan {
        pool,
        requested,
        draws,
    })
}

/// Execute a plan against a working copy of lots.
///
/// Every draw goes through the lot's own transition, so a plan that no longer fits
/// (stale or hand-built) fails instead of underflowing. On error, lots touched by
/// earlier draws keep their changes: callers apply plans to a scratch copy.
pub fn apply_plan(lots: &mut [InventoryLot], plan: &AllocationPlan) -> DomainResult<()> {
    for draw in plan.draws() {
        let lot = lots
            .iter_mut()
            .find(|lot| lot.lot_id() == draw.lot_id)
            .ok_or_else(|| DomainError::invariant(format!("plan references unknown lot {}", draw.lot_id)))?;
        lot.draw(plan.pool(), draw.quantity)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lotkeeper_core::ProductId;

    /// Deterministic lot ids that sort in `n` order.
    fn lot_id(n: u8) -> LotId {
        format!("00000000-0000-7000-8000-0000000000{n:02x}").parse().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lot(id: u8, available: u64, reserved: u64, expires: NaiveDate) -> InventoryLot {
        InventoryLot::from_parts(
            lot_id(id),
            ProductId::parse("P1").unwrap(),
            available,
            reserved,
            expires,
            None,
            1,
        )
    }

    #[test]
    fn draws_earliest_expiration_first() {
        // Deliberately unsorted input.
        let lots = vec![
            lot(3, 5, 0, date(2025, 3, 1)),
            lot(1, 5, 0, date(2025, 1, 1)),
            lot(2, 5, 0, date(2025, 2, 1)),
        ];

        let plan = plan_fifo(7, &lots, StockPool::Available).unwrap();

        assert_eq!(
            plan.draws(),
            &[
                Draw { lot_id: lot_id(1), quantity: 5 },
                Draw { lot_id: lot_id(2), quantity: 2 },
            ]
        );
        assert_eq!(plan.total(), 7);
    }

    #[test]
    fn equal_expirations_break_ties_by_lot_id() {
        let same_day = date(2025, 5, 5);
        let lots = vec![lot(9, 4, 0, same_day), lot(4, 4, 0, same_day)];

        let plan = plan_fifo(6, &lots, StockPool::Available).unwrap();

        assert_eq!(plan.draws()[0], Draw { lot_id: lot_id(4), quantity: 4 });
        assert_eq!(plan.draws()[1], Draw { lot_id: lot_id(9), quantity: 2 });
    }

    #[test]
    fn empty_lots_are_skipped() {
        let lots = vec![lot(1, 0, 3, date(2025, 1, 1)), lot(2, 6, 0, date(2025, 2, 1))];

        let plan = plan_fifo(2, &lots, StockPool::Available).unwrap();

        assert_eq!(plan.draws(), &[Draw { lot_id: lot_id(2), quantity: 2 }]);
    }

    #[test]
    fn reserved_pool_uses_the_same_order() {
        let lots = vec![lot(2, 5, 5, date(2025, 6, 1)), lot(1, 0, 10, date(2025, 1, 1))];

        let plan = plan_fifo(12, &lots, StockPool::Reserved).unwrap();

        assert_eq!(
            plan.draws(),
            &[
                Draw { lot_id: lot_id(1), quantity: 10 },
                Draw { lot_id: lot_id(2), quantity: 2 },
            ]
        );
    }

    #[test]
    fn shortage_produces_no_plan() {
        let lots = vec![lot(1, 3, 0, date(2025, 1, 1)), lot(2, 2, 9, date(2025, 2, 1))];

        let err = plan_fifo(6, &lots, StockPool::Available).unwrap_err();

        assert_eq!(
            err,
            AllocationError::InsufficientStock {
                pool: StockPool::Available,
                requested: 6,
                available: 5,
            }
        );
    }

    #[test]
    fn no_lots_means_nothing_available() {
        let err = plan_fifo(1, &[], StockPool::Reserved).unwrap_err();
        assert!(matches!(err, AllocationError::InsufficientStock { available: 0, .. }));
    }

    #[test]
    fn zero_request_is_rejected() {
        let lots = vec![lot(1, 3, 0, date(2025, 1, 1))];
        assert_eq!(plan_fifo(0, &lots, StockPool::Available), Err(AllocationError::ZeroQuantity));
    }

    #[test]
    fn apply_plan_moves_available_to_reserved() {
        let mut lots = vec![lot(1, 10, 0, date(2025, 1, 1)), lot(2, 10, 0, date(2025, 6, 1))];
        let plan = plan_fifo(15, &lots, StockPool::Available).unwrap();

        apply_plan(&mut lots, &plan).unwrap();

        assert_eq!((lots[0].quantity_available(), lots[0].quantity_reserved()), (0, 10));
        assert_eq!((lots[1].quantity_available(), lots[1].quantity_reserved()), (5, 5));
    }

    #[test]
    fn apply_plan_rejects_stale_plan() {
        let mut lots = vec![lot(1, 4, 0, date(2025, 1, 1))];
        let plan = plan_fifo(4, &lots, StockPool::Available).unwrap();
        lots[0].reserve(1).unwrap();

        let err = apply_plan(&mut lots, &plan).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn apply_plan_rejects_unknown_lot() {
        let lots = vec![lot(1, 4, 0, date(2025, 1, 1))];
        let plan = plan_fifo(2, &lots, StockPool::Available).unwrap();
        let mut other = vec![lot(2, 4, 0, date(2025, 1, 1))];

        assert!(apply_plan(&mut other, &plan).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_lots() -> impl Strategy<Value = Vec<InventoryLot>> {
            prop::collection::vec((0u64..50, 0u64..50, 0u32..365), 0..8).prop_map(|specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (available, reserved, offset))| {
                        let expires = date(2025, 1, 1) + chrono::Days::new(offset as u64);
                        lot(i as u8, available, reserved, expires)
                    })
                    .collect()
            })
        }

        fn arb_pool() -> impl Strategy<Value = StockPool> {
            prop_oneof![Just(StockPool::Available), Just(StockPool::Reserved)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: a plan exists iff the pool covers the request, and then it sums
            /// exactly to the request without exceeding any lot.
            #[test]
            fn plan_is_exact_and_bounded(lots in arb_lots(), requested in 1u64..200, pool in arb_pool()) {
                let total = pool_total(&lots, pool);
                match plan_fifo(requested, &lots, pool) {
                    Ok(plan) => {
                        prop_assert!(total >= requested);
                        prop_assert_eq!(plan.total(), requested);
                        for draw in plan.draws() {
                            let lot = lots.iter().find(|l| l.lot_id() == draw.lot_id).unwrap();
                            prop_assert!(draw.quantity > 0);
                            prop_assert!(draw.quantity <= lot.quantity_in(pool));
                        }
                    }
                    Err(AllocationError::InsufficientStock { available, .. }) => {
                        prop_assert!(total < requested);
                        prop_assert_eq!(available, total);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {e:?}"),
                }
            }

            /// Property: a lot is only touched once every earlier-expiring lot is drained.
            #[test]
            fn earlier_lots_are_exhausted_first(lots in arb_lots(), requested in 1u64..200, pool in arb_pool()) {
                if let Ok(plan) = plan_fifo(requested, &lots, pool) {
                    let ordered = fifo_order(&lots);
                    let last_drawn = plan.draws().last().map(|d| d.lot_id);
                    for lot in ordered {
                        if Some(lot.lot_id()) == last_drawn {
                            break;
                        }
                        let drawn: u64 = plan
                            .draws()
                            .iter()
                            .filter(|d| d.lot_id == lot.lot_id())
                            .map(|d| d.quantity)
                            .sum();
                        prop_assert_eq!(drawn, lot.quantity_in(pool));
                    }
                }
            }

            /// Property: applying a reservation plan conserves on-hand units per product.
            #[test]
            fn reserve_plan_conserves_units(lots in arb_lots(), requested in 1u64..200) {
                let mut working = lots.clone();
                if let Ok(plan) = plan_fifo(requested, &lots, StockPool::Available) {
                    apply_plan(&mut working, &plan).unwrap();
                    let before = pool_total(&lots, StockPool::Available) + pool_total(&lots, StockPool::Reserved);
                    let after = pool_total(&working, StockPool::Available) + pool_total(&working, StockPool::Reserved);
                    prop_assert_eq!(before, after);
                    prop_assert_eq!(
                        pool_total(&working, StockPool::Reserved),
                        pool_total(&lots, StockPool::Reserved) + requested
                    );
                }
            }
        }
    }
}
