//! Manual trailing stop: stops may tighten, never loosen.

use crate::models::{Position, Side};

/// Apply the ratchet rule to a proposed level.
///
/// Longs keep the higher of the two levels, shorts the lower.
pub fn ratchet(side: Side, current: f64, proposed: f64) -> f64 {
    if !proposed.is_finite() {
        return current;
    }
    match side {
        Side::Long => current.max(proposed),
        Side::Short => current.min(proposed),
    }
}

/// Next trailing level for `position` given the live price and latest ATR.
///
/// The level starts following price only once the trade has moved in favor by at least the
/// trail offset. It then sits `atr * trail_multiplier` behind price (the stored trail distance
/// when ATR is unavailable) and is ratcheted against the current level.
pub fn next_trailing_stop(position: &Position, price: f64, atr: f64, trail_multiplier: f64) -> f64 {
    let current = position.trailing_stop;

    if position.favorable_move(price) < position.trail_offset {
        return current;
    }

    let distance = if atr > 0.0 && atr.is_finite() {
        atr * trail_multiplier
    } else {
        position.trail_distance
    };
    let proposed = price - distance * position.side.sign();

    ratchet(position.side, current, proposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn make_position(side: Side) -> Position {
        let sign = side.sign();
        Position {
            side,
            quantity: dec!(1),
            entry_price: 100.0,
            entry_time: Utc::now(),
            take_profit: 100.0 + 10.0 * sign,
            stop_loss: 100.0 - 5.0 * sign,
            trailing_stop: 100.0 - 1.5 * sign,
            trail_distance: 0.9,
            trail_offset: 0.6,
            order_ref: None,
        }
    }

    #[test]
    fn test_ratchet_blocks_loosening() {
        assert_eq!(ratchet(Side::Long, 95.0, 100.0), 100.0);
        assert_eq!(ratchet(Side::Long, 100.0, 90.0), 100.0);
        assert_eq!(ratchet(Side::Short, 105.0, 100.0), 100.0);
        assert_eq!(ratchet(Side::Short, 100.0, 110.0), 100.0);
        assert_eq!(ratchet(Side::Long, 100.0, f64::NAN), 100.0);
    }

    #[test]
    fn test_inactive_until_offset_reached() {
        let pos = make_position(Side::Long);
        assert_eq!(next_trailing_stop(&pos, 100.5, 1.0, 0.9), 98.5);
    }

    #[test]
    fn test_long_follows_price() {
        let mut pos = make_position(Side::Long);
        pos.trailing_stop = next_trailing_stop(&pos, 103.0, 1.0, 0.9);
        assert!((pos.trailing_stop - 102.1).abs() < 1e-9);

        // Pullback leaves the level untouched
        assert_eq!(next_trailing_stop(&pos, 102.5, 1.0, 0.9), pos.trailing_stop);
    }

    #[test]
    fn test_short_follows_price() {
        let pos = make_position(Side::Short);
        let level = next_trailing_stop(&pos, 97.0, 0.0, 0.9);
        // No ATR: falls back to the stored distance
        assert!((level - 97.9).abs() < 1e-9);
    }

    #[test]
    fn test_atr_expansion_does_not_loosen() {
        let mut pos = make_position(Side::Long);
        pos.trailing_stop = next_trailing_stop(&pos, 104.0, 1.0, 0.9);
        let widened = next_trailing_stop(&pos, 104.0, 5.0, 0.9);
        assert_eq!(widened, pos.trailing_stop);
    }

    proptest! {
        #[test]
        fn prop_level_never_worsens(
            long in any::<bool>(),
            path in prop::collection::vec((80.0f64..120.0, 0.0f64..5.0), 1..60),
        ) {
            let side = if long { Side::Long } else { Side::Short };
            let mut pos = make_position(side);
            for (price, atr) in path {
                let next = next_trailing_stop(&pos, price, atr, 0.9);
                match side {
                    Side::Long => prop_assert!(next >= pos.trailing_stop),
                    Side::Short => prop_assert!(next <= pos.trailing_stop),
                }
                pos.trailing_stop = next;
            }
        }
    }
}
