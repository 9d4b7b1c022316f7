//! Ledger outcome derived from an executed on-chain option.

use binopt_core::{Bet, BetResult, BetStatus, OptionState, Settlement};
use rust_decimal::Decimal;

/// Maps an executed option onto the bet's terminal fields.
///
/// Equal entry and exit prices are a push regardless of `is_win`: the stake
/// is refunded. Otherwise the contract's `is_win` decides, and a win pays the
/// on-chain payout.
#[must_use]
pub fn settlement_from_chain(bet: &Bet, option: &OptionState) -> Settlement {
    let exit_price = Some(option.exit_price);

    if option.exit_price == option.entry_price {
        return Settlement {
            status: BetStatus::Expired,
            result: BetResult::Draw,
            exit_price,
            payout: bet.stake,
        };
    }

    if option.is_win {
        Settlement {
            status: BetStatus::Won,
            result: BetResult::Win,
            exit_price,
            payout: option.payout,
        }
    } else {
        Settlement {
            status: BetStatus::Lost,
            result: BetResult::Loss,
            exit_price,
            payout: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binopt_core::{Direction, HoldingPeriod, OnChainRef, OptionId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn bet() -> Bet {
        Bet::new_active(
            "BTC",
            Direction::Up,
            dec!(10),
            HoldingPeriod::FiveMinutes,
            dec!(100),
            OnChainRef::pending("0x1"),
            Utc::now(),
        )
    }

    fn option(entry: Decimal, exit: Decimal, is_win: bool, payout: Decimal) -> OptionState {
        OptionState {
            option_id: OptionId::new(1),
            trader: "0x00000000000000000000000000000000000000b0".into(),
            asset: "BTC".into(),
            amount: dec!(10),
            entry_price: entry,
            exit_price: exit,
            payout,
            expiry: Utc::now(),
            is_up: true,
            is_win,
            executed: true,
        }
    }

    #[test]
    fn test_equal_prices_refund_stake() {
        let s = settlement_from_chain(&bet(), &option(dec!(100), dec!(100.000), true, dec!(18)));
        assert_eq!(s.status, BetStatus::Expired);
        assert_eq!(s.result, BetResult::Draw);
        assert_eq!(s.payout, dec!(10));
        assert_eq!(s.exit_price, Some(dec!(100)));
    }

    #[test]
    fn test_win_pays_on_chain_payout() {
        let s = settlement_from_chain(&bet(), &option(dec!(100), dec!(101), true, dec!(18.5)));
        assert_eq!((s.status, s.result, s.payout), (BetStatus::Won, BetResult::Win, dec!(18.5)));
    }

    #[test]
    fn test_loss_pays_nothing() {
        let s = settlement_from_chain(&bet(), &option(dec!(100), dec!(99), false, dec!(7)));
        assert_eq!((s.status, s.result, s.payout), (BetStatus::Lost, BetResult::Loss, Decimal::ZERO));
        assert_eq!(s.exit_price, Some(dec!(99)));
    }
}
