//! Escrow fee computation.

use p2px_core::TokenAmount;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fee parameters.
///
/// `max_fee` is the fraction of the trade amount charged in total.
/// `fee_percent` is the fraction of that fee kept by the operator when the
/// order belongs to a community; the rest is scaled by the community's share.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeePolicy {
    #[serde(default = "default_max_fee")]
    pub max_fee: Decimal,
    #[serde(default = "default_fee_percent")]
    pub fee_percent: Decimal,
}

fn default_max_fee() -> Decimal {
    Decimal::new(2, 3)
}

fn default_fee_percent() -> Decimal {
    Decimal::new(7, 1)
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            max_fee: default_max_fee(),
            fee_percent: default_fee_percent(),
        }
    }
}

fn round_units(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

impl FeePolicy {
    /// Fee for `amount`. `community_share` is the community's cut in percent.
    pub fn compute(&self, amount: TokenAmount, community_share: Option<Decimal>) -> TokenAmount {
        let max_fee = round_units(amount.inner() * self.max_fee);
        let Some(share) = community_share else {
            return TokenAmount::floor(max_fee);
        };
        let bot_fee = max_fee * self.fee_percent;
        let community_fee = round_units(max_fee - bot_fee) * share / Decimal::ONE_HUNDRED;
        TokenAmount::floor(round_units(bot_fee + community_fee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn policy() -> FeePolicy {
        FeePolicy {
            max_fee: dec!(0.003),
            fee_percent: dec!(0.7),
        }
    }

    #[test]
    fn test_fee_without_community() {
        assert_eq!(
            policy().compute(TokenAmount::from(1_000_000), None),
            TokenAmount::from(3_000)
        );
    }

    #[test]
    fn test_fee_rounds_half_up() {
        // 1500 * 0.003 = 4.5
        assert_eq!(
            policy().compute(TokenAmount::from(1_500), None),
            TokenAmount::from(5)
        );
    }

    #[test]
    fn test_fee_with_community_share() {
        // max 3000, bot 2100, community round(900) * 50% = 450
        assert_eq!(
            policy().compute(TokenAmount::from(1_000_000), Some(dec!(50))),
            TokenAmount::from(2_550)
        );
    }

    #[test]
    fn test_zero_community_share_keeps_bot_part() {
        assert_eq!(
            policy().compute(TokenAmount::from(1_000_000), Some(dec!(0))),
            TokenAmount::from(2_100)
        );
    }
}
