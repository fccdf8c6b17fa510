//! Per-user trade statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::amount::TokenAmount;
use crate::order::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub trades_completed: u64,
    /// Settled volume per token code, in base units.
    pub volume: BTreeMap<String, TokenAmount>,
    pub version: u64,
}

impl UserStats {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            trades_completed: 0,
            volume: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn record_trade(&mut self, token_code: &str, amount: TokenAmount) {
        self.trades_completed += 1;
        *self
            .volume
            .entry(token_code.to_ascii_uppercase())
            .or_insert(TokenAmount::ZERO) += amount;
    }

    pub fn volume_of(&self, token_code: &str) -> TokenAmount {
        self.volume
            .get(&token_code.to_ascii_uppercase())
            .copied()
            .unwrap_or(TokenAmount::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_trade_accumulates() {
        let mut stats = UserStats::new(UserId::new("alice"));
        stats.record_trade("usdt", TokenAmount::from(5));
        stats.record_trade("USDT", TokenAmount::from(7));
        stats.record_trade("DAI", TokenAmount::from(1));
        assert_eq!(stats.trades_completed, 3);
        assert_eq!(stats.volume_of("USDT"), TokenAmount::from(12));
        assert_eq!(stats.volume_of("dai"), TokenAmount::from(1));
    }
}
