//! On-chain escrow record as seen by this engine, and the exact-field matcher.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::amount::TokenAmount;
use crate::order::Order;

/// Escrow status as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    None,
    Locked,
    Released,
    Refunded,
}

impl EscrowStatus {
    /// Contract enum ordinal. Unknown values map to `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Locked,
            2 => Self::Released,
            3 => Self::Refunded,
            _ => Self::None,
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::Locked => "LOCKED",
            Self::Released => "RELEASED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub status: EscrowStatus,
    pub token_contract_address: String,
    pub buyer_address: String,
    pub buyer_hash: String,
    pub seller_hash: String,
    pub amount: TokenAmount,
    pub fee: TokenAmount,
    pub admin_triggered: bool,
}

impl EscrowRecord {
    /// True only if every escrow parameter equals the order's recorded value.
    ///
    /// Addresses and hashes compare case-insensitively with or without a
    /// `0x` prefix. An order without keys or buyer address never matches.
    pub fn matches(&self, order: &Order, token_contract_address: &str) -> bool {
        let Some(keys) = order.keys.as_ref() else {
            return false;
        };
        let Some(buyer_address) = order.buyer_address.as_deref() else {
            return false;
        };
        hex_eq(&self.token_contract_address, token_contract_address)
            && hex_eq(&self.buyer_address, buyer_address)
            && hex_eq(&self.buyer_hash, &keys.buyer_hash)
            && hex_eq(&self.seller_hash, &keys.seller_hash)
            && self.amount == order.amount
            && self.fee == order.fee
    }
}

/// Lowercase and strip a leading `0x`.
pub fn normalize_hex(value: &str) -> String {
    let trimmed = value.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_lowercase()
}

fn hex_eq(a: &str, b: &str) -> bool {
    let (a, b) = (normalize_hex(a), normalize_hex(b));
    !a.is_empty() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::FiatValue;
    use crate::order::{EscrowKeys, FiatAmount, OrderKind, UserId};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    const TOKEN: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

    fn funded_order() -> Order {
        let mut order = Order::new(
            OrderKind::Sell,
            UserId::new("alice"),
            "USDT",
            "ARS",
            FiatAmount::fixed(FiatValue::new(dec!(100))).unwrap(),
            "bank",
            Utc::now(),
        );
        order.buyer_id = Some(UserId::new("bob"));
        order.buyer_address = Some("0x1111111111111111111111111111111111111111".into());
        order.amount = TokenAmount::from(1_000_000);
        order.fee = TokenAmount::from(3_000);
        order.keys = Some(EscrowKeys {
            buyer_hash: "ab".repeat(32),
            buyer_secret: "01".repeat(32),
            seller_hash: "cd".repeat(32),
            seller_secret: "02".repeat(32),
        });
        order
    }

    fn record_for(order: &Order) -> EscrowRecord {
        let keys = order.keys.as_ref().unwrap();
        EscrowRecord {
            status: EscrowStatus::Locked,
            token_contract_address: TOKEN.to_lowercase(),
            buyer_address: order.buyer_address.clone().unwrap().to_uppercase().replace("0X", "0x"),
            buyer_hash: format!("0x{}", keys.buyer_hash.to_uppercase()),
            seller_hash: format!("0x{}", keys.seller_hash),
            amount: order.amount,
            fee: order.fee,
            admin_triggered: false,
        }
    }

    #[test]
    fn test_full_match_ignores_case_and_prefix() {
        let order = funded_order();
        assert!(record_for(&order).matches(&order, TOKEN));
    }

    #[test]
    fn test_any_field_mismatch_rejects() {
        let order = funded_order();
        let base = record_for(&order);

        let mutations: Vec<Box<dyn Fn(&mut EscrowRecord)>> = vec![
            Box::new(|r| r.token_contract_address = "0x00".into()),
            Box::new(|r| r.buyer_address = "0x2222222222222222222222222222222222222222".into()),
            Box::new(|r| r.buyer_hash = "0xff".into()),
            Box::new(|r| r.seller_hash = "0xff".into()),
            Box::new(|r| r.amount = TokenAmount::from(999_999)),
            Box::new(|r| r.fee = TokenAmount::from(1)),
        ];
        for mutate in mutations {
            let mut record = base.clone();
            mutate(&mut record);
            assert!(!record.matches(&order, TOKEN), "{record:?}");
        }
    }

    #[test]
    fn test_order_without_keys_never_matches() {
        let mut order = funded_order();
        let record = record_for(&order);
        order.keys = None;
        assert!(!record.matches(&order, TOKEN));
    }

    #[test]
    fn test_status_from_code() {
        assert_eq!(EscrowStatus::from_code(1), EscrowStatus::Locked);
        assert_eq!(EscrowStatus::from_code(3), EscrowStatus::Refunded);
        assert_eq!(EscrowStatus::from_code(9), EscrowStatus::None);
    }
}
