//! Supported tokens.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};

/// A token tradeable through the escrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub code: String,
    pub contract_address: String,
    pub decimals: u32,
    /// USD price for market pricing. Stablecoins use 1.
    #[serde(default)]
    pub usd_price: Option<Decimal>,
}

impl TokenSpec {
    pub fn supports_market_price(&self) -> bool {
        self.usd_price.is_some_and(|p| p > Decimal::ZERO)
    }
}

/// Token lookup by code (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, TokenSpec>,
}

impl TokenRegistry {
    pub fn new(specs: impl IntoIterator<Item = TokenSpec>) -> Self {
        let tokens = specs
            .into_iter()
            .map(|spec| (spec.code.to_ascii_uppercase(), spec))
            .collect();
        Self { tokens }
    }

    pub fn get(&self, code: &str) -> Result<&TokenSpec> {
        self.tokens
            .get(&code.to_ascii_uppercase())
            .ok_or_else(|| CoreError::UnknownToken(code.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
