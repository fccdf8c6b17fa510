//! Order record, identifiers and the status transition table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::amount::{FiatValue, TokenAmount};
use crate::error::{CoreError, Result};

// ============================================================================
// Identifiers
// ============================================================================

/// Order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::InvalidId(format!("{s}: {e}")))
    }
}

/// User identifier as issued by the chat front end.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Community identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(String);

impl CommunityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Kind / Role
// ============================================================================

/// Listing kind, from the creator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Creator wants to buy tokens; the taker is the seller.
    Buy,
    /// Creator wants to sell tokens; the taker is the buyer.
    Sell,
}

impl OrderKind {
    /// Role held by the listing's creator.
    pub fn creator_role(&self) -> Role {
        match self {
            Self::Buy => Role::Buyer,
            Self::Sell => Role::Seller,
        }
    }

    /// Role held by whoever takes the listing.
    pub fn taker_role(&self) -> Role {
        self.creator_role().counterpart()
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Trade role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn counterpart(&self) -> Self {
        match self {
            Self::Buyer => Self::Seller,
            Self::Seller => Self::Buyer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buyer => write!(f, "buyer"),
            Self::Seller => write!(f, "seller"),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    WaitingPayment,
    WaitingBuyerAddress,
    Active,
    FiatSent,
    Dispute,
    Released,
    Canceled,
    CanceledByAdmin,
    CompletedByAdmin,
    Closed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 11] = [
        Self::Pending,
        Self::WaitingPayment,
        Self::WaitingBuyerAddress,
        Self::Active,
        Self::FiatSent,
        Self::Dispute,
        Self::Released,
        Self::Canceled,
        Self::CanceledByAdmin,
        Self::CompletedByAdmin,
        Self::Closed,
    ];

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Released
                | Self::Canceled
                | Self::CanceledByAdmin
                | Self::CompletedByAdmin
                | Self::Closed
        )
    }

    /// Taken, waiting for the escrow to be funded.
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::WaitingPayment | Self::WaitingBuyerAddress)
    }

    /// Tokens are (or should be) locked in the escrow.
    pub fn is_funded(&self) -> bool {
        matches!(self, Self::Active | Self::FiatSent | Self::Dispute)
    }

    /// Transition table.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Pending => matches!(to, WaitingPayment | WaitingBuyerAddress | Closed),
            // Pending: republish in place. Canceled: a buy listing's
            // original record when its clone is republished.
            WaitingPayment => matches!(to, Active | Pending | Canceled),
            // Only sell listings wait for an address; they republish in place.
            WaitingBuyerAddress => matches!(to, WaitingPayment | Pending),
            Active => matches!(
                to,
                FiatSent | Dispute | Released | Canceled | CanceledByAdmin | CompletedByAdmin
            ),
            FiatSent => matches!(
                to,
                Dispute | Released | Canceled | CanceledByAdmin | CompletedByAdmin
            ),
            Dispute => matches!(to, Released | Canceled | CanceledByAdmin | CompletedByAdmin),
            Released | Canceled | CanceledByAdmin | CompletedByAdmin | Closed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::WaitingPayment => "WAITING_PAYMENT",
            Self::WaitingBuyerAddress => "WAITING_BUYER_ADDRESS",
            Self::Active => "ACTIVE",
            Self::FiatSent => "FIAT_SENT",
            Self::Dispute => "DISPUTE",
            Self::Released => "RELEASED",
            Self::Canceled => "CANCELED",
            Self::CanceledByAdmin => "CANCELED_BY_ADMIN",
            Self::CompletedByAdmin => "COMPLETED_BY_ADMIN",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Fiat amount
// ============================================================================

/// Fiat side of a listing: a single value or an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FiatAmount {
    Fixed { value: FiatValue },
    Range { min: FiatValue, max: FiatValue },
}

impl FiatAmount {
    pub fn fixed(value: FiatValue) -> Result<Self> {
        if value.inner() < Decimal::ONE {
            return Err(CoreError::InvalidFiatAmount(format!(
                "{value} is below the minimum of 1"
            )));
        }
        Ok(Self::Fixed { value })
    }

    /// Build a range; `max` must be strictly greater than `min`.
    pub fn range(min: FiatValue, max: FiatValue) -> Result<Self> {
        if min.inner() < Decimal::ONE {
            return Err(CoreError::InvalidFiatAmount(format!(
                "{min} is below the minimum of 1"
            )));
        }
        if max <= min {
            return Err(CoreError::InvalidFiatAmount(format!(
                "range max {max} must exceed min {min}"
            )));
        }
        Ok(Self::Range { min, max })
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }

    /// Whether `value` is an acceptable fill for this amount.
    pub fn accepts(&self, value: FiatValue) -> bool {
        match self {
            Self::Fixed { value: v } => *v == value,
            Self::Range { min, max } => value >= *min && value <= *max,
        }
    }
}

impl fmt::Display for FiatAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { value } => write!(f, "{value}"),
            Self::Range { min, max } => write!(f, "{min}-{max}"),
        }
    }
}

// ============================================================================
// Escrow keys
// ============================================================================

/// Per-attempt matching keys: hex sha256 hashes plus their 32-byte secrets.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowKeys {
    pub buyer_hash: String,
    pub buyer_secret: String,
    pub seller_hash: String,
    pub seller_secret: String,
}

impl EscrowKeys {
    pub fn hashes(&self) -> [&str; 2] {
        [&self.buyer_hash, &self.seller_hash]
    }

    pub fn secrets(&self) -> [&str; 2] {
        [&self.buyer_secret, &self.seller_secret]
    }
}

impl fmt::Debug for EscrowKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscrowKeys")
            .field("buyer_hash", &self.buyer_hash)
            .field("buyer_secret", &"<redacted>")
            .field("seller_hash", &self.seller_hash)
            .field("seller_secret", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Order
// ============================================================================

/// A peer-to-peer listing and the trade attempt running on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub creator_id: UserId,
    pub buyer_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    /// Base units; zero while market-priced and not yet finalized.
    pub amount: TokenAmount,
    pub fee: TokenAmount,
    pub fiat_amount: FiatAmount,
    /// Value chosen by the taker of a range listing.
    pub range_fill: Option<FiatValue>,
    pub fiat_code: String,
    pub token_code: String,
    pub payment_method: String,
    pub buyer_address: Option<String>,
    pub keys: Option<EscrowKeys>,
    pub taken_at: Option<DateTime<Utc>>,
    pub tokens_held_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub buyer_cooperativecancel: bool,
    pub seller_cooperativecancel: bool,
    pub buyer_dispute: bool,
    pub seller_dispute: bool,
    pub canceled_by: Option<UserId>,
    pub range_parent_id: Option<OrderId>,
    pub price_from_api: bool,
    pub price_margin: Decimal,
    /// Set once a market-priced amount has been computed.
    pub amount_frozen: bool,
    pub funds_unlocked: bool,
    pub admin_warned: bool,
    pub community_id: Option<CommunityId>,
    /// Optimistic concurrency counter, bumped by the store on every save.
    pub version: u64,
}

impl Order {
    /// New PENDING listing with the creator's side filled in.
    pub fn new(
        kind: OrderKind,
        creator_id: UserId,
        token_code: impl Into<String>,
        fiat_code: impl Into<String>,
        fiat_amount: FiatAmount,
        payment_method: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (buyer_id, seller_id) = match kind {
            OrderKind::Buy => (Some(creator_id.clone()), None),
            OrderKind::Sell => (None, Some(creator_id.clone())),
        };
        Self {
            id: OrderId::new(),
            kind,
            status: OrderStatus::Pending,
            creator_id,
            buyer_id,
            seller_id,
            amount: TokenAmount::ZERO,
            fee: TokenAmount::ZERO,
            fiat_amount,
            range_fill: None,
            fiat_code: fiat_code.into(),
            token_code: token_code.into(),
            payment_method: payment_method.into(),
            buyer_address: None,
            keys: None,
            taken_at: None,
            tokens_held_at: None,
            created_at,
            buyer_cooperativecancel: false,
            seller_cooperativecancel: false,
            buyer_dispute: false,
            seller_dispute: false,
            canceled_by: None,
            range_parent_id: None,
            price_from_api: false,
            price_margin: Decimal::ZERO,
            amount_frozen: false,
            funds_unlocked: false,
            admin_warned: false,
            community_id: None,
            version: 0,
        }
    }

    /// Move to `to`, enforcing the transition table.
    pub fn transition(&mut self, to: OrderStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(CoreError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn party(&self, role: Role) -> Option<&UserId> {
        match role {
            Role::Buyer => self.buyer_id.as_ref(),
            Role::Seller => self.seller_id.as_ref(),
        }
    }

    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        if self.buyer_id.as_ref() == Some(user) {
            Some(Role::Buyer)
        } else if self.seller_id.as_ref() == Some(user) {
            Some(Role::Seller)
        } else {
            None
        }
    }

    pub fn taker_id(&self) -> Option<&UserId> {
        self.party(self.kind.taker_role())
    }

    pub fn is_creator(&self, user: &UserId) -> bool {
        &self.creator_id == user
    }

    pub fn coop_flag(&self, role: Role) -> bool {
        match role {
            Role::Buyer => self.buyer_cooperativecancel,
            Role::Seller => self.seller_cooperativecancel,
        }
    }

    pub fn raise_coop_flag(&mut self, role: Role) {
        match role {
            Role::Buyer => self.buyer_cooperativecancel = true,
            Role::Seller => self.seller_cooperativecancel = true,
        }
    }

    pub fn raise_dispute_flag(&mut self, role: Role) {
        match role {
            Role::Buyer => self.buyer_dispute = true,
            Role::Seller => self.seller_dispute = true,
        }
    }

    /// Fiat value actually traded: the fixed amount, or the taker's choice
    /// on a range listing.
    pub fn effective_fiat_amount(&self) -> Option<FiatValue> {
        match self.fiat_amount {
            FiatAmount::Fixed { value } => Some(value),
            FiatAmount::Range { .. } => self.range_fill,
        }
    }

    /// Market-priced and not yet computed.
    pub fn needs_amount_finalization(&self) -> bool {
        self.price_from_api && !self.amount_frozen
    }

    /// Freeze the amount exactly once.
    pub fn freeze_amount(&mut self, amount: TokenAmount, fee: TokenAmount) -> Result<()> {
        if self.amount_frozen {
            return Err(CoreError::InvalidAmount(format!(
                "order {} amount already frozen at {}",
                self.id, self.amount
            )));
        }
        self.amount = amount;
        self.fee = fee;
        self.amount_frozen = true;
        Ok(())
    }

    /// Clear every per-attempt field so the listing can be offered again.
    ///
    /// Status is left to the caller.
    pub fn reset_for_republish(&mut self) {
        match self.kind.taker_role() {
            Role::Buyer => {
                self.buyer_id = None;
                self.buyer_address = None;
            }
            Role::Seller => self.seller_id = None,
        }
        self.taken_at = None;
        self.range_fill = None;
        self.keys = None;
        if self.price_from_api {
            self.amount = TokenAmount::ZERO;
            self.fee = TokenAmount::ZERO;
            self.amount_frozen = false;
        }
        self.buyer_cooperativecancel = false;
        self.seller_cooperativecancel = false;
        self.buyer_dispute = false;
        self.seller_dispute = false;
    }
}
