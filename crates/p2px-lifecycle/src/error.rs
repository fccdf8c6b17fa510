//! Lifecycle error types.

use p2px_core::{CoreError, FiatValue, OrderStatus};
use p2px_gateway::GatewayError;
use p2px_store::StoreError;
use thiserror::Error;

/// Guard failures reported back to the acting user. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("You cannot take your own order")]
    OwnOrder,

    #[error("Order already taken")]
    AlreadyTaken,

    #[error("You already have an order waiting for payment or an address")]
    HasWaitingOrder,

    #[error("You have an order in FIAT_SENT that must be resolved first")]
    SellerHasFiatSent,

    #[error("You are banned from this community")]
    Banned,

    #[error("You are not a party to this order")]
    NotAParty,

    #[error("Only the taker can do this")]
    NotTaker,

    #[error("Order is {status}")]
    WrongStatus { status: OrderStatus },

    #[error("A fiat amount must be chosen first")]
    FiatAmountRequired,

    #[error("Fiat amount {value} outside {min}-{max}")]
    FiatAmountOutOfRange {
        value: FiatValue,
        min: FiatValue,
        max: FiatValue,
    },

    #[error("Invalid fiat amount: {0}")]
    InvalidFiatAmount(String),

    #[error("Order is not a range order")]
    NotARangeOrder,

    #[error("Range orders must be market priced")]
    RangeNeedsMarketPrice,

    #[error("Amount is already frozen")]
    AmountFrozen,

    #[error("Unknown token {0}")]
    UnknownToken(String),

    #[error("Market price unavailable: {0}")]
    MarketPriceUnavailable(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("A buyer address is required")]
    BuyerAddressRequired,

    #[error("Seller already released the tokens")]
    SellerAlreadyReleased,

    #[error("Waiting for the buyer to send an address")]
    WaitingForBuyer,

    #[error("Funds were already unlocked")]
    FundsAlreadyUnlocked,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Rejected: {0}")]
    Validation(#[from] Rejection),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    External(String),
}

impl LifecycleError {
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Validation(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<StoreError> for LifecycleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::VersionConflict { .. } | StoreError::DuplicateKey(_) => {
                Self::Conflict(e.to_string())
            }
            StoreError::Backend(msg) => Self::External(msg),
        }
    }
}

impl From<GatewayError> for LifecycleError {
    fn from(e: GatewayError) -> Self {
        Self::External(e.to_string())
    }
}

impl From<CoreError> for LifecycleError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::IllegalTransition { from, .. } => {
                Self::Validation(Rejection::WrongStatus { status: from })
            }
            CoreError::UnknownToken(code) => Self::Validation(Rejection::UnknownToken(code)),
            CoreError::InvalidId(id) => Self::NotFound(id),
            CoreError::InvalidAmount(_) => Self::Validation(Rejection::AmountFrozen),
            CoreError::InvalidFiatAmount(msg) => {
                Self::Validation(Rejection::InvalidFiatAmount(msg))
            }
            CoreError::DecimalParse(e) => {
                Self::Validation(Rejection::InvalidFiatAmount(e.to_string()))
            }
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
