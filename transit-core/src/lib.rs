pub mod hold;
pub mod identity;
pub mod ledger;
pub mod payment;
pub mod quota;
pub mod repository;
pub mod ticket;
pub mod trip;

use transit_shared::Money;
use uuid::Uuid;

/// Coarse grouping of engine failures. Callers branch on this rather than on
/// individual variants when deciding whether to retry, report or alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any mutation. Not retried.
    Validation,
    /// Expected outcome of concurrent access to a finite resource.
    Contention,
    /// The effect was already applied under the same reference.
    Idempotency,
    NotFound,
    Forbidden,
    /// Store or runtime failure; the transaction was rolled back.
    Infrastructure,
    /// An invariant was found broken. Alerting, never auto-corrected.
    Consistency,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Booking window for trip {trip_id} is closed")]
    BookingWindowClosed { trip_id: Uuid },

    #[error("Trip {trip_id} is cancelled")]
    TripCancelled { trip_id: Uuid },

    #[error("Weekly quota exceeded: {used} of {limit} used, {requested} requested")]
    QuotaExceeded { limit: i32, used: i64, requested: i64 },

    #[error("Booking for dependents is not allowed for this role")]
    DependentBookingNotAllowed,

    #[error("Invalid seat count {requested}: must be between 1 and {max}")]
    InvalidSeatCount { requested: i32, max: i32 },

    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Hold {hold_id} has expired")]
    HoldExpired { hold_id: Uuid },

    #[error("Ticket {ticket_id} can no longer be cancelled")]
    CancellationWindowClosed { ticket_id: Uuid },

    #[error("Batch contains no items")]
    EmptyBatch,

    #[error("Hold {hold_id} appears more than once in the batch")]
    DuplicateBatchItem { hold_id: Uuid },

    #[error("Passenger name is required for hold {hold_id}")]
    MissingPassengerName { hold_id: Uuid },

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("No seats available on trip {trip_id}: requested {requested}")]
    NoSeatsAvailable { trip_id: Uuid, requested: i32 },

    #[error("Insufficient funds in wallet {wallet_id}: balance {balance}, required {required}")]
    InsufficientFunds { wallet_id: Uuid, balance: Money, required: Money },

    #[error("Idempotency key already used: {reference_id}")]
    DuplicateIdempotencyKey { reference_id: String },

    #[error("Ledger entry already recorded for wallet {wallet_id}: {reference_id}")]
    DuplicateLedgerEntry { wallet_id: Uuid, reference_id: String },

    #[error("Trip not found: {0}")]
    TripNotFound(Uuid),

    #[error("Hold not found: {0}")]
    HoldNotFound(Uuid),

    #[error("Ticket not found: {0}")]
    TicketNotFound(Uuid),

    #[error("Wallet not found: {0}")]
    WalletNotFound(Uuid),

    #[error("Hold {0} belongs to another user")]
    HoldNotOwned(Uuid),

    #[error("Ticket {0} belongs to another user")]
    TicketNotOwned(Uuid),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Operation exceeded its deadline of {millis}ms")]
    Timeout { millis: u64 },

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        use EngineError::*;
        match self {
            BookingWindowClosed { .. }
            | TripCancelled { .. }
            | QuotaExceeded { .. }
            | DependentBookingNotAllowed
            | InvalidSeatCount { .. }
            | InvalidTransfer(_)
            | InvalidAmount(_)
            | HoldExpired { .. }
            | CancellationWindowClosed { .. }
            | EmptyBatch
            | DuplicateBatchItem { .. }
            | MissingPassengerName { .. }
            | UnknownValue { .. } => ErrorClass::Validation,
            NoSeatsAvailable { .. } | InsufficientFunds { .. } => ErrorClass::Contention,
            DuplicateIdempotencyKey { .. } | DuplicateLedgerEntry { .. } => ErrorClass::Idempotency,
            TripNotFound(_) | HoldNotFound(_) | TicketNotFound(_) | WalletNotFound(_) => {
                ErrorClass::NotFound
            }
            HoldNotOwned(_) | TicketNotOwned(_) => ErrorClass::Forbidden,
            Database(_) | Timeout { .. } => ErrorClass::Infrastructure,
            ConsistencyViolation(_) => ErrorClass::Consistency,
        }
    }

    /// Stable machine-readable code, safe to hand to clients and to use as a
    /// metrics label.
    pub fn code(&self) -> &'static str {
        use EngineError::*;
        match self {
            BookingWindowClosed { .. } => "BOOKING_WINDOW_CLOSED",
            TripCancelled { .. } => "TRIP_CANCELLED",
            QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            DependentBookingNotAllowed => "DEPENDENT_BOOKING_NOT_ALLOWED",
            InvalidSeatCount { .. } => "INVALID_SEAT_COUNT",
            InvalidTransfer(_) => "INVALID_TRANSFER",
            InvalidAmount(_) => "INVALID_AMOUNT",
            HoldExpired { .. } => "HOLD_EXPIRED",
            CancellationWindowClosed { .. } => "CANCELLATION_WINDOW_CLOSED",
            EmptyBatch => "EMPTY_BATCH",
            DuplicateBatchItem { .. } => "DUPLICATE_BATCH_ITEM",
            MissingPassengerName { .. } => "MISSING_PASSENGER_NAME",
            UnknownValue { .. } => "UNKNOWN_VALUE",
            NoSeatsAvailable { .. } => "NO_SEATS_AVAILABLE",
            InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            DuplicateIdempotencyKey { .. } => "DUPLICATE_IDEMPOTENCY_KEY",
            DuplicateLedgerEntry { .. } => "DUPLICATE_LEDGER_ENTRY",
            TripNotFound(_) => "TRIP_NOT_FOUND",
            HoldNotFound(_) => "HOLD_NOT_FOUND",
            TicketNotFound(_) => "TICKET_NOT_FOUND",
            WalletNotFound(_) => "WALLET_NOT_FOUND",
            HoldNotOwned(_) => "HOLD_NOT_OWNED",
            TicketNotOwned(_) => "TICKET_NOT_OWNED",
            Database(_) => "INTERNAL_ERROR",
            Timeout { .. } => "TIMEOUT",
            ConsistencyViolation(_) => "CONSISTENCY_VIOLATION",
        }
    }

    /// HTTP-like severity. The engine does not depend on any transport; the API
    /// layer turns this into a real status code.
    pub fn status(&self) -> u16 {
        match self.class() {
            ErrorClass::Validation => match self {
                EngineError::HoldExpired { .. } => 410,
                EngineError::QuotaExceeded { .. } => 429,
                _ => 400,
            },
            ErrorClass::Contention => match self {
                EngineError::InsufficientFunds { .. } => 402,
                _ => 409,
            },
            ErrorClass::Idempotency => 409,
            ErrorClass::NotFound => 404,
            ErrorClass::Forbidden => 403,
            ErrorClass::Infrastructure => match self {
                EngineError::Timeout { .. } => 504,
                _ => 500,
            },
            ErrorClass::Consistency => 500,
        }
    }

    pub fn is_idempotent_replay(&self) -> bool {
        self.class() == ErrorClass::Idempotency
    }

    /// Message safe to show to clients. Infrastructure and consistency details
    /// stay in the logs.
    pub fn public_message(&self) -> String {
        match self.class() {
            ErrorClass::Infrastructure | ErrorClass::Consistency => match self {
                EngineError::Timeout { .. } => "Request timed out".to_string(),
                _ => "Internal Server Error".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
