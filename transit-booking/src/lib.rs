pub mod coordinator;
pub mod deadline;
pub mod scheduler;
pub mod wallet_service;

pub use coordinator::{BookingCoordinator, Cancellation, ConfirmedTicket};
pub use deadline::with_deadline;
pub use scheduler::{CleanupScheduler, SchedulerHandle};
pub use wallet_service::WalletService;
