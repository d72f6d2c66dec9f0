pub mod app_config;
pub mod audit;
pub mod database;
pub mod error;
pub mod events;
pub mod hold_repo;
pub mod inventory_repo;
pub mod quota_repo;
pub mod system_wallets;
pub mod ticket_repo;
pub mod transfer;
pub mod wallet_repo;

pub use audit::InvariantAuditor;
pub use database::DbClient;
pub use events::EventProducer;
pub use hold_repo::{HoldRepository, PgHoldSweeper};
pub use inventory_repo::SeatInventory;
pub use quota_repo::QuotaRepository;
pub use system_wallets::SystemWalletRegistry;
pub use ticket_repo::TicketRepository;
pub use transfer::{TransactionExecutor, TransferReceipt};
pub use wallet_repo::WalletLedger;
