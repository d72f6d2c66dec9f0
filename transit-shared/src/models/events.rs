use uuid::Uuid;

use crate::money::Money;

pub const TOPIC_TICKET_CONFIRMED: &str = "tickets.confirmed";
pub const TOPIC_TICKET_CANCELLED: &str = "tickets.cancelled";
pub const TOPIC_WALLET_TOPPED_UP: &str = "wallets.topped_up";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TicketConfirmedEvent {
    pub ticket_id: Uuid,
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub ticket_code: String,
    pub price_paid: Money,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct TicketCancelledEvent {
    pub ticket_id: Uuid,
    pub trip_id: Uuid,
    pub user_id: Uuid,
    pub refunded: Money,
    pub removed_by_admin: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct WalletToppedUpEvent {
    pub user_id: Uuid,
    pub amount: Money,
    pub reference_id: String,
    pub method: String,
    pub timestamp: i64,
}
