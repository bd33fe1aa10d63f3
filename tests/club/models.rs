use optimistic_rust::Entity;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
pub struct Reservation {
    pub id: String,
    pub court: String,
    pub price_cents: i64,
    pub paid: bool,
}

impl Reservation {
    pub fn new(id: &str, price_cents: i64) -> Self {
        Self {
            id: id.into(),
            court: "1".into(),
            price_cents,
            paid: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "ledger")]
pub struct LedgerEntry {
    pub id: String,
    pub reservation_id: String,
    pub amount_cents: i64,
}
