use optimistic_rust::Entity;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
pub struct Reservation {
    pub id: String,
    pub court: String,
    pub date: String,
    pub client_id: String,
    pub status: String,
}

impl Reservation {
    pub fn new(id: &str, court: &str, client_id: &str) -> Self {
        Self {
            id: id.into(),
            court: court.into(),
            date: "2024-06-01".into(),
            client_id: client_id.into(),
            status: "pending".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Entity)]
#[entity(collection = "club_clients")]
pub struct Client {
    #[entity(id)]
    pub code: String,
    pub name: String,
    pub status: String,
}

impl Client {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            status: "pending".into(),
        }
    }
}
