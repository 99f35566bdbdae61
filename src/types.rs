use crate::slot::Slot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    pub id: String,
    pub date: NaiveDate,
    pub hour: Slot,
    pub client_name: String,
    pub client_email: String,
}

impl BookingRecord {
    pub fn new(date: NaiveDate, hour: Slot, client_name: &str, client_email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date,
            hour,
            client_name: client_name.into(),
            client_email: client_email.into(),
        }
    }

    pub fn occupies(&self, date: NaiveDate, hour: Slot) -> bool {
        self.date == date && self.hour == hour
    }
}
