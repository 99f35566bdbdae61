use crate::{
    slot::Slot,
    store::{KvStore, StoreError},
    types::BookingRecord,
};
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

const BOOKING_PREFIX: &str = "booking:";
const SLOT_PREFIX: &str = "slot:";

fn booking_key(id: &str) -> String {
    format!("{BOOKING_PREFIX}{id}")
}

fn slot_key(date: NaiveDate, slot: Slot) -> String {
    format!("{SLOT_PREFIX}{date}:{}", slot.hour())
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{date} {slot} is already booked")]
    SlotTaken { date: NaiveDate, slot: Slot },
    #[error("booking {id} already exists for another slot")]
    IdInUse { id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What is stored under the id of a booking about to be persisted.
#[derive(Debug, PartialEq, Eq)]
enum StoredRecord {
    Absent,
    SameSlot,
    OtherSlot,
}

/// Booking records on top of a key-value store.
///
/// Every record lives under `booking:{id}`. Its `(date, hour)` pair is claimed
/// under `slot:{date}:{hour}` with a write-if-absent before the record itself
/// is written, so two records can never share a slot. A record id is bound to
/// one slot for good.
#[derive(Debug, Clone)]
pub struct BookingStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> BookingStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All bookings, ordered by date and slot.
    pub fn list(&self) -> Result<Vec<BookingRecord>, StoreError> {
        let mut bookings: Vec<BookingRecord> = self
            .store
            .scan_prefix(BOOKING_PREFIX)?
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(booking) => Some(booking),
                Err(err) => {
                    warn!(?err, "Skipping malformed booking entry");
                    None
                }
            })
            .collect();
        bookings.sort_by_key(|booking: &BookingRecord| (booking.date, booking.hour));
        Ok(bookings)
    }

    fn stored_record(&self, booking: &BookingRecord) -> Result<StoredRecord, StoreError> {
        let Some(value) = self.store.get(&booking_key(&booking.id))? else {
            return Ok(StoredRecord::Absent);
        };
        match serde_json::from_value::<BookingRecord>(value) {
            Ok(stored) if stored.occupies(booking.date, booking.hour) => Ok(StoredRecord::SameSlot),
            _ => Ok(StoredRecord::OtherSlot),
        }
    }

    pub fn persist(&self, booking: &BookingRecord) -> Result<(), PersistError> {
        match self.stored_record(booking)? {
            StoredRecord::OtherSlot => {
                warn!(id = %booking.id, "Booking id reused for another slot");
                return Err(PersistError::IdInUse {
                    id: booking.id.clone(),
                });
            }
            // A retry of the very same record after a lost response.
            StoredRecord::SameSlot => return Ok(()),
            StoredRecord::Absent => {}
        }

        let claim = slot_key(booking.date, booking.hour);
        let owner = Value::String(booking.id.clone());

        if !self.store.set_if_absent(&claim, owner.clone())? {
            // Left behind by an attempt of this record whose write failed.
            if self.store.get(&claim)?.as_ref() != Some(&owner) {
                warn!(date = %booking.date, slot = %booking.hour, "Slot already booked");
                return Err(PersistError::SlotTaken {
                    date: booking.date,
                    slot: booking.hour,
                });
            }
        }

        let record = serde_json::to_value(booking).map_err(StoreError::from)?;
        let written = match self.store.set_if_absent(&booking_key(&booking.id), record) {
            Ok(written) => written,
            Err(err) => {
                error!(?err, id = %booking.id, "Failed to write booking, releasing slot");
                self.release(&claim);
                return Err(err.into());
            }
        };

        if !written && self.stored_record(booking)? != StoredRecord::SameSlot {
            warn!(id = %booking.id, "Booking id taken concurrently for another slot");
            self.release(&claim);
            return Err(PersistError::IdInUse {
                id: booking.id.clone(),
            });
        }

        info!(id = %booking.id, date = %booking.date, slot = %booking.hour, "Booking saved");
        Ok(())
    }

    fn release(&self, claim: &str) {
        if let Err(err) = self.store.remove(claim) {
            error!(?err, %claim, "Failed to release slot claim");
        }
    }
}
