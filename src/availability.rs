use crate::{slot::Slot, types::BookingRecord};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    Booked,
    Selected,
    Free,
}

/// Status of every slot of `date`, in service-window order.
///
/// A slot that is already booked reports `Booked` even if it is part of the
/// local selection.
pub fn availability(
    snapshot: &[BookingRecord],
    date: NaiveDate,
    selection: &[Slot],
) -> Vec<(Slot, SlotStatus)> {
    Slot::all()
        .map(|slot| (slot, slot_status(snapshot, date, selection, slot)))
        .collect()
}

pub fn slot_status(
    snapshot: &[BookingRecord],
    date: NaiveDate,
    selection: &[Slot],
    slot: Slot,
) -> SlotStatus {
    if is_booked(snapshot, date, slot) {
        SlotStatus::Booked
    } else if selection.contains(&slot) {
        SlotStatus::Selected
    } else {
        SlotStatus::Free
    }
}

pub fn is_booked(snapshot: &[BookingRecord], date: NaiveDate, slot: Slot) -> bool {
    snapshot.iter().any(|booking| booking.occupies(date, slot))
}
