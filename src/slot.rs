use serde::{Deserialize, Serialize};
use std::fmt;

/// Hour boundaries of the service window, 10:00 until 02:00 the next day.
/// Slot `n` starts at `BOUNDARIES[n]` and ends at `BOUNDARIES[n + 1]`.
const BOUNDARIES: [u8; 17] = [10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 0, 1, 2];

pub const SLOT_COUNT: usize = BOUNDARIES.len() - 1;

/// One bookable hour of the service window.
///
/// Ordering follows the service window, so `23 < 0 < 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Slot {
    position: u8,
}

impl Slot {
    pub fn from_hour(hour: u8) -> Option<Slot> {
        BOUNDARIES[..SLOT_COUNT]
            .iter()
            .position(|&boundary| boundary == hour)
            .map(|position| Slot {
                position: position as u8,
            })
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (0..SLOT_COUNT as u8).map(|position| Slot { position })
    }

    pub fn hour(&self) -> u8 {
        BOUNDARIES[self.position as usize]
    }

    pub fn end_hour(&self) -> u8 {
        BOUNDARIES[self.position as usize + 1]
    }

    /// The slot following this one inside the service window, if any.
    pub fn next(&self) -> Option<Slot> {
        let position = self.position + 1;
        (usize::from(position) < SLOT_COUNT).then_some(Slot { position })
    }

    pub fn end_label(&self) -> String {
        format!("{}h", self.end_hour())
    }

    /// Human readable range, e.g. `23h00 - 0h00`.
    pub fn label(&self) -> String {
        format!("{}h00 - {}00", self.hour(), self.end_label())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.hour())
    }
}

impl TryFrom<u8> for Slot {
    type Error = String;

    fn try_from(hour: u8) -> Result<Self, Self::Error> {
        Slot::from_hour(hour).ok_or_else(|| format!("{hour} is not a bookable hour"))
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        slot.hour()
    }
}
