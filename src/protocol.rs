//! JSON bodies exchanged between booking clients and the server.
//!
//! Request types received by the server keep every field optional so that a
//! missing field reaches validation and is answered with `400` instead of
//! being rejected by the JSON extractor. Bodies that are not valid JSON or
//! carry a field of the wrong type are answered with `400` as well.

use crate::{slot::Slot, types::BookingRecord};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const MISSING_FIELDS: &str = "Missing required fields";
pub const EMAIL_NOT_CONFIGURED: &str = "Email service not configured";
pub const SLOT_ALREADY_BOOKED: &str = "Slot already booked";
pub const BOOKING_ID_IN_USE: &str = "Booking id already used for another slot";
pub const INVALID_BODY: &str = "Invalid request body";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListBookingsResponse {
    pub bookings: Vec<BookingRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[validate(required, length(min = 1))]
    pub id: Option<String>,
    #[validate(required, length(min = 1))]
    pub date: Option<String>,
    #[validate(required)]
    pub hour: Option<u8>,
    #[validate(required, length(min = 1))]
    pub client_name: Option<String>,
    #[validate(required, length(min = 1))]
    pub client_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking: BookingRecord,
}

/// Booking confirmation sent to the operator.
///
/// `date` is already formatted for display; `slots` are plain hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotification {
    pub client_name: String,
    pub client_email: String,
    pub date: String,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendBookingEmailRequest {
    #[validate(required, length(min = 1))]
    pub client_name: Option<String>,
    #[validate(required, length(min = 1))]
    pub client_email: Option<String>,
    #[validate(required, length(min = 1))]
    pub date: Option<String>,
    #[validate(required, length(min = 1))]
    pub slots: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBookingEmailResponse {
    pub success: bool,
    pub email_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
