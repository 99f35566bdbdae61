use crate::{
    protocol::{
        BookingNotification, ErrorBody, ListBookingsResponse, SendBookingEmailResponse,
        EMAIL_NOT_CONFIGURED,
    },
    types::BookingRecord,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request rejected: {0}")]
    Validation(String),
    #[error("slot already booked")]
    SlotTaken,
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Persistence(String),
    #[error("email not sent: {0}")]
    Notification(String),
    #[error("email service not configured")]
    NotConfigured,
    #[error("unexpected response {status}: {body}")]
    Unexpected { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
}

/// Client side of the booking protocol.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, SyncError>;
    async fn persist_booking(&self, booking: &BookingRecord) -> Result<(), SyncError>;
    /// Returns the delivery id of the sent email.
    async fn notify(&self, notification: &BookingNotification) -> Result<String, SyncError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Bookings,
    Email,
}

#[derive(Debug, Clone)]
pub struct HttpBookingApi {
    client: Client,
    base_url: String,
    access_token: String,
}

impl HttpBookingApi {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

async fn error_from_response(response: Response, endpoint: Endpoint) -> SyncError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_else(|_| ErrorBody {
        error: text.clone(),
        ..Default::default()
    });
    error!(%status, error = %body.error, "Booking server returned an error");

    match status {
        StatusCode::BAD_REQUEST => SyncError::Validation(body.error),
        StatusCode::UNAUTHORIZED => SyncError::Unauthorized(body.error),
        StatusCode::CONFLICT => SyncError::SlotTaken,
        StatusCode::INTERNAL_SERVER_ERROR if body.error == EMAIL_NOT_CONFIGURED => {
            SyncError::NotConfigured
        }
        StatusCode::INTERNAL_SERVER_ERROR => match endpoint {
            Endpoint::Email => {
                SyncError::Notification(body.details.or(body.message).unwrap_or(body.error))
            }
            Endpoint::Bookings => SyncError::Persistence(match body.message {
                Some(message) => format!("{}: {message}", body.error),
                None => body.error,
            }),
        },
        status => SyncError::Unexpected {
            status: status.as_u16(),
            body: text,
        },
    }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, SyncError> {
        let response = self
            .client
            .get(self.url("bookings"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, Endpoint::Bookings).await);
        }

        let body: ListBookingsResponse = response.json().await?;
        debug!(bookings = body.bookings.len(), "Fetched bookings");
        Ok(body.bookings)
    }

    async fn persist_booking(&self, booking: &BookingRecord) -> Result<(), SyncError> {
        let response = self
            .client
            .post(self.url("bookings"))
            .bearer_auth(&self.access_token)
            .json(booking)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, Endpoint::Bookings).await);
        }
        Ok(())
    }

    async fn notify(&self, notification: &BookingNotification) -> Result<String, SyncError> {
        let response = self
            .client
            .post(self.url("send-booking-email"))
            .bearer_auth(&self.access_token)
            .json(notification)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, Endpoint::Email).await);
        }

        let body: SendBookingEmailResponse = response.json().await?;
        Ok(body.email_id)
    }
}
