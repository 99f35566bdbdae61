use crate::{
    bookings::PersistError,
    notification::NotificationError,
    protocol::{
        ErrorBody, BOOKING_ID_IN_USE, EMAIL_NOT_CONFIGURED, INVALID_BODY, SLOT_ALREADY_BOOKED,
    },
    store::StoreError,
};
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by HTTP handlers, rendered as `{error, message?, details?}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("Slot already booked")]
    SlotTaken,
    #[error("{error}: {message}")]
    Persistence { error: &'static str, message: String },
    #[error("Email service not configured")]
    NotConfigured,
    #[error("Failed to send email: {0}")]
    Notification(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::SlotTaken => StatusCode::CONFLICT,
            ApiError::Persistence { .. } | ApiError::NotConfigured | ApiError::Notification(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn fetch_failed(err: StoreError) -> Self {
        error!(?err, "Error fetching bookings");
        ApiError::Persistence {
            error: "Failed to fetch bookings",
            message: err.to_string(),
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Validation(error) => ErrorBody {
                error: error.clone(),
                ..Default::default()
            },
            ApiError::MalformedBody(message) => ErrorBody {
                error: INVALID_BODY.into(),
                message: Some(message.clone()),
                details: None,
            },
            ApiError::Unauthorized(error) => ErrorBody {
                error: (*error).into(),
                ..Default::default()
            },
            ApiError::SlotTaken => ErrorBody {
                error: SLOT_ALREADY_BOOKED.into(),
                ..Default::default()
            },
            ApiError::Persistence { error, message } => ErrorBody {
                error: (*error).into(),
                message: Some(message.clone()),
                details: None,
            },
            ApiError::NotConfigured => ErrorBody {
                error: EMAIL_NOT_CONFIGURED.into(),
                ..Default::default()
            },
            ApiError::Notification(details) => ErrorBody {
                error: "Failed to send email".into(),
                message: None,
                details: Some(details.clone()),
            },
        }
    }
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::SlotTaken { .. } => ApiError::SlotTaken,
            PersistError::IdInUse { .. } => ApiError::Validation(BOOKING_ID_IN_USE.into()),
            PersistError::Store(err) => {
                error!(?err, "Error saving booking");
                ApiError::Persistence {
                    error: "Failed to save booking",
                    message: err.to_string(),
                }
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(%rejection, "Rejected request body");
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotConfigured => ApiError::NotConfigured,
            NotificationError::Rejected(details) | NotificationError::Transport(details) => {
                ApiError::Notification(details)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
