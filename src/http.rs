use crate::{
    bookings::BookingStore,
    configuration::Configuration,
    error::ApiError,
    notification::{Mailer, NotificationDispatcher, ResendMailer},
    protocol::{
        BookingNotification, CreateBookingRequest, CreateBookingResponse, HealthResponse,
        ListBookingsResponse, SendBookingEmailRequest, SendBookingEmailResponse, MISSING_FIELDS,
    },
    slot::Slot,
    store::KvStore,
    types::BookingRecord,
};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use validator::Validate;

#[derive(Clone)]
pub struct AppState<S: KvStore> {
    bookings: BookingStore<S>,
    dispatcher: NotificationDispatcher,
}

#[derive(Clone)]
struct AccessToken(Arc<str>);

pub fn create_app<S: KvStore>(store: S, configuration: impl Configuration) -> Router {
    let mailer = configuration.email_api_key().map(|api_key| {
        Arc::new(ResendMailer::new(configuration.email_api_url(), api_key)) as Arc<dyn Mailer>
    });
    if mailer.is_none() {
        warn!("No email API key configured, booking notifications will fail");
    }
    create_app_with_mailer(store, mailer, configuration)
}

pub fn create_app_with_mailer<S: KvStore>(
    store: S,
    mailer: Option<Arc<dyn Mailer>>,
    configuration: impl Configuration,
) -> Router {
    let state = AppState {
        bookings: BookingStore::new(store),
        dispatcher: NotificationDispatcher::new(
            mailer,
            configuration.email_sender(),
            configuration.operator_email(),
        ),
    };
    let access_token = AccessToken(configuration.access_token().into());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(600));

    Router::new()
        .route("/health", get(health))
        .route(
            "/bookings",
            get(list_bookings::<S>).post(create_booking::<S>),
        )
        .route("/send-booking-email", post(send_booking_email::<S>))
        .route_layer(middleware::from_fn_with_state(access_token, require_bearer))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn require_bearer(
    State(access_token): State<AccessToken>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return Err(ApiError::Unauthorized("Missing credentials"));
    };

    let provided = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "));
    if provided != Some(&*access_token.0) {
        warn!("Request with invalid access token");
        return Err(ApiError::Unauthorized("Unauthorized"));
    }
    Ok(next.run(request).await)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn list_bookings<S: KvStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<ListBookingsResponse>, ApiError> {
    let bookings = state.bookings.list().map_err(ApiError::fetch_failed)?;
    Ok(Json(ListBookingsResponse { bookings }))
}

async fn create_booking<S: KvStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<Json<CreateBookingResponse>, ApiError> {
    let Json(request) = payload?;
    let booking = booking_from_request(request)?;
    state.bookings.persist(&booking)?;
    Ok(Json(CreateBookingResponse {
        success: true,
        booking,
    }))
}

fn booking_from_request(request: CreateBookingRequest) -> Result<BookingRecord, ApiError> {
    if let Err(err) = request.validate() {
        warn!(?err, "Rejected booking request");
        return Err(ApiError::Validation(MISSING_FIELDS.into()));
    }
    let (Some(id), Some(date), Some(hour), Some(client_name), Some(client_email)) = (
        request.id,
        request.date,
        request.hour,
        request.client_name,
        request.client_email,
    ) else {
        return Err(ApiError::Validation(MISSING_FIELDS.into()));
    };

    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("Invalid date: {date}")))?;
    let hour = Slot::try_from(hour).map_err(ApiError::Validation)?;

    Ok(BookingRecord {
        id,
        date,
        hour,
        client_name,
        client_email,
    })
}

async fn send_booking_email<S: KvStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<SendBookingEmailRequest>, JsonRejection>,
) -> Result<Json<SendBookingEmailResponse>, ApiError> {
    let Json(request) = payload?;
    let notification = notification_from_request(request)?;
    info!(
        client = %notification.client_name,
        slots = notification.slots.len(),
        "Sending booking email"
    );

    let email_id = state.dispatcher.dispatch(&notification).await?;
    Ok(Json(SendBookingEmailResponse {
        success: true,
        email_id,
    }))
}

fn notification_from_request(
    request: SendBookingEmailRequest,
) -> Result<BookingNotification, ApiError> {
    if let Err(err) = request.validate() {
        warn!(?err, "Rejected booking email request");
        return Err(ApiError::Validation(MISSING_FIELDS.into()));
    }
    let (Some(client_name), Some(client_email), Some(date), Some(hours)) = (
        request.client_name,
        request.client_email,
        request.date,
        request.slots,
    ) else {
        return Err(ApiError::Validation(MISSING_FIELDS.into()));
    };

    let slots = hours
        .into_iter()
        .map(Slot::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::Validation)?;

    Ok(BookingNotification {
        client_name,
        client_email,
        date,
        slots,
    })
}
