use crate::{protocol::BookingNotification, slot::Slot};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

const WEEKDAYS: [&str; 7] = [
    "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
];
const MONTHS: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août", "septembre",
    "octobre", "novembre", "décembre",
];

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("email service not configured")]
    NotConfigured,
    #[error("email provider rejected the message: {0}")]
    Rejected(String),
    #[error("email provider unreachable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Delivers a rendered message and returns the provider's delivery id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<String, NotificationError>;
}

/// Long French date, e.g. `samedi 1 juin 2024`.
pub fn format_long_date(date: NaiveDate) -> String {
    format!(
        "{} {} {} {}",
        WEEKDAYS[date.weekday().num_days_from_monday() as usize],
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

/// One line per slot, ascending by hour.
pub fn format_slot_lines(slots: &[Slot]) -> String {
    let mut slots = slots.to_vec();
    slots.sort_by_key(Slot::hour);
    slots.dedup();
    slots
        .iter()
        .map(Slot::label)
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_email(notification: &BookingNotification, from: &str, to: &str) -> EmailMessage {
    let client_name = escape_html(&notification.client_name);
    let html = format!(
        r#"<h2 style="color: #c9a66b;">Nouvelle réservation Bain Nordique &amp; Sauna</h2>
<p style="background-color: #f0f0f0; padding: 10px; border-left: 4px solid #c9a66b;">
  <strong>Services réservés:</strong> Bain Nordique + Sauna (réservation simultanée)
</p>
<p><strong>Client:</strong> {client_name}</p>
<p><strong>Email:</strong> {}</p>
<p><strong>Date:</strong> {}</p>
<p><strong>Créneaux réservés:</strong></p>
<pre style="background-color: #f4f4f4; padding: 10px; border-radius: 5px;">{}</pre>
<p style="color: #666; font-size: 12px; margin-top: 20px;">
  <em>Cette réservation est gratuite et comprise dans le prix du séjour.</em>
</p>"#,
        escape_html(&notification.client_email),
        escape_html(&notification.date),
        format_slot_lines(&notification.slots),
    );

    EmailMessage {
        from: from.into(),
        to: vec![to.into()],
        subject: format!(
            "Nouvelle réservation Bain Nordique & Sauna - {}",
            notification.client_name
        ),
        html,
    }
}

/// Renders booking confirmations and hands them to the configured mailer.
///
/// Without a mailer every dispatch fails with `NotConfigured`.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Option<Arc<dyn Mailer>>,
    sender: String,
    recipient: String,
}

impl NotificationDispatcher {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, sender: String, recipient: String) -> Self {
        Self {
            mailer,
            sender,
            recipient,
        }
    }

    pub async fn dispatch(
        &self,
        notification: &BookingNotification,
    ) -> Result<String, NotificationError> {
        let Some(mailer) = &self.mailer else {
            error!("Email API key is not set");
            return Err(NotificationError::NotConfigured);
        };

        let message = render_email(notification, &self.sender, &self.recipient);
        let email_id = mailer.send(message).await?;
        info!(%email_id, "Booking email sent");
        Ok(email_id)
    }
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

/// Mailer backed by the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: EmailMessage) -> Result<String, NotificationError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|err| NotificationError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let details = response.text().await.unwrap_or_default();
            error!(%details, "Email provider returned an error");
            return Err(NotificationError::Rejected(details));
        }

        let body: ResendResponse = response
            .json()
            .await
            .map_err(|err| NotificationError::Transport(err.to_string()))?;
        Ok(body.id)
    }
}
