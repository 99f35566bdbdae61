use crate::{configuration::Configuration, slot::Slot};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, about = "Nordic bath & sauna booking")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the booking server
    Serve(ConfigurationHandler),
    /// Print the slots of a day
    Availability(AvailabilityArgs),
    /// Book one or more slots of a day
    Book(BookArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ConfigurationHandler {
    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,
    /// Bearer token shared by every client
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,
    /// Path of the SQLite database, bookings are impersistent without it
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    resend_api_key: Option<String>,
    #[arg(
        long,
        env = "RESEND_API_URL",
        default_value = "https://api.resend.com/emails"
    )]
    resend_api_url: String,
    #[arg(
        long,
        env = "EMAIL_SENDER",
        default_value = "Réservations Les Gîtes du Soulor <onboarding@resend.dev>"
    )]
    sender: String,
    /// Recipient of booking notifications
    #[arg(long, env = "OPERATOR_EMAIL")]
    operator_email: String,
}

#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    #[arg(long, env = "BOOKING_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    pub server_url: String,
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,
    /// Upper bound for every request to the server
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,
}

impl ClientArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Args)]
pub struct AvailabilityArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    #[arg(long)]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Args)]
pub struct BookArgs {
    #[command(flatten)]
    pub client: ClientArgs,
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long = "hour", required = true, value_parser = parse_slot)]
    pub hours: Vec<Slot>,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
}

fn parse_slot(value: &str) -> Result<Slot, String> {
    let hour: u8 = value
        .parse()
        .map_err(|_| format!("{value} is not an hour"))?;
    Slot::try_from(hour)
}

impl Cli {
    pub fn parse_arguments() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                eprintln!("Failed to load .env file: {err}");
            }
        }
        Cli::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> String {
        self.port.clone()
    }

    fn access_token(&self) -> String {
        self.access_token.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url
            .clone()
            .filter(|database_url| !database_url.is_empty())
    }

    fn email_api_key(&self) -> Option<String> {
        self.resend_api_key
            .clone()
            .filter(|api_key| !api_key.is_empty())
    }

    fn email_api_url(&self) -> String {
        self.resend_api_url.clone()
    }

    fn email_sender(&self) -> String {
        self.sender.clone()
    }

    fn operator_email(&self) -> String {
        self.operator_email.clone()
    }
}
