use crate::{
    availability::SlotStatus,
    configuration::Configuration,
    configuration_handler::{
        AvailabilityArgs, BookArgs, Cli, ClientArgs, Command, ConfigurationHandler,
    },
    database_interface::DatabaseInterface,
    http::create_app,
    memory_store::MemoryStore,
    session::{BookingSession, SessionWarning},
    sync_client::HttpBookingApi,
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod availability;
mod bookings;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod http;
mod memory_store;
mod notification;
mod protocol;
mod schema;
mod session;
mod slot;
mod store;
mod sync_client;
#[cfg(test)]
mod testutils;
mod types;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse_arguments();
    let result = match cli.command {
        Command::Serve(configuration) => serve(configuration).await,
        Command::Availability(args) => show_availability(args).await,
        Command::Book(args) => book(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(configuration: ConfigurationHandler) -> Result<(), String> {
    println!("############################");
    println!("# Bain Nordique & Sauna    #");
    println!("############################");

    let address = format!("0.0.0.0:{}", configuration.port());
    println!("Accessable at:\n{address}");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|err| format!("Failed to bind {address}: {err}"))?;

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = DatabaseInterface::new(&database_url).map_err(|err| {
            error!(?err, "Failed to open database: {database_url}");
            format!("Failed to open database {database_url}: {err}")
        })?;
        create_app(backend, configuration)
    } else {
        info!("No database configured, bookings are impersistent");
        create_app(MemoryStore::default(), configuration)
    };

    axum::serve(listener, app).await.map_err(|err| {
        error!(?err, "Server stopped");
        err.to_string()
    })
}

fn open_session(client: &ClientArgs) -> BookingSession<HttpBookingApi> {
    BookingSession::new(HttpBookingApi::new(
        client.server_url.clone(),
        client.access_token.clone(),
    ))
    .with_timeout(client.timeout())
}

async fn show_availability(args: AvailabilityArgs) -> Result<(), String> {
    let mut session = open_session(&args.client);
    session
        .refresh()
        .await
        .map_err(|err| format!("Could not load bookings: {err}"))?;
    session.select_date(args.date).map_err(|err| err.to_string())?;

    for (slot, status) in session.availability().map_err(|err| err.to_string())? {
        let status = match status {
            SlotStatus::Booked => "booked",
            SlotStatus::Selected => "selected",
            SlotStatus::Free => "free",
        };
        println!("{:<14} {status}", slot.label());
    }
    Ok(())
}

async fn book(args: BookArgs) -> Result<(), String> {
    let mut session = open_session(&args.client);
    session
        .refresh()
        .await
        .map_err(|err| format!("Could not load bookings: {err}"))?;
    session.select_date(args.date).map_err(|err| err.to_string())?;

    for slot in args.hours {
        if session.selection().contains(&slot) {
            continue;
        }
        if !session.toggle_slot(slot).map_err(|err| err.to_string())? {
            return Err(format!("{} is already booked", slot.label()));
        }
    }

    session
        .request_confirmation()
        .map_err(|err| err.to_string())?;
    session
        .set_client_details(&args.name, &args.email)
        .map_err(|err| err.to_string())?;

    let receipt = session.submit().await.map_err(|err| err.to_string())?;
    for booking in &receipt.bookings {
        println!(
            "Booked {} on {} ({})",
            booking.hour.label(),
            booking.date,
            booking.id
        );
    }
    for warning in receipt.warnings {
        match warning {
            SessionWarning::NotificationFailed(reason) => {
                println!("Booking saved, but the operator was not notified: {reason}")
            }
            SessionWarning::RefreshFailed(reason) => {
                println!("Booking saved, but bookings could not be reloaded: {reason}")
            }
        }
    }
    Ok(())
}
