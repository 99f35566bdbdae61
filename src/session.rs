//! Client-side booking session.
//!
//! A [`BookingSession`] owns everything one client needs to book slots: the
//! last fetched booking snapshot, the chosen date, the local slot selection and
//! the details typed into the confirmation dialog. It is driven through
//! explicit commands and moves through these states:
//!
//! ```text
//! Browsing -> Selecting -> ReadyToConfirm -> Submitting -> Confirmed
//!                                                      \-> SubmitFailed
//! ```
//!
//! Submission writes one booking per selected slot, one after the other, and
//! stops at the first failure. Slots written before the failure stay booked.
//! Retrying from `SubmitFailed` only sends the bookings that were not written
//! yet. A slot someone else took in the meantime is dropped from both the
//! selection and the retry. Every request is bounded by the session timeout.

use crate::{
    availability::{availability, is_booked, SlotStatus},
    notification::format_long_date,
    protocol::BookingNotification,
    slot::Slot,
    sync_client::{BookingApi, SyncError},
    types::BookingRecord,
};
use chrono::NaiveDate;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Browsing,
    Selecting,
    ReadyToConfirm,
    Submitting,
    Confirmed,
    SubmitFailed(SubmitFailure),
}

impl SessionState {
    /// Whether the confirmation dialog is open.
    pub fn is_confirming(&self) -> bool {
        matches!(
            self,
            SessionState::ReadyToConfirm | SessionState::Submitting | SessionState::SubmitFailed(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitFailure {
    #[error("booking {slot} failed: {message}")]
    Persistence { slot: Slot, message: String },
    #[error("{0} was booked by someone else in the meantime")]
    SlotTakenDuringSubmit(Slot),
    #[error("booking {0} timed out")]
    Timeout(Slot),
}

/// Problems that do not undo a confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionWarning {
    NotificationFailed(String),
    RefreshFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no date selected")]
    NoDateSelected,
    #[error("not possible while {0:?}")]
    InvalidState(SessionState),
    #[error("no slot selected")]
    EmptySelection,
    #[error("name and email are required")]
    MissingClientDetails,
    #[error(transparent)]
    Submit(#[from] SubmitFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub bookings: Vec<BookingRecord>,
    pub email_id: Option<String>,
    pub warnings: Vec<SessionWarning>,
}

/// Bookings of a submission; the first `committed` are already persisted.
#[derive(Debug, Clone)]
struct PendingBatch {
    records: Vec<BookingRecord>,
    committed: usize,
}

impl PendingBatch {
    fn committed_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.records[..self.committed]
            .iter()
            .map(|record| record.hour)
    }
}

pub struct BookingSession<A: BookingApi> {
    api: A,
    timeout: Duration,
    state: SessionState,
    date: Option<NaiveDate>,
    selection: Vec<Slot>,
    snapshot: Vec<BookingRecord>,
    client_name: String,
    client_email: String,
    batch: Option<PendingBatch>,
}

impl<A: BookingApi> BookingSession<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            timeout: DEFAULT_TIMEOUT,
            state: SessionState::Browsing,
            date: None,
            selection: vec![],
            snapshot: vec![],
            client_name: String::new(),
            client_email: String::new(),
            batch: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn selection(&self) -> &[Slot] {
        &self.selection
    }

    pub fn snapshot(&self) -> &[BookingRecord] {
        &self.snapshot
    }

    pub fn availability(&self) -> Result<Vec<(Slot, SlotStatus)>, SessionError> {
        let date = self.date.ok_or(SessionError::NoDateSelected)?;
        Ok(availability(&self.snapshot, date, &self.selection))
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        timeout(self.timeout, request)
            .await
            .unwrap_or(Err(SyncError::Timeout))
    }

    /// Replaces the snapshot with the bookings currently stored on the server.
    /// On failure the previous snapshot is kept.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        match self.bounded(self.api.list_bookings()).await {
            Ok(bookings) => {
                debug!(bookings = bookings.len(), "Refreshed booking snapshot");
                self.replace_snapshot(bookings);
                Ok(())
            }
            Err(err) => {
                error!(?err, "Failed to fetch bookings, keeping previous snapshot");
                Err(err)
            }
        }
    }

    fn replace_snapshot(&mut self, bookings: Vec<BookingRecord>) {
        self.snapshot = bookings;
        if let Some(date) = self.date {
            let snapshot = &self.snapshot;
            self.selection.retain(|&slot| !is_booked(snapshot, date, slot));
        }
        if self.state == SessionState::ReadyToConfirm && self.selection.is_empty() {
            self.close_dialog();
            self.state = SessionState::Selecting;
        }
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), SessionError> {
        if self.state == SessionState::Submitting {
            return Err(SessionError::InvalidState(self.state.clone()));
        }
        self.date = Some(date);
        self.selection.clear();
        self.close_dialog();
        self.state = SessionState::Selecting;
        Ok(())
    }

    /// Adds `slot` to the selection or removes it again.
    ///
    /// Returns `false` if the slot is booked and the toggle was ignored.
    pub fn toggle_slot(&mut self, slot: Slot) -> Result<bool, SessionError> {
        match self.state {
            SessionState::Selecting | SessionState::ReadyToConfirm | SessionState::Confirmed => {}
            _ => return Err(SessionError::InvalidState(self.state.clone())),
        }
        let date = self.date.ok_or(SessionError::NoDateSelected)?;

        if is_booked(&self.snapshot, date, slot) {
            debug!(%slot, "Ignoring toggle of booked slot");
            return Ok(false);
        }

        if let Some(index) = self.selection.iter().position(|&selected| selected == slot) {
            self.selection.remove(index);
        } else {
            self.selection.push(slot);
        }

        match self.state {
            SessionState::Confirmed => self.state = SessionState::Selecting,
            SessionState::ReadyToConfirm if self.selection.is_empty() => {
                self.close_dialog();
                self.state = SessionState::Selecting;
            }
            _ => {}
        }
        Ok(true)
    }

    /// Opens the confirmation dialog for the current selection.
    pub fn request_confirmation(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Selecting | SessionState::ReadyToConfirm => {}
            _ => return Err(SessionError::InvalidState(self.state.clone())),
        }
        if self.selection.is_empty() {
            return Err(SessionError::EmptySelection);
        }
        self.state = SessionState::ReadyToConfirm;
        Ok(())
    }

    pub fn set_client_details(&mut self, name: &str, email: &str) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            SessionState::ReadyToConfirm | SessionState::SubmitFailed(_)
        ) {
            return Err(SessionError::InvalidState(self.state.clone()));
        }
        self.client_name = name.trim().into();
        self.client_email = email.trim().into();
        Ok(())
    }

    /// Closes the confirmation dialog. Slots persisted by a failed submission
    /// are dropped from the selection.
    pub fn cancel_confirmation(&mut self) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            SessionState::ReadyToConfirm | SessionState::SubmitFailed(_)
        ) {
            return Err(SessionError::InvalidState(self.state.clone()));
        }
        if let Some(batch) = self.batch.take() {
            let committed: Vec<Slot> = batch.committed_slots().collect();
            self.selection.retain(|slot| !committed.contains(slot));
        }
        self.close_dialog();
        self.state = SessionState::Selecting;
        Ok(())
    }

    fn close_dialog(&mut self) {
        self.client_name.clear();
        self.client_email.clear();
        self.batch = None;
    }

    fn pending_batch(&mut self, date: NaiveDate) -> PendingBatch {
        match self.batch.take() {
            Some(mut batch) => {
                for record in &mut batch.records[batch.committed..] {
                    record.client_name = self.client_name.clone();
                    record.client_email = self.client_email.clone();
                }
                batch
            }
            None => PendingBatch {
                records: self
                    .selection
                    .iter()
                    .map(|&slot| {
                        BookingRecord::new(date, slot, &self.client_name, &self.client_email)
                    })
                    .collect(),
                committed: 0,
            },
        }
    }

    /// Persists one booking per selected slot, then notifies the operator and
    /// refreshes the snapshot.
    pub async fn submit(&mut self) -> Result<SubmitReceipt, SessionError> {
        if !matches!(
            self.state,
            SessionState::ReadyToConfirm | SessionState::SubmitFailed(_)
        ) {
            return Err(SessionError::InvalidState(self.state.clone()));
        }
        if self.client_name.is_empty() || self.client_email.is_empty() {
            warn!("Booking validation failed, name and email are required");
            return Err(SessionError::MissingClientDetails);
        }
        let date = self.date.ok_or(SessionError::NoDateSelected)?;
        if self.selection.is_empty() && self.batch.is_none() {
            return Err(SessionError::EmptySelection);
        }

        let mut batch = self.pending_batch(date);
        self.state = SessionState::Submitting;

        while batch.committed < batch.records.len() {
            let record = &batch.records[batch.committed];
            let slot = record.hour;

            let result = self.bounded(self.api.persist_booking(record)).await;
            let failure = match result {
                Ok(()) => {
                    batch.committed += 1;
                    continue;
                }
                Err(SyncError::SlotTaken) => SubmitFailure::SlotTakenDuringSubmit(slot),
                Err(SyncError::Timeout) => SubmitFailure::Timeout(slot),
                Err(err) => SubmitFailure::Persistence {
                    slot,
                    message: err.to_string(),
                },
            };

            error!(
                %failure,
                committed = batch.committed,
                remaining = batch.records.len() - batch.committed,
                "Failed to save booking, stopping submission"
            );
            if let SubmitFailure::SlotTakenDuringSubmit(taken) = failure {
                // A retry must not send the taken slot again.
                batch.records.remove(batch.committed);
                self.selection.retain(|&selected| selected != taken);
            }
            self.batch = (!batch.records.is_empty()).then_some(batch);
            self.state = SessionState::SubmitFailed(failure.clone());
            if matches!(failure, SubmitFailure::SlotTakenDuringSubmit(_)) {
                if let Err(err) = self.refresh().await {
                    warn!(?err, "Could not refresh bookings after conflict");
                }
            }
            return Err(failure.into());
        }

        let bookings = batch.records;
        let mut slots: Vec<Slot> = bookings.iter().map(|booking| booking.hour).collect();
        slots.sort_by_key(Slot::hour);
        let notification = BookingNotification {
            client_name: self.client_name.clone(),
            client_email: self.client_email.clone(),
            date: format_long_date(date),
            slots,
        };

        let mut warnings = vec![];
        let email_id = match self.bounded(self.api.notify(&notification)).await {
            Ok(email_id) => Some(email_id),
            Err(err) => {
                warn!(?err, "Booking saved but email not sent");
                warnings.push(SessionWarning::NotificationFailed(err.to_string()));
                None
            }
        };

        self.selection.clear();
        self.close_dialog();
        self.state = SessionState::Confirmed;
        info!(date = %date, bookings = bookings.len(), "Booking confirmed");

        if let Err(err) = self.refresh().await {
            warnings.push(SessionWarning::RefreshFailed(err.to_string()));
        }

        Ok(SubmitReceipt {
            bookings,
            email_id,
            warnings,
        })
    }
}
