//! Business handler contract and the processing outcome/error taxonomy.
//!
//! A handler applies one delivered record's side effect. The dispatcher
//! hands it the raw [`Delivery`]; deserializing is the handler's first
//! step, because different topics carry different record shapes (primary
//! topics carry event envelopes, dead-letter topics carry dead-letter
//! records). The handler reports either a successful outcome
//! ([`ProcessingOutcome`]) or a failure classified by whether retrying can
//! help ([`HandlerError::Transient`] vs [`HandlerError::Terminal`]).
//!
//! A duplicate is a *success value*, never an error: an event whose side
//! effect already ran short-circuits with [`ProcessingOutcome::Duplicate`]
//! so callers cannot accidentally treat it as a hard failure and feed it to
//! the retry path.

use crate::event::EnvelopeError;
use crate::log::Delivery;
use crate::store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Why a handling attempt failed.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The side effect failed for a reason that may clear up: downstream
    /// outage, timeout, store hiccup. The supervisor retries these.
    #[error("transient handler failure: {0}")]
    Transient(String),

    /// The message can never be handled successfully: malformed payload,
    /// structurally invalid content. Retrying cannot help; the supervisor
    /// dead-letters these immediately.
    #[error("terminal handler failure: {0}")]
    Terminal(String),
}

impl HandlerError {
    /// Whether the supervisor should spend retry budget on this failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<EnvelopeError> for HandlerError {
    /// An envelope that does not decode can never decode; redelivery would
    /// fail identically.
    fn from(err: EnvelopeError) -> Self {
        Self::Terminal(err.to_string())
    }
}

impl From<StoreError> for HandlerError {
    /// Reservation-store failures are outages of a shared collaborator and
    /// may clear up on retry.
    fn from(err: StoreError) -> Self {
        Self::Transient(err.to_string())
    }
}

/// Successful outcome of a handling attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The side effect ran during this attempt.
    Sent,
    /// The event was already processed; the side effect was skipped.
    Duplicate,
}

impl ProcessingOutcome {
    /// Short uppercase label for log lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::Duplicate => "DUPLICATE",
        }
    }
}

/// Per-attempt processing report, produced for logging only, never
/// persisted.
#[derive(Clone, Debug)]
pub struct ProcessingReport {
    /// Event the attempt handled.
    pub event_id: Uuid,
    /// Business subject (order id, product id).
    pub subject_id: String,
    /// What happened.
    pub outcome: ProcessingOutcome,
    /// Human-readable detail ("Notification sent", "Already processed").
    pub detail: String,
    /// When the attempt finished.
    pub processed_at: DateTime<Utc>,
}

/// Handler for one delivered record's side effect.
///
/// Implementations deserialize the record, wrap their side effect in the
/// idempotency guard protocol (reserve → effect → keep on success / release
/// on transient failure), and classify failures so the supervisor retries
/// only what can succeed.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply the record's side effect.
    ///
    /// # Errors
    ///
    /// [`HandlerError::Transient`] if the attempt may succeed on retry,
    /// [`HandlerError::Terminal`] if it never can (including a record that
    /// does not deserialize).
    async fn handle(&self, delivery: &Delivery) -> Result<ProcessingReport, HandlerError>;
}
