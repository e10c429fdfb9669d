//! Injectable time source.
//!
//! Services stamp events via a [`Clock`] collaborator instead of calling
//! `Utc::now()` inline, so tests can pin time (see `eventline-testing`'s
//! `FixedClock`).

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
