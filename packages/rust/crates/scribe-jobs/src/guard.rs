//! Stale-request guard for overlapping asynchronous requests.
//!
//! Each request takes a ticket before it is sent. When its response arrives,
//! it is applied only if no newer ticket was issued in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::JobLogEvent;

/// Sequence number attached to one outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    /// Raw sequence number.
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.0
    }
}

/// Issues monotonically increasing tickets and filters superseded responses.
#[derive(Debug, Default)]
pub struct RequestGuard {
    latest: AtomicU64,
}

impl RequestGuard {
    /// Guard with no tickets issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket; it supersedes every earlier one.
    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Highest ticket issued so far.
    #[must_use]
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Ticket is still the newest one.
    #[must_use]
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest()
    }

    /// Pass `value` through only when `ticket` is current.
    pub fn accept<T>(&self, ticket: RequestTicket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            return Some(value);
        }
        tracing::debug!(
            event = JobLogEvent::StaleResponseDiscarded.as_str(),
            ticket = ticket.0,
            latest = self.latest(),
            "discarding superseded response"
        );
        None
    }
}
