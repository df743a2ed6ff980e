//! Client-side transcription job tracking.
//!
//! Everything here is synchronous and network-free so it can be driven by any
//! transport:
//!
//! ```text
//! push frame ─► ServerMessage::parse ─► dispatch() ─► Dispatch { target, patch, .. }
//!                                                          │
//!                                       JobTracker::upsert(target, patch, Live)
//!                                                          │
//!                                     JobStore::save  +  JobEventBus::publish
//! ```
//!
//! - [`JobTracker`] owns the job mapping and enforces the status lattice.
//! - [`dispatch`] / [`on_channel_closed`] turn channel traffic into patches.
//! - [`RequestGuard`] drops responses superseded by newer requests.

mod affordance;
mod dispatch;
mod error;
mod events;
mod guard;
mod history;
mod job;
mod message;
mod observability;
mod store;
mod tracker;

pub use affordance::Affordances;
pub use dispatch::{
    DEFAULT_PREPARE_PROGRESS, Dispatch, DispatchPolicy, EarlyCompletion, NORMAL_CLOSE_CODES,
    ProgressDisplay, dispatch, dispatch_frame, dispatch_malformed, is_normal_close,
    on_channel_closed,
};
pub use error::{MessageError, StoreError};
pub use events::{DEFAULT_EVENT_CAPACITY, JobEvent, JobEventBus, topics};
pub use guard::{RequestGuard, RequestTicket};
pub use history::{DEFAULT_HISTORY_LIMIT, HistoryEntry, HistoryLevel, StatusHistory};
pub use job::{Job, JobKind, JobPatch, JobStatus, TransitionCause, clamp_progress};
pub use message::{
    Cancellation, ClientCommand, Completion, Failure, PartialResult, ProgressUpdate,
    ServerMessage, StatusNote,
};
pub use observability::JobLogEvent;
pub use store::{DEFAULT_SLOT, FileStore, JobStore, MemoryStore};
pub use tracker::{JobTracker, UpsertOutcome};
