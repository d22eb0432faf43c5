//! Filesystem watcher bridge
//!
//! Turns raw notifications from an [`EventSource`](crate::ports::EventSource)
//! into index changes:
//!
//! 1. events are coalesced per path by the [`Debouncer`];
//! 2. each settled path is read, and dropped if the [`WriteJournal`] shows
//!    it is the echo of one of our own writes;
//! 3. the rest is decoded and handed to
//!    [`CollectionIndex::reconcile`](crate::index::CollectionIndex::reconcile)
//!    by the single [`ReconcileWorker`];
//! 4. if the bounded channel overflowed, the worker rescans the whole
//!    collection once the burst is over;
//! 5. the [`Supervisor`] restarts the worker if it dies.

mod debounce;
mod event;
mod journal;
mod journaled_store;
mod sink;
mod supervisor;
mod worker;

pub use debounce::Debouncer;
pub use event::{RawEvent, RawEventKind};
pub use journal::{Observation, WriteJournal, content_hash};
pub use journaled_store::JournaledStore;
pub use sink::{EventSink, EventStream, event_channel};
pub use supervisor::{Supervisor, WatchSession};
pub use worker::{ReconcileWorker, WorkerExit};

use courier_domain::NodeId;

/// Notification broadcast to subscribers of an open collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// External edits were applied to the index.
    Refreshed {
        /// Ids of the files and directories involved. The root id alone
        /// means the whole collection was rescanned.
        paths: Vec<NodeId>,
    },
    /// The watcher died and was started again.
    WatcherRestarted {
        /// Restart number, starting at 1.
        attempt: u32,
    },
    /// The watcher is gone for good; external edits are no longer seen.
    WatcherStopped {
        /// Why it stopped.
        reason: String,
    },
}
