//! Outbound message handling: dispatch, in-flight tracking, and history.

pub mod dispatcher;
pub mod history;
pub mod pending;

pub use dispatcher::{Dispatch, DispatchOutcome, DispatchSettings, MessageDispatcher, OutgoingMessage};
pub use history::HistoryStore;
pub use pending::PendingMessageTracker;
