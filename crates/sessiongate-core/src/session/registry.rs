//! Session registry: one session and one messaging client per user.
//!
//! The registry owns the `UserId -> SessionHandle` map, allocates clients
//! through the injected [`ClientFactory`], runs one event loop per session
//! that feeds the [`ConnectionStateMachine`], and tears sessions down.
//!
//! Creation is rejected, never merged, when a live session already exists.
//! Teardown always attempts both logout and destroy, bounds them with a
//! timeout, and then removes the session, its pending sends, and its history
//! in one step while holding the session's map entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use sessiongate_types::client::{ClientEvent, TransportState};
use sessiongate_types::error::{ClientError, SessionError, TeardownError};
use sessiongate_types::message::HistoryEntry;
use sessiongate_types::session::{Session, SessionSummary, UserId};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{BoxMessagingClient, ClientFactory};
use crate::dispatch::history::HistoryStore;
use crate::dispatch::pending::PendingMessageTracker;

use super::state::ConnectionStateMachine;

/// Everything the gateway holds for one live session.
#[derive(Debug)]
pub struct SessionHandle {
    user_id: UserId,
    /// Registration order, used to list sessions in insertion order. Also
    /// the generation stamped on this session's history log.
    seq: u64,
    machine: ConnectionStateMachine,
    client: Arc<BoxMessagingClient>,
    /// Held across a transport call when sends are serialized per user.
    send_gate: Mutex<()>,
    closing: AtomicBool,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Unique per created session, even across re-creation for the same user.
    pub fn generation(&self) -> u64 {
        self.seq
    }

    pub fn machine(&self) -> &ConnectionStateMachine {
        &self.machine
    }

    pub fn client(&self) -> &Arc<BoxMessagingClient> {
        &self.client
    }

    pub fn send_gate(&self) -> &Mutex<()> {
        &self.send_gate
    }

    /// True once teardown has started; the session accepts no new sends.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Session {
        self.machine.snapshot()
    }

    /// Ask the client for its connection state, giving up after `within`.
    pub async fn transport_state(&self, within: Duration) -> Result<TransportState, ClientError> {
        tokio::time::timeout(within, self.client.connection_state())
            .await
            .map_err(|_| {
                ClientError::Transport(format!(
                    "connection state query timed out after {within:?}"
                ))
            })?
    }

    /// React to one client event: record inbound traffic, then transition.
    fn on_event(&self, event: ClientEvent, history: &HistoryStore) {
        match &event {
            ClientEvent::MessageReceived {
                from,
                body,
                has_media,
            } => {
                debug!(user_id = %self.user_id, %from, has_media, "message received");
                history.append(
                    &self.user_id,
                    self.seq,
                    HistoryEntry::received(from.clone(), body.clone(), *has_media),
                );
            }
            ClientEvent::MessageAcknowledged { to, result_id } => {
                debug!(user_id = %self.user_id, %to, %result_id, "message acknowledged by network");
            }
            _ => {}
        }
        self.machine.apply(&event);
    }
}

/// Owner of all live sessions.
pub struct SessionRegistry {
    sessions: DashMap<UserId, Arc<SessionHandle>>,
    factory: Arc<dyn ClientFactory>,
    pending: Arc<PendingMessageTracker>,
    history: Arc<HistoryStore>,
    next_seq: AtomicU64,
    teardown_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        pending: Arc<PendingMessageTracker>,
        history: Arc<HistoryStore>,
        teardown_timeout: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
            pending,
            history,
            next_seq: AtomicU64::new(0),
            teardown_timeout,
        }
    }

    /// Create a session for `raw_user_id`.
    ///
    /// Allocates and registers the client, opens an empty history log, starts
    /// the event loop, and fires off client initialization in the background.
    /// An initialization failure surfaces later as a `Disconnected` state,
    /// not as an error here. Must be called from within a tokio runtime.
    pub fn create(&self, raw_user_id: &str) -> Result<Session, SessionError> {
        let user_id = UserId::parse(raw_user_id)?;

        let handle = match self.sessions.entry(user_id.clone()) {
            Entry::Occupied(_) => {
                return Err(SessionError::AlreadyExists(user_id.to_string()));
            }
            Entry::Vacant(slot) => {
                let allocated = self
                    .factory
                    .create(&user_id)
                    .map_err(|e| SessionError::ClientUnavailable(e.to_string()))?;

                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                let handle = Arc::new(SessionHandle {
                    user_id: user_id.clone(),
                    seq,
                    machine: ConnectionStateMachine::new(user_id.clone()),
                    client: Arc::new(allocated.client),
                    send_gate: Mutex::new(()),
                    closing: AtomicBool::new(false),
                    cancel: CancellationToken::new(),
                });
                self.history.open(&user_id, seq);
                slot.insert(Arc::clone(&handle));

                tokio::spawn(drive_events(
                    Arc::clone(&handle),
                    allocated.events,
                    Arc::clone(&self.history),
                ));
                handle
            }
        };

        let init = Arc::clone(&handle);
        tokio::spawn(async move {
            if let Err(e) = init.client.initialize().await {
                error!(user_id = %init.user_id, error = %e, "client initialization failed");
                init.machine.apply(&ClientEvent::Disconnected {
                    reason: format!("initialization failed: {e}"),
                });
            }
        });

        info!(%user_id, "session created");
        Ok(handle.snapshot())
    }

    /// Look up the live handle for a user.
    pub fn get(&self, raw_user_id: &str) -> Result<Arc<SessionHandle>, SessionError> {
        let not_found = || SessionError::NotFound(raw_user_id.trim().to_string());
        let user_id = UserId::parse(raw_user_id).map_err(|_| not_found())?;
        self.sessions
            .get(&user_id)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(not_found)
    }

    /// Current record for a user, read without touching the network.
    pub fn session(&self, raw_user_id: &str) -> Result<Session, SessionError> {
        Ok(self.get(raw_user_id)?.snapshot())
    }

    /// Read the session and, while its client is live, re-sync the state with
    /// the client's own view of the connection. A client that does not answer
    /// within the teardown timeout counts as a failed query.
    pub async fn refresh_status(&self, raw_user_id: &str) -> Result<Session, SessionError> {
        let handle = self.get(raw_user_id)?;
        if handle.is_closing() {
            return Ok(handle.snapshot());
        }
        let observed = handle.transport_state(self.teardown_timeout).await;
        Ok(handle.machine.reconcile(observed))
    }

    /// All sessions in creation order.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut handles: Vec<Arc<SessionHandle>> =
            self.sessions.iter().map(|h| Arc::clone(h.value())).collect();
        handles.sort_by_key(|h| h.seq);
        handles.iter().map(|h| h.snapshot().summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tear down a user's session.
    ///
    /// Logout then destroy are both attempted (destroy runs even when logout
    /// fails) within the teardown timeout. Whatever the client reports, the
    /// session, its pending records, and its history are then removed.
    pub async fn destroy(&self, raw_user_id: &str) -> Result<(), SessionError> {
        let handle = self.get(raw_user_id)?;
        if handle.closing.swap(true, Ordering::SeqCst) {
            // Another caller is already tearing this session down.
            return Err(SessionError::NotFound(handle.user_id.to_string()));
        }
        handle.machine.mark_destroyed();

        if let Err(e) = logout_and_destroy(&handle, self.teardown_timeout).await {
            warn!(user_id = %handle.user_id, error = %e, "client teardown incomplete, removing local state anyway");
        }
        self.forget(&handle);

        info!(user_id = %handle.user_id, "session destroyed");
        Ok(())
    }

    /// Best-effort teardown of every live session, used at process shutdown.
    ///
    /// Only `destroy` is called on each client (the linked account is left
    /// intact). Returns how many clients failed to tear down cleanly.
    pub async fn shutdown(&self) -> usize {
        let handles: Vec<Arc<SessionHandle>> = self
            .sessions
            .iter()
            .map(|h| Arc::clone(h.value()))
            .filter(|h| !h.closing.swap(true, Ordering::SeqCst))
            .collect();

        let timeout = self.teardown_timeout;
        let results = join_all(handles.iter().map(|handle| async move {
            handle.machine.mark_destroyed();
            let result = match tokio::time::timeout(timeout, handle.client.destroy()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(TeardownError::Destroy(e)),
                Err(_) => Err(TeardownError::TimedOut(timeout)),
            };
            match &result {
                Ok(()) => info!(user_id = %handle.user_id, "client destroyed"),
                Err(e) => error!(user_id = %handle.user_id, error = %e, "error destroying client"),
            }
            result
        }))
        .await;

        for handle in &handles {
            self.forget(handle);
        }
        results.iter().filter(|r| r.is_err()).count()
    }

    /// Stop the event loop and drop all local state for a closing session.
    fn forget(&self, handle: &Arc<SessionHandle>) {
        handle.cancel.cancel();
        if let Entry::Occupied(entry) = self.sessions.entry(handle.user_id.clone()) {
            if Arc::ptr_eq(entry.get(), handle) {
                let purged = self.pending.purge_user(&handle.user_id);
                self.history.remove(&handle.user_id);
                entry.remove();
                debug!(user_id = %handle.user_id, purged, "local session state removed");
            }
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("teardown_timeout", &self.teardown_timeout)
            .finish()
    }
}

/// Run logout then destroy, both always attempted, within `timeout`.
async fn logout_and_destroy(handle: &SessionHandle, timeout: Duration) -> Result<(), TeardownError> {
    let steps = async {
        let logout = handle.client.logout().await;
        if let Err(e) = &logout {
            warn!(user_id = %handle.user_id, error = %e, "logout failed, destroying anyway");
        }
        let destroy = handle.client.destroy().await;
        logout.map_err(TeardownError::Logout)?;
        destroy.map_err(TeardownError::Destroy)
    };
    tokio::time::timeout(timeout, steps)
        .await
        .map_err(|_| TeardownError::TimedOut(timeout))?
}

/// Per-session event loop; ends on teardown or when the client drops its sender.
async fn drive_events(
    handle: Arc<SessionHandle>,
    mut events: mpsc::Receiver<ClientEvent>,
    history: Arc<HistoryStore>,
) {
    loop {
        tokio::select! {
            _ = handle.cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => handle.on_event(event, &history),
                None => {
                    debug!(user_id = %handle.user_id, "client event stream closed");
                    break;
                }
            },
        }
    }
}
