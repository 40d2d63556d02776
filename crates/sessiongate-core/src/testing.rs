//! Scripted in-memory messaging client for orchestrator tests.
//!
//! Tests keep an `Arc<ScriptedFactory>`, hand it to the registry as the
//! client factory, and then drive each created client through its
//! `ScriptedControl`: inject events, flip the reported transport state, and
//! choose how `send` behaves.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use sessiongate_types::client::{ClientEvent, OutboundPayload, SendReceipt, TransportState};
use sessiongate_types::error::ClientError;
use sessiongate_types::message::Recipient;
use sessiongate_types::session::UserId;
use tokio::sync::mpsc;

use crate::client::{BoxMessagingClient, ClientFactory, ClientHandle, MessagingClient};

#[derive(Debug, Clone)]
pub(crate) enum SendBehavior {
    Succeed,
    Fail(String),
    Hang,
    SucceedAfter(Duration),
}

#[derive(Debug)]
pub(crate) struct Shared {
    transport: Mutex<TransportState>,
    behavior: Mutex<SendBehavior>,
    pub sends_started: AtomicUsize,
    pub sends_finished: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub sent_to: Mutex<Vec<String>>,
    logout_fails: AtomicBool,
    destroy_hangs: AtomicBool,
    state_query_hangs: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            transport: Mutex::new(TransportState::Disconnected),
            behavior: Mutex::new(SendBehavior::Succeed),
            sends_started: AtomicUsize::new(0),
            sends_finished: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
            sent_to: Mutex::new(Vec::new()),
            logout_fails: AtomicBool::new(false),
            destroy_hangs: AtomicBool::new(false),
            state_query_hangs: AtomicBool::new(false),
        }
    }
}

/// Test-side handle on one scripted client.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedControl {
    events: mpsc::Sender<ClientEvent>,
    pub shared: Arc<Shared>,
}

impl ScriptedControl {
    pub async fn emit(&self, event: ClientEvent) {
        self.events.send(event).await.unwrap();
    }

    /// Report connected on status queries and emit `ready`.
    pub async fn connect(&self) {
        self.set_transport(TransportState::Connected);
        self.emit(ClientEvent::Ready).await;
    }

    pub fn set_transport(&self, state: TransportState) {
        *self.shared.transport.lock().unwrap() = state;
    }

    pub fn set_behavior(&self, behavior: SendBehavior) {
        *self.shared.behavior.lock().unwrap() = behavior;
    }

    pub fn fail_logout(&self) {
        self.shared.logout_fails.store(true, Ordering::SeqCst);
    }

    pub fn hang_destroy(&self) {
        self.shared.destroy_hangs.store(true, Ordering::SeqCst);
    }

    pub fn hang_state_query(&self) {
        self.shared.state_query_hangs.store(true, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct ScriptedClient {
    events: mpsc::Sender<ClientEvent>,
    shared: Arc<Shared>,
    initial_challenge: Option<String>,
    fail_initialize: bool,
}

impl MessagingClient for ScriptedClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        if self.fail_initialize {
            return Err(ClientError::Transport("browser failed to launch".to_string()));
        }
        if let Some(raw) = &self.initial_challenge {
            let _ = self
                .events
                .send(ClientEvent::QrChallenge { raw: raw.clone() })
                .await;
        }
        Ok(())
    }

    async fn connection_state(&self) -> Result<TransportState, ClientError> {
        if self.shared.state_query_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(self.shared.transport.lock().unwrap().clone())
    }

    async fn send(
        &self,
        target: &Recipient,
        _payload: &OutboundPayload,
    ) -> Result<SendReceipt, ClientError> {
        self.shared.sends_started.fetch_add(1, Ordering::SeqCst);
        self.shared
            .sent_to
            .lock()
            .unwrap()
            .push(target.address().to_string());
        let behavior = self.shared.behavior.lock().unwrap().clone();
        let result = match behavior {
            SendBehavior::Succeed => Ok(()),
            SendBehavior::Fail(msg) => Err(ClientError::Transport(msg)),
            SendBehavior::Hang => std::future::pending().await,
            SendBehavior::SucceedAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };
        self.shared.sends_finished.fetch_add(1, Ordering::SeqCst);
        result.map(|()| SendReceipt {
            result_id: format!("true_{}", uuid::Uuid::now_v7().simple()),
        })
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.shared.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.logout_fails.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("logout rejected".to_string()));
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ClientError> {
        self.shared.destroy_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.destroy_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Factory producing scripted clients and remembering their controls.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFactory {
    controls: DashMap<UserId, ScriptedControl>,
    pub initial_challenge: Mutex<Option<String>>,
    pub fail_initialize: AtomicBool,
    pub fail_create: AtomicBool,
}

impl ScriptedFactory {
    /// Factory whose clients issue `challenge` as soon as they initialize.
    pub fn with_challenge(challenge: &str) -> Arc<Self> {
        let factory = Self::default();
        *factory.initial_challenge.lock().unwrap() = Some(challenge.to_string());
        Arc::new(factory)
    }

    pub fn control(&self, user_id: &str) -> ScriptedControl {
        self.controls
            .get(&UserId::parse(user_id).unwrap())
            .map(|c| c.clone())
            .expect("no scripted client for user")
    }
}

impl ClientFactory for ScriptedFactory {
    fn create(&self, user_id: &UserId) -> Result<ClientHandle, ClientError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("no browser available".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        let shared = Arc::new(Shared::new());
        self.controls.insert(
            user_id.clone(),
            ScriptedControl {
                events: tx.clone(),
                shared: Arc::clone(&shared),
            },
        );
        let client = ScriptedClient {
            events: tx,
            shared,
            initial_challenge: self.initial_challenge.lock().unwrap().clone(),
            fail_initialize: self.fail_initialize.load(Ordering::SeqCst),
        };
        Ok(ClientHandle {
            client: BoxMessagingClient::new(client),
            events: rx,
        })
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
