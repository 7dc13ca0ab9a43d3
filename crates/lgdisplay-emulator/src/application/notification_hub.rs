//! NotificationHub: bridges dashboard sessions to the bus and the registry.
//!
//! One Tokio task owns the hub.  It is the only code that touches the
//! session set, and everything else reaches it through message queues:
//!
//! ```text
//!   ws_server sessions ──register/unregister──►┐
//!   ws_server sessions ──ActionRequest────────►│  NotificationHub::run
//!   EventBus subscription ──rendered payload──►┘    (single task)
//!                                                   │            │
//!                               DisplayService ◄────┘            └──► session outbound channels
//! ```
//!
//! # Slow consumers
//!
//! Broadcasts use `try_send`.  A session whose outbound buffer is full is
//! evicted on the spot; dropping its sender closes the channel, and the
//! session's write pump then closes the WebSocket.  One stalled viewer never
//! delays the others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lgdisplay_core::{DisplayEvent, EventTopic};

use crate::application::display_registry::DisplayService;
use crate::application::event_bus::EventBus;
use crate::domain::messages::{ActionRequest, DashboardAction, DashboardMsg};

/// Identifies one dashboard viewer connection.
pub type SessionId = Uuid;

/// Capacity of the hub's inbound queues.
const QUEUE_CAPACITY: usize = 64;

/// Cloneable handle used by sessions to talk to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<(SessionId, mpsc::Sender<String>)>,
    unregister_tx: mpsc::Sender<SessionId>,
    action_tx: mpsc::Sender<ActionRequest>,
}

impl HubHandle {
    /// Adds a session; the hub replies on `outbound` with a snapshot of every
    /// display and then with every subsequent change.
    ///
    /// Returns `false` if the hub has stopped.
    pub async fn register(&self, session: SessionId, outbound: mpsc::Sender<String>) -> bool {
        self.register_tx.send((session, outbound)).await.is_ok()
    }

    /// Removes a session and closes its outbound channel.
    pub async fn unregister(&self, session: SessionId) {
        if self.unregister_tx.send(session).await.is_err() {
            debug!("hub stopped before session {session} unregistered");
        }
    }

    /// Queues a viewer action for the hub.
    pub async fn submit(&self, request: ActionRequest) {
        if self.action_tx.send(request).await.is_err() {
            debug!("hub stopped; dropping viewer action");
        }
    }
}

/// The hub state.  Create with [`NotificationHub::new`], then
/// [`NotificationHub::start`].
pub struct NotificationHub {
    sessions: HashMap<SessionId, mpsc::Sender<String>>,
    service: Arc<dyn DisplayService>,
    register_rx: mpsc::Receiver<(SessionId, mpsc::Sender<String>)>,
    unregister_rx: mpsc::Receiver<SessionId>,
    broadcast_tx: mpsc::Sender<String>,
    broadcast_rx: mpsc::Receiver<String>,
    action_rx: mpsc::Receiver<ActionRequest>,
}

impl NotificationHub {
    /// Creates a hub and the handle sessions use to reach it.
    pub fn new(service: Arc<dyn DisplayService>) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (unregister_tx, unregister_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (action_tx, action_rx) = mpsc::channel(QUEUE_CAPACITY);

        let hub = Self {
            sessions: HashMap::new(),
            service,
            register_rx,
            unregister_rx,
            broadcast_tx,
            broadcast_rx,
            action_rx,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            action_tx,
        };
        (hub, handle)
    }

    /// Subscribes to every display topic on `bus` and spawns the hub loop.
    ///
    /// Bus events are resolved against the registry and broadcast to every
    /// session in the order they were published.  The loop ends once every
    /// [`HubHandle`] has been dropped.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self, bus: &EventBus) -> JoinHandle<()> {
        self.subscribe(bus);
        tokio::spawn(self.run())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Renders and queues events for broadcast in publish order, across all
    /// topics.
    fn subscribe(&self, bus: &EventBus) {
        let service = Arc::clone(&self.service);
        let broadcast_tx = self.broadcast_tx.clone();
        bus.subscribe_topics(&EventTopic::ALL, move |event| {
            let service = Arc::clone(&service);
            let broadcast_tx = broadcast_tx.clone();
            async move {
                let Some(payload) = render_event(service.as_ref(), event).await else {
                    return;
                };
                if broadcast_tx.send(payload).await.is_err() {
                    debug!("hub stopped; dropping {} broadcast", event.topic());
                }
            }
        });
    }

    async fn run(mut self) {
        info!("notification hub running");
        loop {
            tokio::select! {
                registered = self.register_rx.recv() => match registered {
                    Some((session, outbound)) => self.register(session, outbound).await,
                    None => break,
                },
                Some(session) = self.unregister_rx.recv() => self.unregister(session),
                Some(payload) = self.broadcast_rx.recv() => self.broadcast(&payload),
                Some(request) = self.action_rx.recv() => self.handle_action(request).await,
            }
        }
        info!("notification hub stopped");
    }

    async fn register(&mut self, session: SessionId, outbound: mpsc::Sender<String>) {
        info!("dashboard session {session} registered");
        let snapshot = DashboardMsg::Snapshot {
            displays: self.service.list_displays().await,
        };
        self.sessions.insert(session, outbound);
        if let Some(payload) = to_json(&snapshot) {
            self.push(session, payload);
        }
    }

    fn unregister(&mut self, session: SessionId) {
        if self.sessions.remove(&session).is_some() {
            info!("dashboard session {session} unregistered");
        }
    }

    /// Sends `payload` to one session, evicting it if it cannot keep up.
    fn push(&mut self, session: SessionId, payload: String) {
        let Some(outbound) = self.sessions.get(&session) else {
            return;
        };
        if !try_deliver(session, outbound, payload) {
            self.sessions.remove(&session);
        }
    }

    fn broadcast(&mut self, payload: &str) {
        debug!("broadcasting to {} session(s)", self.sessions.len());
        self.sessions
            .retain(|&session, outbound| try_deliver(session, outbound, payload.to_owned()));
    }

    async fn handle_action(&self, request: ActionRequest) {
        let action = match request.parse_action() {
            Ok(action) => action,
            Err(e) => {
                warn!("ignoring dashboard action: {e}");
                return;
            }
        };
        debug!("handling dashboard action {action:?}");
        match action {
            DashboardAction::AddDisplay => {
                self.service.create_display().await;
            }
            DashboardAction::PowerOn(id) => {
                self.service.power_on(id).await;
            }
            DashboardAction::PowerOff(id) => {
                self.service.power_off(id).await;
            }
            DashboardAction::Restart(id) => {
                self.service.restart(id).await;
            }
            DashboardAction::SetInput(id, input) => {
                self.service.set_input(id, input).await;
            }
        }
    }
}

/// Non-blocking send; `false` means the session must be dropped.
fn try_deliver(session: SessionId, outbound: &mpsc::Sender<String>, payload: String) -> bool {
    match outbound.try_send(payload) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("dashboard session {session} is not keeping up; evicting");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("dashboard session {session} already gone");
            false
        }
    }
}

/// Resolves `event` against the registry and renders the viewer payload.
async fn render_event(service: &dyn DisplayService, event: DisplayEvent) -> Option<String> {
    let id = event.display_id();
    let Some(display) = service.get_display(id).await else {
        warn!("{} for unknown display {id}", event.topic());
        return None;
    };
    let msg = match event {
        DisplayEvent::Created { .. } => DashboardMsg::DisplayAdded { display },
        DisplayEvent::PowerStateChanged { .. } | DisplayEvent::InputChanged { .. } => {
            DashboardMsg::DisplayUpdated { display }
        }
    };
    to_json(&msg)
}

fn to_json(msg: &DashboardMsg) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("failed to serialize dashboard message: {e}");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
