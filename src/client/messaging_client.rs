//! Impure I/O side of the messaging client
//!
//! `MessagingClient` owns the connector, the subscriber registry and the
//! supervisor task. The supervisor reads the live link, hands messages to
//! subscribers, and runs the reconnect loop when the link drops.

use super::connection::{ConnectionState, ReconnectPolicy};
use super::message_handler::{EventRoute, MessageHandler};
use super::reconnect_monitor::{ReconnectMonitor, ReconnectionDecision};
use super::registry::{handler, Handler, HandlerResult, SubscriberRegistry};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{validate_message_type, validate_ws_url, Envelope};
use crate::transport::{
    Connector, OutboundFrame, TransportError, TransportEvent, TransportLink, WebSocketConnector,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// How long `disconnect` waits for the supervisor before aborting it
const SUPERVISOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Handlers run outside every lock, so a poisoned guard still holds consistent data
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the client handle and its supervisor task
struct Shared {
    registry: Mutex<SubscriberRegistry>,
    outbound: Mutex<Option<mpsc::UnboundedSender<OutboundFrame>>>,
    state_tx: watch::Sender<ConnectionState>,
    reconnect_attempts: AtomicU32,
    last_error: Mutex<Option<String>>,
    connected_at: Mutex<Option<DateTime<Utc>>>,
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            registry: Mutex::new(SubscriberRegistry::new()),
            outbound: Mutex::new(None),
            state_tx,
            reconnect_attempts: AtomicU32::new(0),
            last_error: Mutex::new(None),
            connected_at: Mutex::new(None),
        }
    }

    fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn publish_state(&self, next: ConnectionState) {
        let previous = self.state_tx.send_replace(next.clone());
        if previous != next {
            ReconnectMonitor::log_state_transition(&previous, &next);
        }
    }

    fn record_error(&self, reason: &str) {
        *lock(&self.last_error) = Some(reason.to_string());
    }

    /// Install a freshly opened link as the single live transport handle
    fn attach(&self, outbound: mpsc::UnboundedSender<OutboundFrame>) {
        *lock(&self.outbound) = Some(outbound);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        *lock(&self.last_error) = None;
        *lock(&self.connected_at) = Some(Utc::now());
        self.publish_state(ConnectionState::Open);
    }

    /// Drop the live transport handle, returning it if there was one
    fn detach(&self) -> Option<mpsc::UnboundedSender<OutboundFrame>> {
        *lock(&self.connected_at) = None;
        lock(&self.outbound).take()
    }
}

/// Reconnecting pub/sub client for game room messaging
///
/// ```no_run
/// use mystery_link::{handler, MessagingClient, ReconnectPolicy};
///
/// # async fn run() -> Result<(), mystery_link::ClientError> {
/// let mut client = MessagingClient::new(ReconnectPolicy::default());
/// client.on("chat", handler(|data| {
///     println!("chat: {data}");
///     Ok(())
/// }))?;
/// client.connect("ws://localhost:8080/ws?gameId=1").await?;
/// client.emit("chat", &serde_json::json!({"sender": "Admin", "content": "hello"}))?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct MessagingClient {
    client_id: Uuid,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    shutdown_tx: Option<watch::Sender<bool>>,
    supervisor: Option<JoinHandle<()>>,
}

impl MessagingClient {
    /// Client using the WebSocket transport
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self::with_connector(policy, Arc::new(WebSocketConnector::new()))
    }

    /// Client using an arbitrary transport
    pub fn with_connector(policy: ReconnectPolicy, connector: Arc<dyn Connector>) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            connector,
            policy,
            shared: Arc::new(Shared::new()),
            shutdown_tx: None,
            supervisor: None,
        }
    }

    /// Client built from a validated configuration
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self::new(config.reconnect_policy()))
    }

    fn has_live_supervisor(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Open a transport to `address` and start supervising it
    ///
    /// Resolves once the transport is open. Fails if the transport reports an
    /// error first, if the open exceeds the connect timeout, or if this client
    /// already has a live connection.
    pub async fn connect(&mut self, address: &str) -> ClientResult<()> {
        if self.has_live_supervisor() {
            return Err(ClientError::AlreadyConnected);
        }
        // A supervisor that gave up after exhausting its retries is finished
        self.supervisor = None;

        let address =
            validate_ws_url(address).map_err(|e| ClientError::invalid_address(e.to_string()))?;

        let span = crate::connection_span!(client_id = %self.client_id, address = %address);
        let link = self.open_link(&address).instrument(span.clone()).await?;
        let TransportLink { outbound, inbound } = link;
        self.shared.attach(outbound);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = Supervisor {
            shared: Arc::clone(&self.shared),
            connector: Arc::clone(&self.connector),
            policy: self.policy.clone(),
            address,
        };
        self.shutdown_tx = Some(shutdown_tx);
        self.supervisor = Some(tokio::spawn(
            supervisor.run(inbound, shutdown_rx).instrument(span),
        ));
        Ok(())
    }

    async fn open_link(&self, address: &str) -> ClientResult<TransportLink> {
        self.shared.publish_state(ConnectionState::Connecting);
        info!("Connecting to {}", address);

        match tokio::time::timeout(self.policy.connect_timeout, self.connector.connect(address))
            .await
        {
            Ok(Ok(link)) => Ok(link),
            Ok(Err(e)) => {
                let reason = match e {
                    TransportError::Connect(message) => message,
                    other => other.to_string(),
                };
                self.shared.record_error(&reason);
                self.shared
                    .publish_state(ConnectionState::Closed(reason.clone()));
                Err(ClientError::connection_failed(reason))
            }
            Err(_) => {
                let timeout = self.policy.connect_timeout;
                let reason = format!("connection did not open within {timeout:?}");
                self.shared.record_error(&reason);
                self.shared.publish_state(ConnectionState::Closed(reason));
                Err(ClientError::ConnectTimeout(timeout))
            }
        }
    }

    /// Serialize `message` and transmit it if the transport is open
    ///
    /// Nothing is queued: a send while not open is reported and discarded.
    pub fn send<M: Serialize + ?Sized>(&self, message: &M) -> ClientResult<()> {
        let state = self.shared.state();
        if !ReconnectMonitor::can_send(&state) {
            error!(state = ?state, "Cannot send message: connection is not open");
            return Err(ClientError::NotConnected { state });
        }

        let payload = serde_json::to_string(message)?;
        let outbound = lock(&self.shared.outbound);
        let Some(sender) = outbound.as_ref() else {
            error!("Cannot send message: no transport handle");
            return Err(ClientError::NotConnected { state });
        };

        sender
            .send(OutboundFrame::Text(payload))
            .map_err(|_| ClientError::Transport(TransportError::Closed))?;
        Ok(())
    }

    /// Wrap `data` in an envelope of `message_type` and send it
    pub fn emit<T: Serialize + ?Sized>(&self, message_type: &str, data: &T) -> ClientResult<()> {
        validate_message_type(message_type)
            .map_err(|e| ClientError::invalid_message_type(e.to_string()))?;
        let envelope = Envelope::new(message_type, data)?;
        debug!(message_type = %message_type, "Emitting message");
        self.send(&envelope)
    }

    /// Register `handler` for `message_type`; handlers run in registration order
    pub fn on(&self, message_type: &str, handler: Handler) -> ClientResult<()> {
        validate_message_type(message_type)
            .map_err(|e| ClientError::invalid_message_type(e.to_string()))?;
        lock(&self.shared.registry).add(message_type, handler);
        debug!(message_type = %message_type, "Handler registered");
        Ok(())
    }

    /// Register a handler that decodes `data` into `T` before calling `f`
    ///
    /// Returns the registered handle so it can be passed to [`off`](Self::off).
    /// A payload that does not decode counts as a handler failure.
    pub fn on_typed<T, F>(&self, message_type: &str, f: F) -> ClientResult<Handler>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) -> HandlerResult + Send + Sync + 'static,
    {
        let typed = handler(move |data| {
            let payload = T::deserialize(data)?;
            f(payload)
        });
        self.on(message_type, Arc::clone(&typed))?;
        Ok(typed)
    }

    /// Remove one registration of `handler`; returns false if it was not registered
    pub fn off(&self, message_type: &str, handler: &Handler) -> bool {
        let removed = lock(&self.shared.registry).remove(message_type, handler);
        if removed {
            debug!(message_type = %message_type, "Handler removed");
        }
        removed
    }

    /// Close the transport, clear every handler and cancel any pending reconnect
    pub async fn disconnect(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
            debug!("Sent shutdown signal to connection supervisor");
        }

        if let Some(handle) = self.supervisor.take() {
            let abort = handle.abort_handle();
            match tokio::time::timeout(SUPERVISOR_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("Connection supervisor stopped"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("Connection supervisor ended with error: {}", e);
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!("Connection supervisor did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        if let Some(outbound) = self.shared.detach() {
            let _ = outbound.send(OutboundFrame::Close);
        }

        lock(&self.shared.registry).clear();
        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
        self.shared
            .publish_state(ConnectionState::Closed("client disconnected".to_string()));
        info!(client_id = %self.client_id, "Messaging client disconnected");
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state().is_open()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Receiver that observes every connection state transition
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Most recent connection error, cleared when a connection opens
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    /// Reconnect attempts made since the connection was last open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn handler_count(&self, message_type: &str) -> usize {
        lock(&self.shared.registry).handler_count(message_type)
    }

    /// When the current connection opened, if one is open
    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        *lock(&self.shared.connected_at)
    }

    /// Wait until the connection state satisfies `predicate` and return it
    pub async fn wait_for<P>(&self, mut predicate: P) -> ConnectionState
    where
        P: FnMut(&ConnectionState) -> bool,
    {
        let mut state_rx = self.state_receiver();
        let state = match state_rx.wait_for(|state| predicate(state)).await {
            Ok(state) => state.clone(),
            // The sender lives as long as this client
            Err(_) => self.shared.state(),
        };
        state
    }

    /// Wait until reconnection has failed permanently and return the reason
    pub async fn wait_for_failure(&self) -> String {
        match self.wait_for(ConnectionState::is_failed).await {
            ConnectionState::Failed(reason) => reason,
            other => format!("{other:?}"),
        }
    }
}

impl Drop for MessagingClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for MessagingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingClient")
            .field("client_id", &self.client_id)
            .field("state", &self.shared.state())
            .field("policy", &self.policy)
            .finish()
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Background task that owns the inbound side of the live link
struct Supervisor {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    address: String,
}

/// Resolves once shutdown is requested or the client handle is gone
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

/// Sleep for `delay` unless shutdown arrives first.
/// Returns true if the sleep completed.
async fn interruptible_sleep(shutdown_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = wait_for_shutdown(shutdown_rx) => {
            info!("Shutdown signal received during reconnection delay, stopping");
            false
        }
        _ = tokio::time::sleep(delay) => true,
    }
}

impl Supervisor {
    async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        debug!("Connection supervisor started");

        loop {
            match self.pump_session(&mut inbound, &mut shutdown_rx).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    self.shared.detach();
                    self.shared.record_error(&reason);
                    self.shared.publish_state(ConnectionState::Closed(reason));

                    match self.reconnect(&mut shutdown_rx).await {
                        Some(next) => inbound = next,
                        None => break,
                    }
                }
            }
        }

        debug!("Connection supervisor stopped");
    }

    /// Deliver inbound messages until the link ends or shutdown is requested
    async fn pump_session(
        &self,
        inbound: &mut mpsc::UnboundedReceiver<TransportEvent>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown_rx) => return SessionEnd::Shutdown,
                event = inbound.recv() => match MessageHandler::route(event) {
                    EventRoute::Message(envelope) => {
                        let report = MessageHandler::dispatch(&self.shared.registry, &envelope);
                        debug!(
                            message_type = %envelope.message_type,
                            delivered = report.delivered,
                            failed = report.failed,
                            "Message dispatched"
                        );
                    }
                    EventRoute::Malformed(reason) => MessageHandler::log_malformed(&reason),
                    EventRoute::Closed(reason) => return SessionEnd::Lost(reason),
                },
            }
        }
    }

    /// Run the backoff loop. Returns the inbound side of a new link, or None
    /// when retrying stopped (shutdown or exhaustion).
    async fn reconnect(
        &self,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        loop {
            let decision = ReconnectMonitor::should_attempt_reconnection(
                self.shared.reconnect_attempts.load(Ordering::SeqCst),
                &self.policy,
                *shutdown_rx.borrow(),
            );

            match decision {
                ReconnectionDecision::Proceed { attempt, delay } => {
                    self.shared
                        .reconnect_attempts
                        .store(attempt, Ordering::SeqCst);
                    self.shared
                        .publish_state(ConnectionState::Reconnecting(attempt));
                    info!(
                        "Attempting reconnection {}/{} after {:?} delay",
                        attempt, self.policy.max_attempts, delay
                    );

                    if !interruptible_sleep(shutdown_rx, delay).await {
                        return None;
                    }

                    let result = tokio::select! {
                        biased;
                        _ = wait_for_shutdown(shutdown_rx) => {
                            info!("Shutdown signal received, aborting reconnection");
                            return None;
                        }
                        result = tokio::time::timeout(
                            self.policy.connect_timeout,
                            self.connector.connect(&self.address),
                        ) => result,
                    };

                    match result {
                        Ok(Ok(TransportLink { outbound, inbound })) => {
                            self.shared.attach(outbound);
                            return Some(inbound);
                        }
                        Ok(Err(e)) => {
                            warn!(attempt, error = %e, "Reconnection attempt failed");
                            self.shared.record_error(&e.to_string());
                        }
                        Err(_) => {
                            warn!(
                                attempt,
                                "Reconnection attempt timed out after {:?}", self.policy.connect_timeout
                            );
                            self.shared.record_error("reconnection attempt timed out");
                        }
                    }
                }
                ReconnectionDecision::AbortShutdownRequested => {
                    info!("Shutdown signal received, stopping reconnection");
                    return None;
                }
                ReconnectionDecision::AbortMaxAttemptsExceeded => {
                    let reason = ReconnectMonitor::exhausted_reason(&self.policy);
                    self.shared.record_error(&reason);
                    self.shared.publish_state(ConnectionState::Failed(reason));
                    return None;
                }
            }
        }
    }
}
