use crate::builder::{states::NoUrl, WsManagerBuilder};
use crate::config::{ManagerConfig, TransportConfig};
use crate::connection_state::ConnectionStatus;
use crate::dispatcher::{DispatchMode, Dispatcher, ObserverEvent};
use crate::traits::*;
use crate::transport::TungsteniteTransport;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a connect attempt waits for the state lock before giving up
///
/// Every holder of the lock only does bookkeeping, so hitting this means
/// something is badly wrong; the attempt is abandoned rather than blocking
/// a concurrent teardown.
const CONNECT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Who asked for a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectTrigger {
    /// `start_connect`; the only way out of `Disconnected`
    Caller,
    /// A fired reconnect timer; only proceeds from `Reconnecting` without a
    /// manual close
    Timer,
}

/// A managed WebSocket connection with automatic reconnection
///
/// Owns one logical connection to a single URL. Public operations never
/// block on network I/O: connecting, sending and closing are handed to the
/// transport, and outcomes arrive through the registered [`StatusObserver`]
/// on the designated dispatch context.
///
/// # Example
/// ```ignore
/// let manager = WsManager::builder()
///     .url("wss://example.test/socket")
///     .observer(Arc::new(MyObserver))
///     .build()?;
///
/// manager.start_connect();
/// // ...
/// if manager.is_connected() {
///     manager.send_text("hello");
/// }
/// manager.stop_connect();
/// ```
pub struct WsManager {
    shared: Arc<Shared>,
}

/// State shared with transport listeners and reconnect timers
struct Shared {
    config: ManagerConfig,
    reachability: Arc<dyn NetworkReachability>,
    dispatcher: Dispatcher,
    runtime: tokio::runtime::Handle,
    core: Mutex<ConnectionCore>,
}

/// Everything that changes together under the state lock
struct ConnectionCore {
    status: ConnectionStatus,
    /// Set by `stop_connect`, cleared by `start_connect`
    manual_close: bool,
    /// Bumped on every connect attempt and every teardown
    generation: u64,
    /// Generation whose handle `stop_connect` asked to close gracefully
    retiring: Option<u64>,
    transport: Option<Arc<dyn Transport>>,
    handle: Option<Arc<dyn TransportHandle>>,
    pending_open: Option<Box<dyn PendingOpen>>,
    reconnect: ReconnectState,
}

/// Consecutive attempt counter plus the single pending timer
#[derive(Default)]
struct ReconnectState {
    attempts: u32,
    next_token: u64,
    timer: Option<PendingTimer>,
}

struct PendingTimer {
    token: u64,
    delay: Duration,
    task: tokio::task::JoinHandle<()>,
}

/// Connection resources detached from the core, released outside the lock
#[derive(Default)]
struct Detached {
    pending_open: Option<Box<dyn PendingOpen>>,
    handle: Option<Arc<dyn TransportHandle>>,
}

impl Detached {
    fn release(self) {
        if let Some(pending) = self.pending_open {
            pending.cancel();
        }
        if let Some(handle) = self.handle {
            let _ = handle.close(CloseCode::NORMAL, CloseCode::NORMAL_REASON);
        }
    }
}

impl ReconnectState {
    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.task.abort();
            debug!("Cancelled pending reconnect (token {})", timer.token);
        }
    }

    /// Drop the pending timer and reset the attempt counter
    fn cancel(&mut self) {
        self.abort_timer();
        self.attempts = 0;
    }
}

impl ConnectionCore {
    fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            manual_close: false,
            generation: 0,
            retiring: None,
            transport: None,
            handle: None,
            pending_open: None,
            reconnect: ReconnectState::default(),
        }
    }

    /// Move to `next` if the transition table allows it
    fn transition(&mut self, next: ConnectionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!("Rejected status transition {} -> {}", self.status, next);
            return false;
        }
        if self.status != next {
            debug!("Status {} -> {}", self.status, next);
            self.status = next;
        }
        true
    }

    /// Check that a connect attempt from `trigger` may still proceed
    fn admits(&self, trigger: ConnectTrigger) -> bool {
        match trigger {
            ConnectTrigger::Caller => true,
            ConnectTrigger::Timer => {
                self.status == ConnectionStatus::Reconnecting && !self.manual_close
            }
        }
    }

    /// Invalidate the current generation and detach its resources
    fn retire_generation(&mut self) -> Detached {
        self.generation += 1;
        Detached {
            pending_open: self.pending_open.take(),
            handle: self.handle.take(),
        }
    }
}

impl WsManager {
    /// Start building a manager
    pub fn builder() -> WsManagerBuilder<NoUrl> {
        WsManagerBuilder::new()
    }

    pub(crate) fn new(
        config: ManagerConfig,
        transport: Option<Arc<dyn Transport>>,
        reachability: Arc<dyn NetworkReachability>,
        dispatch_mode: DispatchMode,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(dispatch_mode)?;

        let mut core = ConnectionCore::new();
        core.transport = transport;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                reachability,
                dispatcher,
                runtime,
                core: Mutex::new(core),
            }),
        })
    }

    /// Connect, or do nothing if already connected or connecting
    ///
    /// Clears the manual-close flag so failures schedule reconnects again.
    /// When the network is unreachable the status settles to `Disconnected`
    /// and no transport I/O happens.
    pub fn start_connect(&self) {
        {
            let mut core = self.shared.core.lock();
            core.manual_close = false;
            // A new session starts the delay schedule over
            if core.status == ConnectionStatus::Disconnected {
                core.reconnect.cancel();
            }
        }
        self.shared.build_connect(ConnectTrigger::Caller);
    }

    /// Disconnect and suppress reconnection until the next `start_connect`
    pub fn stop_connect(&self) {
        self.shared.stop();
    }

    /// Send a text or binary message
    ///
    /// Returns `false` without touching the transport unless the status is
    /// `Connected`. A transport that refuses the message triggers the
    /// reconnect procedure and `false` is returned.
    pub fn send_message(&self, message: impl Into<WsMessage>) -> bool {
        self.shared.send(message.into())
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send_message(WsMessage::Text(text.into()))
    }

    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> bool {
        self.send_message(WsMessage::Binary(data.into()))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.current_status().is_connected()
    }

    #[inline]
    pub fn current_status(&self) -> ConnectionStatus {
        self.shared.core.lock().status
    }

    /// Register the observer; the last registration wins
    pub fn set_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.shared.dispatcher.set_observer(observer);
    }

    /// Unregister the observer; events are dropped until a new one is set
    pub fn clear_observer(&self) {
        self.shared.dispatcher.clear_observer();
    }

    /// Deliver queued observer events on the calling thread
    ///
    /// Only does anything in [`DispatchMode::Manual`], where it must be
    /// called from the thread that built the manager.
    pub fn pump_events(&self) -> usize {
        self.shared.dispatcher.pump()
    }

    pub fn url(&self) -> &str {
        self.shared.config.url()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    pub fn transport_config(&self) -> &TransportConfig {
        self.shared.config.transport_config()
    }

    /// Consecutive reconnects scheduled since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.core.lock().reconnect.attempts
    }

    /// Delay of the pending reconnect timer, if one is scheduled
    pub fn pending_reconnect(&self) -> Option<Duration> {
        self.shared
            .core
            .lock()
            .reconnect
            .timer
            .as_ref()
            .map(|timer| timer.delay)
    }
}

impl fmt::Debug for WsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsManager")
            .field("url", &self.url())
            .field("status", &self.current_status())
            .finish()
    }
}

impl Shared {
    fn dispatch(&self, event: ObserverEvent) {
        self.dispatcher.dispatch(event);
    }

    /// Open a new connection unless one is already up or on its way
    ///
    /// A timer-triggered attempt re-checks status and the manual-close flag
    /// under the lock, so a `stop_connect` that lands after the timer fired
    /// still wins.
    fn build_connect(self: &Arc<Self>, trigger: ConnectTrigger) {
        if !self.reachability.is_reachable() {
            info!("Network unreachable, not connecting to {}", self.config.url());
            let detached = {
                let mut core = self.core.lock();
                if !core.admits(trigger) {
                    return;
                }
                let detached = if core.status == ConnectionStatus::Disconnected {
                    Detached::default()
                } else {
                    core.retire_generation()
                };
                core.reconnect.abort_timer();
                core.transition(ConnectionStatus::Disconnected);
                detached
            };
            detached.release();
            return;
        }

        let Some(mut core) = self.core.try_lock_for(CONNECT_LOCK_TIMEOUT) else {
            warn!("Timed out waiting for connection state, abandoning connect attempt");
            return;
        };

        if !core.admits(trigger) {
            debug!("Reconnect abandoned, status is now {}", core.status);
            return;
        }

        if core.status.is_active() {
            debug!("Already {}, ignoring connect request", core.status);
            return;
        }

        if !core.transition(ConnectionStatus::Connecting) {
            return;
        }

        // A timer only exists while Reconnecting; the attempt counter keeps
        // growing until an open succeeds
        core.reconnect.abort_timer();

        // Anything left from an older connection must not outlive this attempt
        let stale = core.retire_generation();
        let generation = core.generation;

        let runtime = self.runtime.clone();
        let transport = Arc::clone(core.transport.get_or_insert_with(|| -> Arc<dyn Transport> {
            Arc::new(TungsteniteTransport::new(runtime))
        }));
        drop(core);

        stale.release();

        info!(
            "Connecting to {} (generation {})",
            self.config.url(),
            generation
        );

        let listener = Arc::new(GenerationListener {
            shared: Arc::downgrade(self),
            generation,
        });
        let request = OpenRequest {
            url: self.config.url().to_string(),
            config: self.config.transport_config().clone(),
        };

        // The transport may report back before `open` returns, so the lock
        // is not held across the call
        let pending = transport.open(request, listener);

        let mut core = self.core.lock();
        if core.generation != generation {
            drop(core);
            debug!("Connect attempt {} superseded before it started", generation);
            pending.cancel();
        } else if core.status == ConnectionStatus::Connecting {
            core.pending_open = Some(pending);
        }
    }

    fn stop(&self) {
        let detached = {
            let mut core = self.core.lock();
            core.manual_close = true;
            core.reconnect.cancel();

            if core.status == ConnectionStatus::Disconnected {
                debug!("Already disconnected, nothing to stop");
                return;
            }

            let closing_generation = core.generation;
            let detached = core.retire_generation();
            if detached.handle.is_some() {
                core.retiring = Some(closing_generation);
            }
            core.transition(ConnectionStatus::Disconnected);
            detached
        };

        if let Some(pending) = detached.pending_open {
            pending.cancel();
        }

        if let Some(handle) = detached.handle {
            if !handle.close(CloseCode::NORMAL, CloseCode::NORMAL_REASON) {
                warn!("Graceful close failed, reporting abnormal closure");
                self.core.lock().retiring = None;
                self.dispatch(ObserverEvent::Closed {
                    code: CloseCode::ABNORMAL,
                    reason: CloseCode::ABNORMAL_REASON.to_string(),
                });
            }
        }

        info!("Disconnected from {}", self.config.url());
    }

    fn send(self: &Arc<Self>, message: WsMessage) -> bool {
        let (handle, generation) = {
            let core = self.core.lock();
            match (&core.handle, core.status) {
                (Some(handle), ConnectionStatus::Connected) => {
                    (Arc::clone(handle), core.generation)
                }
                _ => {
                    debug!("Not connected ({}), dropping outgoing message", core.status);
                    return false;
                }
            }
        };

        if handle.send(message) {
            return true;
        }

        warn!("Transport refused message, treating connection as lost");
        self.connection_lost(generation, None);
        false
    }

    /// Drop the dead handle, try to schedule a reconnect and report failure
    fn connection_lost(
        self: &Arc<Self>,
        generation: u64,
        failure: Option<(WsManagerError, Option<HandshakeResponse>)>,
    ) {
        {
            let mut core = self.core.lock();
            if core.generation != generation {
                debug!("Ignoring failure from stale generation {}", generation);
                return;
            }
            core.handle = None;
            core.pending_open = None;
            self.try_reconnect(&mut core);
        }

        if let Some((error, response)) = failure {
            self.dispatch(ObserverEvent::Failure { error, response });
        }
    }

    /// Schedule a reconnect if policy, flags and the network allow it
    ///
    /// Every path that does not schedule settles the status to
    /// `Disconnected`. Disabled reconnection is not a plain no-op: it also
    /// settles to `Disconnected` rather than leaving the status untouched,
    /// so a dead handle never leaves the manager reporting `Connected`.
    fn try_reconnect(self: &Arc<Self>, core: &mut ConnectionCore) {
        if !self.config.reconnect_enabled() || core.manual_close {
            debug!("Reconnection disabled or manually closed, not reconnecting");
            core.transition(ConnectionStatus::Disconnected);
            return;
        }

        if !self.reachability.is_reachable() {
            info!("Network unreachable, not scheduling reconnect");
            core.transition(ConnectionStatus::Disconnected);
            return;
        }

        let attempt = core.reconnect.attempts;
        let Some(delay) = self.config.reconnect_strategy().next_delay(attempt) else {
            warn!("Reconnection strategy exhausted after {} attempts", attempt);
            core.reconnect.abort_timer();
            core.transition(ConnectionStatus::Disconnected);
            return;
        };

        if !core.transition(ConnectionStatus::Reconnecting) {
            return;
        }

        core.reconnect.abort_timer();

        core.reconnect.next_token += 1;
        let token = core.reconnect.next_token;
        let weak = Arc::downgrade(self);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_reconnect(token);
            }
        });

        core.reconnect.timer = Some(PendingTimer { token, delay, task });
        core.reconnect.attempts += 1;

        info!("Reconnecting in {:?} (attempt {})", delay, attempt + 1);
    }

    fn fire_reconnect(self: &Arc<Self>, token: u64) {
        {
            let mut core = self.core.lock();
            match &core.reconnect.timer {
                Some(timer) if timer.token == token => {
                    core.reconnect.timer = None;
                }
                _ => {
                    debug!("Reconnect timer {} was superseded", token);
                    return;
                }
            }
            if core.status != ConnectionStatus::Reconnecting {
                debug!("Status is {}, skipping reconnect", core.status);
                return;
            }
        }

        debug!("Reconnect timer {} fired", token);
        self.dispatch(ObserverEvent::Reconnect);
        self.build_connect(ConnectTrigger::Timer);
    }

    fn handle_open(
        &self,
        generation: u64,
        handle: Arc<dyn TransportHandle>,
        response: HandshakeResponse,
    ) {
        {
            let mut core = self.core.lock();
            let current = core.generation == generation
                && core.status == ConnectionStatus::Connecting;

            if !current {
                drop(core);
                debug!("Closing connection from stale generation {}", generation);
                let _ = handle.close(CloseCode::NORMAL, CloseCode::NORMAL_REASON);
                return;
            }

            core.handle = Some(handle);
            core.pending_open = None;
            core.transition(ConnectionStatus::Connected);
            core.reconnect.cancel();
        }

        info!("Connected to {}", self.config.url());
        self.dispatch(ObserverEvent::Open(response));
    }

    fn handle_message(&self, generation: u64, message: WsMessage) {
        if self.core.lock().generation != generation {
            debug!("Dropping message from stale generation {}", generation);
            return;
        }
        self.dispatch(ObserverEvent::Message(message));
    }

    /// Closing/closed notifications pass for the live generation and for
    /// the one retired by the last `stop_connect`
    fn accepts_close_event(&self, generation: u64, finished: bool) -> bool {
        let mut core = self.core.lock();
        if core.generation == generation {
            return true;
        }
        if core.retiring == Some(generation) {
            if finished {
                core.retiring = None;
            }
            return true;
        }
        false
    }

    fn handle_closing(&self, generation: u64, code: u16, reason: String) {
        if !self.accepts_close_event(generation, false) {
            debug!("Dropping closing event from stale generation {}", generation);
            return;
        }
        debug!("Connection closing: {} {}", code, reason);
        self.dispatch(ObserverEvent::Closing { code, reason });
    }

    fn handle_closed(&self, generation: u64, code: u16, reason: String) {
        if !self.accepts_close_event(generation, true) {
            debug!("Dropping closed event from stale generation {}", generation);
            return;
        }
        info!("Connection closed: {} {}", code, reason);
        self.dispatch(ObserverEvent::Closed { code, reason });
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.reconnect.cancel();
        Detached {
            pending_open: core.pending_open.take(),
            handle: core.handle.take(),
        }
        .release();
    }
}

/// Listener handed to the transport for one connect attempt
///
/// Holds the manager weakly: transport tasks never keep it alive.
struct GenerationListener {
    shared: Weak<Shared>,
    generation: u64,
}

impl TransportListener for GenerationListener {
    fn on_open(&self, handle: Arc<dyn TransportHandle>, response: HandshakeResponse) {
        match self.shared.upgrade() {
            Some(shared) => shared.handle_open(self.generation, handle, response),
            None => {
                let _ = handle.close(CloseCode::NORMAL, CloseCode::NORMAL_REASON);
            }
        }
    }

    fn on_message(&self, message: WsMessage) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_message(self.generation, message);
        }
    }

    fn on_closing(&self, code: u16, reason: String) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_closing(self.generation, code, reason);
        }
    }

    fn on_closed(&self, code: u16, reason: String) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_closed(self.generation, code, reason);
        }
    }

    fn on_failure(&self, error: WsManagerError, response: Option<HandshakeResponse>) {
        if let Some(shared) = self.shared.upgrade() {
            warn!("Transport failure: {}", error);
            shared.connection_lost(self.generation, Some((error, response)));
        }
    }
}
