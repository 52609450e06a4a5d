//! Common test utilities for wsmanager integration tests
//!
//! A scripted transport for driving the state machine by hand, an observer
//! that records every callback, and a small echo server for end-to-end runs.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use wsmanager::*;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Observer that records every callback as an [`ObserverEvent`]
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&ObserverEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| matches(e)).count()
    }

    pub fn reconnects(&self) -> usize {
        self.count(|e| matches!(e, ObserverEvent::Reconnect))
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, ObserverEvent::Open(_)))
    }

    pub fn failures(&self) -> usize {
        self.count(|e| matches!(e, ObserverEvent::Failure { .. }))
    }

    pub fn texts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ObserverEvent::Message(WsMessage::Text(text)) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn push(&self, event: ObserverEvent) {
        verbose_println!("  observer <- {:?}", event);
        self.events.lock().push(event);
    }
}

impl StatusObserver for RecordingObserver {
    fn on_open(&self, response: &HandshakeResponse) {
        self.push(ObserverEvent::Open(response.clone()));
    }

    fn on_text(&self, text: &str) {
        self.push(ObserverEvent::Message(WsMessage::Text(text.to_string())));
    }

    fn on_binary(&self, data: &[u8]) {
        self.push(ObserverEvent::Message(WsMessage::Binary(data.to_vec())));
    }

    fn on_reconnect(&self) {
        self.push(ObserverEvent::Reconnect);
    }

    fn on_closing(&self, code: u16, reason: &str) {
        self.push(ObserverEvent::Closing {
            code,
            reason: reason.to_string(),
        });
    }

    fn on_closed(&self, code: u16, reason: &str) {
        self.push(ObserverEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    fn on_failure(&self, error: &WsManagerError, response: Option<&HandshakeResponse>) {
        self.push(ObserverEvent::Failure {
            error: error.clone(),
            response: response.cloned(),
        });
    }
}

/// Connection handle whose send/close outcomes are scripted by the test
#[derive(Default)]
pub struct MockHandle {
    refuse_send: AtomicBool,
    refuse_close: AtomicBool,
    sent: Mutex<Vec<WsMessage>>,
    closes: Mutex<Vec<(u16, String)>>,
}

impl MockHandle {
    pub fn refuse_send(&self) {
        self.refuse_send.store(true, Ordering::SeqCst);
    }

    pub fn refuse_close(&self) {
        self.refuse_close.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<WsMessage> {
        self.sent.lock().clone()
    }

    pub fn closes(&self) -> Vec<(u16, String)> {
        self.closes.lock().clone()
    }
}

impl TransportHandle for MockHandle {
    fn send(&self, message: WsMessage) -> bool {
        if self.refuse_send.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(message);
        true
    }

    fn close(&self, code: u16, reason: &str) -> bool {
        self.closes.lock().push((code, reason.to_string()));
        !self.refuse_close.load(Ordering::SeqCst)
    }
}

/// One recorded `Transport::open` call
#[derive(Clone)]
pub struct OpenAttempt {
    pub request: OpenRequest,
    pub listener: Arc<dyn TransportListener>,
    cancelled: Arc<AtomicBool>,
}

impl OpenAttempt {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Complete the handshake and hand the manager a fresh handle
    pub fn accept(&self) -> Arc<MockHandle> {
        let handle = Arc::new(MockHandle::default());
        let mut response = HandshakeResponse::new(101);
        response
            .headers
            .push(("Upgrade".to_string(), "websocket".to_string()));
        self.listener.on_open(handle.clone(), response);
        handle
    }

    pub fn fail(&self, reason: &str) {
        self.listener
            .on_failure(WsManagerError::WebSocket(reason.to_string()), None);
    }

    pub fn text(&self, text: &str) {
        self.listener.on_message(WsMessage::Text(text.to_string()));
    }

    pub fn closing(&self, code: u16, reason: &str) {
        self.listener.on_closing(code, reason.to_string());
    }

    pub fn closed(&self, code: u16, reason: &str) {
        self.listener.on_closed(code, reason.to_string());
    }
}

struct MockPending {
    cancelled: Arc<AtomicBool>,
}

impl PendingOpen for MockPending {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Transport that records open requests and lets the test play the network
#[derive(Clone, Default)]
pub struct MockTransport {
    attempts: Arc<Mutex<Vec<OpenAttempt>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn attempt(&self, index: usize) -> OpenAttempt {
        self.attempts.lock()[index].clone()
    }

    pub fn last(&self) -> OpenAttempt {
        self.attempts
            .lock()
            .last()
            .cloned()
            .expect("no open attempt recorded")
    }
}

impl Transport for MockTransport {
    fn open(
        &self,
        request: OpenRequest,
        listener: Arc<dyn TransportListener>,
    ) -> Box<dyn PendingOpen> {
        verbose_println!("  transport.open({})", request.url);
        let cancelled = Arc::new(AtomicBool::new(false));
        self.attempts.lock().push(OpenAttempt {
            request,
            listener,
            cancelled: cancelled.clone(),
        });
        Box::new(MockPending { cancelled })
    }
}

/// Manager wired to a mock transport, recording observer and manual dispatch
///
/// Manual dispatch makes the test thread the designated context, so every
/// event triggered from the test is delivered before the call returns.
pub struct Harness {
    pub manager: WsManager,
    pub transport: MockTransport,
    pub observer: Arc<RecordingObserver>,
    pub network: Arc<StaticReachability>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    pub fn with(
        configure: impl FnOnce(WsManagerBuilder<states::HasUrl>) -> WsManagerBuilder<states::HasUrl>,
    ) -> Self {
        let transport = MockTransport::new();
        let observer = RecordingObserver::new();
        let network = Arc::new(StaticReachability::new(true));

        let builder = WsManager::builder()
            .url("wss://example.test/socket")
            .transport(transport.clone())
            .reachability(network.clone())
            .observer(observer.clone())
            .dispatch_mode(DispatchMode::Manual);

        let manager = configure(builder).build().expect("manager builds");

        Self {
            manager,
            transport,
            observer,
            network,
        }
    }

    /// Start connecting and complete the handshake
    pub fn connect(&self) -> Arc<MockHandle> {
        self.manager.start_connect();
        let handle = self.transport.last().accept();
        assert_eq!(self.manager.current_status(), ConnectionStatus::Connected);
        handle
    }
}

/// A simple mock WebSocket server for testing
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket echo server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            if msg.is_text() || msg.is_binary() {
                                // Echo the message back
                                if write.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            // Close frames are answered by tungstenite itself;
                            // the stream ends on the next read
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
