//! tokio-tungstenite transport
//!
//! # Architecture
//!
//! Each `open` spawns one connection task on the manager's runtime:
//!
//! ```text
//! TungsteniteHandle ──> Unbounded Channel ──┐
//!                                           v
//!                              ┌─────────────────────────┐
//!                              │  Connection Task        │
//!                              │  select! {              │
//!                              │    command  -> write    │ ──> WebSocket
//!                              │    read     -> listener │ <── WebSocket
//!                              │    keepalive tick       │
//!                              │    close deadline       │
//!                              │  }                      │
//!                              └─────────────────────────┘
//! ```
//!
//! The handle never blocks: `send` and `close` only enqueue commands. The
//! task owns the socket and reports every event to the listener in the
//! order it observed them.

use super::keepalive::KeepaliveTracker;
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as FrameCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as TungsteniteError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// How long to wait for the peer to answer our close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Code reported when the socket ends without a close frame
const NO_STATUS_CODE: u16 = 1005;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Internal command messages for the connection task
#[derive(Debug)]
enum Command {
    Send(WsMessage),
    Close { code: u16, reason: String },
}

/// Transport that opens real sockets with tokio-tungstenite
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    runtime: tokio::runtime::Handle,
}

impl TungsteniteTransport {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }
}

impl Transport for TungsteniteTransport {
    fn open(
        &self,
        request: OpenRequest,
        listener: Arc<dyn TransportListener>,
    ) -> Box<dyn PendingOpen> {
        let opened = Arc::new(AtomicBool::new(false));
        let task = {
            let opened = Arc::clone(&opened);
            self.runtime
                .spawn(async move { run_connection(request, listener, opened).await })
        };

        Box::new(ConnectTask { task, opened })
    }
}

/// In-flight connect; cancelling after the handshake completes is a no-op
struct ConnectTask {
    task: tokio::task::JoinHandle<()>,
    opened: Arc<AtomicBool>,
}

impl PendingOpen for ConnectTask {
    fn cancel(&self) {
        if !self.opened.load(Ordering::Acquire) {
            debug!("Aborting in-flight connect");
            self.task.abort();
        }
    }
}

/// Handle to one open tungstenite connection
///
/// Dropping every clone of the handle closes the connection.
#[derive(Debug)]
pub struct TungsteniteHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicU8>,
}

impl TungsteniteHandle {
    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }
}

impl TransportHandle for TungsteniteHandle {
    fn send(&self, message: WsMessage) -> bool {
        if !self.is_open() {
            return false;
        }
        self.commands.send(Command::Send(message)).is_ok()
    }

    fn close(&self, code: u16, reason: &str) -> bool {
        if self
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.commands
            .send(Command::Close {
                code,
                reason: reason.to_string(),
            })
            .is_ok()
    }
}

/// Build the upgrade request with custom headers
fn build_request(request: &OpenRequest) -> Result<Request> {
    let mut upgrade = request
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| WsManagerError::WebSocket(e.to_string()))?;

    for (key, value) in &request.config.headers {
        let name = key
            .parse::<http::header::HeaderName>()
            .map_err(|_| WsManagerError::Configuration(format!("Invalid header name: {}", key)))?;
        let value = value.parse::<http::header::HeaderValue>().map_err(|_| {
            WsManagerError::Configuration(format!("Invalid header value for key '{}'", key))
        })?;
        upgrade.headers_mut().insert(name, value);
    }

    Ok(upgrade)
}

fn response_context<T>(response: &http::Response<T>) -> HandshakeResponse {
    HandshakeResponse {
        status: response.status().as_u16(),
        headers: response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
    }
}

/// Connect, retrying once on failure when configured
async fn connect(
    request: &OpenRequest,
) -> std::result::Result<(WsStream, HandshakeResponse), (WsManagerError, Option<HandshakeResponse>)>
{
    let attempts = if request.config.retry_on_failure { 2 } else { 1 };
    let mut last_error = (WsManagerError::WebSocket("no connect attempt".into()), None);

    for attempt in 1..=attempts {
        let upgrade = build_request(request).map_err(|e| (e, None))?;

        match connect_async(upgrade).await {
            Ok((stream, response)) => return Ok((stream, response_context(&response))),
            Err(TungsteniteError::Http(response)) => {
                // The server answered; retrying will not change its mind
                let context = response_context(&response);
                return Err((
                    WsManagerError::WebSocket(format!(
                        "handshake rejected with status {}",
                        context.status
                    )),
                    Some(context),
                ));
            }
            Err(e) => {
                warn!("Connect attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = (WsManagerError::WebSocket(e.to_string()), None);
            }
        }
    }

    Err(last_error)
}

async fn run_connection(
    request: OpenRequest,
    listener: Arc<dyn TransportListener>,
    opened: Arc<AtomicBool>,
) {
    let (stream, response) = match connect(&request).await {
        Ok(connected) => connected,
        Err((error, response)) => {
            error!("Failed to connect to {}: {}", request.url, error);
            listener.on_failure(error, response);
            return;
        }
    };

    opened.store(true, Ordering::Release);
    info!("WebSocket open: {}", request.url);

    let (commands, command_rx) = mpsc::unbounded_channel();
    let state = Arc::new(AtomicU8::new(STATE_OPEN));
    let handle = Arc::new(TungsteniteHandle {
        commands,
        state: Arc::clone(&state),
    });

    // Only the listener's owner keeps the handle; the task holds the receiver
    listener.on_open(handle, response);

    let ping_interval = request.config.ping_interval;
    if let Err(error) = message_loop(stream, command_rx, &state, &listener, ping_interval).await {
        state.store(STATE_CLOSED, Ordering::Release);
        listener.on_failure(error, None);
    }

    debug!("Connection task exiting");
}

type CloseDeadline = Option<Pin<Box<tokio::time::Sleep>>>;

fn wait_deadline(deadline: &mut CloseDeadline) -> impl Future<Output = ()> + '_ {
    async move {
        match deadline.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => std::future::pending().await,
        }
    }
}

/// Main message processing loop
///
/// Returns `Ok(())` once the connection closed (the closed event has been
/// reported) and `Err` when it failed.
async fn message_loop(
    stream: WsStream,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    state: &AtomicU8,
    listener: &Arc<dyn TransportListener>,
    ping_interval: Option<Duration>,
) -> Result<()> {
    let (mut write, mut read) = stream.split();

    let keepalive = ping_interval.map(KeepaliveTracker::for_interval);
    let mut ticker = ping_interval.map(|interval| {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker
    });

    let mut close_status: Option<(u16, String)> = None;
    let mut close_deadline: CloseDeadline = None;
    let mut commands_open = true;

    loop {
        tokio::select! {
            cmd = command_rx.recv(), if commands_open => {
                match cmd {
                    Some(Command::Send(message)) => {
                        write.send(to_tungstenite(message)).await.map_err(|e| {
                            WsManagerError::WebSocket(format!("Failed to send: {}", e))
                        })?;
                    }
                    Some(Command::Close { code, reason }) => {
                        debug!("Sending close frame {} {}", code, reason);
                        let frame = CloseFrame {
                            code: FrameCloseCode::from(code),
                            reason: Cow::Owned(reason),
                        };
                        if let Err(e) = write.send(Message::Close(Some(frame))).await {
                            return Err(WsManagerError::WebSocket(format!(
                                "Failed to send close frame: {}", e
                            )));
                        }
                        close_deadline = Some(Box::pin(tokio::time::sleep(CLOSE_TIMEOUT)));
                    }
                    None => {
                        // Every handle dropped: nobody is listening any more
                        commands_open = false;
                        if state.swap(STATE_CLOSING, Ordering::AcqRel) == STATE_OPEN {
                            debug!("Handle dropped, closing connection");
                            let frame = CloseFrame {
                                code: FrameCloseCode::from(CloseCode::NORMAL),
                                reason: Cow::Borrowed(CloseCode::NORMAL_REASON),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            close_deadline = Some(Box::pin(tokio::time::sleep(CLOSE_TIMEOUT)));
                        }
                    }
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => listener.on_message(WsMessage::Text(text)),
                    Some(Ok(Message::Binary(data))) => listener.on_message(WsMessage::Binary(data)),
                    Some(Ok(Message::Pong(_))) => {
                        if let Some(tracker) = &keepalive {
                            tracker.record_pong_received();
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Frame(_))) => {
                        // Pongs are answered by tungstenite itself
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((NO_STATUS_CODE, String::new()));

                        if state.swap(STATE_CLOSING, Ordering::AcqRel) == STATE_OPEN {
                            // Peer started the closing handshake
                            listener.on_closing(code, reason.clone());
                        }
                        close_status = Some((code, reason));
                    }
                    Some(Err(TungsteniteError::ConnectionClosed)) | None => {
                        return finish(state, listener, close_status);
                    }
                    Some(Err(e)) => {
                        if close_status.is_some() {
                            return finish(state, listener, close_status);
                        }
                        return Err(WsManagerError::WebSocket(e.to_string()));
                    }
                }
            }

            _ = async {
                match ticker.as_mut() {
                    Some(ticker) => { ticker.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some(tracker) = &keepalive {
                    if !tracker.is_healthy() {
                        warn!("No pong within {:?}", tracker.timeout());
                        return Err(WsManagerError::Timeout("ping timeout".into()));
                    }
                    write.send(Message::Ping(Vec::new())).await.map_err(|e| {
                        WsManagerError::WebSocket(format!("Failed to send ping: {}", e))
                    })?;
                    tracker.record_ping_sent();
                }
            }

            _ = wait_deadline(&mut close_deadline) => {
                warn!("Peer did not answer close frame within {:?}", CLOSE_TIMEOUT);
                return finish(state, listener, close_status.or(Some((
                    CloseCode::ABNORMAL,
                    CloseCode::ABNORMAL_REASON.to_string(),
                ))));
            }
        }
    }
}

/// Report the end of a connection
///
/// A stream that ends without any close frame counts as a failure.
fn finish(
    state: &AtomicU8,
    listener: &Arc<dyn TransportListener>,
    close_status: Option<(u16, String)>,
) -> Result<()> {
    state.store(STATE_CLOSED, Ordering::Release);
    match close_status {
        Some((code, reason)) => {
            listener.on_closed(code, reason);
            Ok(())
        }
        None => Err(WsManagerError::ConnectionClosed("stream ended".into())),
    }
}

fn to_tungstenite(message: WsMessage) -> Message {
    match message {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}
