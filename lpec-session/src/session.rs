//! The per-device subscription session and its read loop.

use std::net::{IpAddr, SocketAddr};

use lpec_protocol::{parse_line, Line};
use lpec_state::{DeviceId, StateChangeEvent, StateStore};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout, timeout_at, Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::state::SessionState;

type LineReader = Lines<BufReader<OwnedReadHalf>>;

/// A persistent LPEC subscription to one device.
///
/// The session is single-use: [`Session::run`] consumes it, drives the
/// connect/subscribe/stream lifecycle to completion, and leaves the final
/// state observable through the [`SessionHandle`] returned by
/// [`Session::new`].
///
/// State-change events produced while streaming are forwarded into the
/// fan-in channel supplied at construction; per-device FIFO order is
/// preserved because a session is the only writer for its device.
pub struct Session {
    device: DeviceId,
    addr: SocketAddr,
    config: SessionConfig,
    store: StateStore,
    state_tx: watch::Sender<SessionState>,
    events: mpsc::Sender<StateChangeEvent>,
    cancel: watch::Receiver<bool>,
}

/// Observer side of a session: its device and lifecycle state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    device: DeviceId,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// The device this session monitors.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `Closed` or `Failed`.
    pub async fn wait_terminal(&mut self) -> SessionState {
        loop {
            let current = *self.state.borrow();
            if current.is_terminal() {
                return current;
            }
            if self.state.changed().await.is_err() {
                // Sender dropped; the last published state is final.
                return *self.state.borrow();
            }
        }
    }
}

impl Session {
    /// Create a session for one device.
    ///
    /// `events` is the shared fan-in channel for state-change events;
    /// `cancel` is the cooperative stop signal, observed by the streaming
    /// loop within one read-timeout interval.
    pub fn new(
        device: DeviceId,
        ip: IpAddr,
        config: SessionConfig,
        events: mpsc::Sender<StateChangeEvent>,
        cancel: watch::Receiver<bool>,
    ) -> (Self, SessionHandle) {
        let addr = SocketAddr::new(ip, config.port);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let handle = SessionHandle {
            device: device.clone(),
            state: state_rx,
        };
        let session = Self {
            device,
            addr,
            config,
            store: StateStore::new(),
            state_tx,
            events,
            cancel,
        };
        (session, handle)
    }

    /// Drive the session to completion.
    ///
    /// Returns `Ok(())` on a graceful end (requested stop, peer close, or
    /// the fan-in consumer going away) with the state left at `Closed`;
    /// any error leaves the state at `Failed`.
    pub async fn run(mut self) -> Result<()> {
        match self.drive().await {
            Ok(()) => {
                self.transition(SessionState::Closed);
                Ok(())
            }
            Err(error) => {
                warn!(device = %self.device, %error, "session failed");
                self.transition(SessionState::Failed);
                Err(error)
            }
        }
    }

    async fn drive(&mut self) -> Result<()> {
        self.transition(SessionState::Connecting);
        debug!(device = %self.device, addr = %self.addr, "connecting");

        let stream = match timeout(self.config.connect_timeout, TcpStream::connect(self.addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(SessionError::Connection {
                    device: self.device.clone(),
                    addr: self.addr,
                    source,
                })
            }
            Err(_) => {
                return Err(SessionError::ConnectTimeout {
                    device: self.device.clone(),
                    addr: self.addr,
                })
            }
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half).lines();

        self.transition(SessionState::Subscribing);
        self.drain_banner(&mut reader).await?;
        self.subscribe(&mut write_half).await?;
        self.await_initial_state(&mut reader).await?;

        self.transition(SessionState::Streaming);
        info!(device = %self.device, service = %self.config.service_path, "subscribed, monitoring events");
        self.stream(&mut reader).await
    }

    /// Read the `ALIVE` banner the device emits on connect.
    ///
    /// Returns once the subscribed service has been announced or the banner
    /// window elapses; a silent device is not an error at this stage.
    async fn drain_banner(&mut self, reader: &mut LineReader) -> Result<()> {
        let deadline = Instant::now() + self.config.banner_timeout;
        loop {
            let line = match timeout_at(deadline, reader.next_line()).await {
                Err(_) => return Ok(()),
                Ok(Ok(None)) => {
                    return Err(SessionError::ClosedDuringSubscribe {
                        device: self.device.clone(),
                    })
                }
                Ok(Err(source)) => {
                    return Err(SessionError::Stream {
                        device: self.device.clone(),
                        source,
                    })
                }
                Ok(Ok(Some(line))) => line,
            };

            match parse_line(&line) {
                Ok(Line::Alive { service }) => {
                    debug!(device = %self.device, %service, "alive");
                    if service == self.config.service_path {
                        return Ok(());
                    }
                }
                _ => debug!(device = %self.device, raw = %line.trim(), "banner line"),
            }
        }
    }

    async fn subscribe(&mut self, writer: &mut OwnedWriteHalf) -> Result<()> {
        let to_stream_error = |source| SessionError::Stream {
            device: self.device.clone(),
            source,
        };

        // Some firmware drops the first command on a fresh connection;
        // prime it with a bare line before subscribing.
        writer.write_all(b"\r\n").await.map_err(to_stream_error)?;
        sleep(Duration::from_millis(50)).await;

        debug!(device = %self.device, service = %self.config.service_path, "subscribing");
        let command = format!("SUBSCRIBE {}\r\n", self.config.service_path);
        writer
            .write_all(command.as_bytes())
            .await
            .map_err(to_stream_error)
    }

    /// Wait for the subscribe acknowledgement and the sequence-0 full-state
    /// record, bounded by the subscribe timeout.
    async fn await_initial_state(&mut self, reader: &mut LineReader) -> Result<()> {
        let deadline = Instant::now() + self.config.subscribe_timeout;
        loop {
            let line = match timeout_at(deadline, reader.next_line()).await {
                Err(_) => {
                    return Err(SessionError::SubscriptionTimeout {
                        device: self.device.clone(),
                        timeout: self.config.subscribe_timeout,
                    })
                }
                Ok(Ok(None)) => {
                    return Err(SessionError::ClosedDuringSubscribe {
                        device: self.device.clone(),
                    })
                }
                Ok(Err(source)) => {
                    return Err(SessionError::Stream {
                        device: self.device.clone(),
                        source,
                    })
                }
                Ok(Ok(Some(line))) => line,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_line(trimmed) {
                Ok(Line::SubscriptionAck { service }) => {
                    debug!(device = %self.device, %service, "subscription acknowledged");
                }
                Ok(Line::Alive { .. }) => {}
                Ok(Line::Event(record)) if record.is_full_state() => {
                    if let Some(event) = self.store.apply(&self.device, &record) {
                        self.forward(event).await;
                    }
                    return Ok(());
                }
                Ok(Line::Event(record)) => {
                    warn!(device = %self.device, seq = record.seq, "event before initial full state, discarding");
                }
                Err(error) => {
                    warn!(device = %self.device, %error, raw = %trimmed, "discarding malformed line");
                }
            }
        }
    }

    /// The streaming loop: read, parse, diff, forward.
    ///
    /// A read timeout is not an error; it exists so the loop can observe a
    /// stop request without blocking indefinitely.
    async fn stream(&mut self, reader: &mut LineReader) -> Result<()> {
        loop {
            if *self.cancel.borrow() {
                info!(device = %self.device, "stop requested, closing session");
                return Ok(());
            }

            let line = match timeout(self.config.read_timeout, reader.next_line()).await {
                Err(_) => {
                    if self.config.log_heartbeats {
                        debug!(device = %self.device, "heartbeat (no events)");
                    }
                    continue;
                }
                Ok(Ok(None)) => {
                    info!(device = %self.device, "monitor stopped: connection closed by device");
                    return Ok(());
                }
                Ok(Err(source)) => {
                    return Err(SessionError::Stream {
                        device: self.device.clone(),
                        source,
                    })
                }
                Ok(Ok(Some(line))) => line,
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match parse_line(trimmed) {
                Ok(Line::Event(record)) => match self.store.apply(&self.device, &record) {
                    Some(event) => {
                        if !self.forward(event).await {
                            return Ok(());
                        }
                    }
                    None => {
                        if self.config.log_heartbeats {
                            debug!(device = %self.device, seq = record.seq, "event carried no changes");
                        }
                    }
                },
                Ok(Line::Alive { service }) => {
                    debug!(device = %self.device, %service, "alive");
                }
                Ok(Line::SubscriptionAck { service }) => {
                    debug!(device = %self.device, %service, "unexpected subscribe echo");
                }
                Err(error) => {
                    warn!(device = %self.device, %error, raw = %trimmed, "discarding malformed line");
                }
            }
        }
    }

    /// Forward a state-change event to the fan-in channel.
    ///
    /// Returns `false` when the consumer is gone, which the caller treats
    /// as a graceful stop.
    async fn forward(&mut self, event: StateChangeEvent) -> bool {
        if self.events.send(event).await.is_err() {
            debug!(device = %self.device, "event channel closed, stopping session");
            false
        } else {
            true
        }
    }

    fn transition(&self, next: SessionState) {
        debug!(device = %self.device, state = %next, "session state");
        let _ = self.state_tx.send(next);
    }
}
