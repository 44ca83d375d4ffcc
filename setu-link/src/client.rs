//! Transport protocol client
//!
//! One [`TransportClient`] owns one session with the robot over one link
//! kind. It reconnects on its own and reports everything upward as
//! [`TransportEvent`]s on a channel.
//!
//! ## State Machine
//!
//! ```text
//!                  poll (connect_interval)
//!   Disconnected ─────────────────────────► Connecting
//!        ▲                                      │ ok          timeout / error
//!        │                                      ▼                 │
//!        │        silence > liveness_timeout    Connected         │
//!        │        or ack timeout (no upload) ─► Stopping ─────────┤
//!        └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Threads
//!
//! - **Worker** (10ms tick): reconnect polling, heartbeat, liveness and ack
//!   expiry. Lives as long as the client.
//! - **Reader** (per connection): frame decoding and inbound handling, in
//!   arrival order.
//! - **Writer** (per connection): drains the outbox so sends never block on
//!   the link.
//!
//! Connection threads carry the generation they were started for and exit
//! once it is no longer current, so a late error from an old link never
//! tears down a newer one.
//!
//! ## Liveness
//!
//! Every outbound frame expects an ack within its timeout. A missing ack, or
//! no inbound traffic for `liveness_timeout` at a heartbeat, drops the
//! connection, unless an upload chunk was sent or acknowledged within the
//! last `chunk_grace`. Large uploads keep the robot busy enough to miss
//! heartbeats.

use crate::address::AddressCandidate;
use crate::config::{LinkConfig, TimingConfig};
use crate::error::{LinkError, Result};
use crate::link::{Connector, Link};
use crate::logpack::LogPack;
use crate::messages::{Inbound, ModeType, Outbound, PROTOCOL_VERSION, TransportKind};
use crate::wire::{Envelope, FrameDecoder};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Worker loop period
const TICK: Duration = Duration::from_millis(10);

/// Writer wakeup period when the outbox is idle
const WRITER_POLL: Duration = Duration::from_millis(100);

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Stopping,
}

/// What a client reports upward
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Edge-triggered: never repeats the previous value
    Connection(bool),
    VersionChecked { version: String, matched: bool },
    Message(Inbound),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub transport: TransportKind,
    pub event: ClientEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Alive,
    /// Failure observed but an upload is in progress
    Deferred,
    Expired,
}

/// Liveness bookkeeping for one connection
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    last_rx: Instant,
    last_chunk: Option<Instant>,
    timeout: Duration,
    grace: Duration,
}

impl Liveness {
    pub fn new(now: Instant, timeout: Duration, grace: Duration) -> Self {
        Self {
            last_rx: now,
            last_chunk: None,
            timeout,
            grace,
        }
    }

    pub fn received(&mut self, now: Instant) {
        self.last_rx = now;
    }

    pub fn chunk_sent(&mut self, now: Instant) {
        self.last_chunk = Some(now);
    }

    pub fn sending_chunks(&self, now: Instant) -> bool {
        self.last_chunk
            .is_some_and(|at| now.saturating_duration_since(at) <= self.grace)
    }

    /// Heartbeat-time check of inbound silence
    pub fn check(&self, now: Instant) -> Verdict {
        if now.saturating_duration_since(self.last_rx) <= self.timeout {
            Verdict::Alive
        } else {
            self.failure(now)
        }
    }

    /// Outcome of any liveness failure
    pub fn failure(&self, now: Instant) -> Verdict {
        if self.sending_chunks(now) {
            Verdict::Deferred
        } else {
            Verdict::Expired
        }
    }
}

/// What an ack means beyond clearing the pending entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckAction {
    None,
    ChunkDelivered,
}

/// Session parameters for one client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub kind: TransportKind,
    pub device_id: String,
    pub mode: ModeType,
    pub addresses: Vec<String>,
    pub timing: TimingConfig,
}

impl ClientOptions {
    /// TCP or serial options from the config file
    pub fn from_config(kind: TransportKind, config: &LinkConfig) -> Self {
        let addresses = match kind {
            TransportKind::Tcp => config.tcp.addresses.clone(),
            TransportKind::Serial => vec![config.serial.path.clone()],
        };
        Self {
            kind,
            device_id: config.device.id.clone(),
            mode: config.device.mode,
            addresses,
            timing: config.timing.clone(),
        }
    }
}

struct Pending {
    kind: &'static str,
    deadline: Instant,
    action: AckAction,
}

struct Connection {
    link: Box<dyn Link>,
    outbox: Sender<Vec<u8>>,
    peer: String,
}

struct Session {
    phase: ConnectionState,
    connection: Option<Connection>,
    generation: u64,
    notified: Option<bool>,
    liveness: Liveness,
    pending: HashMap<u64, Pending>,
    /// Chunks whose ack deadline passed; a late ack still counts as delivery
    late_chunks: HashSet<u64>,
    next_heartbeat: Instant,
    version: Option<String>,
    name: Option<String>,
}

/// Coalesced logging for periodic inbound status
struct StatusPacks {
    version: LogPack,
    device: LogPack,
    system: LogPack,
    battery: LogPack,
    touch: LogPack,
}

impl StatusPacks {
    fn new(kind: TransportKind) -> Self {
        let secs = Duration::from_secs;
        Self {
            version: LogPack::new(format!("{} version", kind), secs(3), 20),
            device: LogPack::new(format!("{} device_status", kind), secs(7), 4),
            system: LogPack::new(format!("{} system_status", kind), secs(7), 4),
            battery: LogPack::new(format!("{} battery_status", kind), secs(7), 4),
            touch: LogPack::new(format!("{} touch", kind), secs(3), 80),
        }
    }

    fn flush(&mut self) {
        self.version.flush();
        self.device.flush();
        self.system.flush();
        self.battery.flush();
        self.touch.flush();
    }
}

struct Inner {
    kind: TransportKind,
    device_id: String,
    mode: Mutex<ModeType>,
    timing: TimingConfig,
    connector: Box<dyn Connector>,
    addresses: Mutex<AddressCandidate>,
    events: Sender<TransportEvent>,
    session: Mutex<Session>,
    packs: Mutex<StatusPacks>,
    seq: AtomicU64,
    running: AtomicBool,
}

/// Session with the robot over one link kind
pub struct TransportClient {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransportClient {
    pub fn new(
        options: ClientOptions,
        connector: Box<dyn Connector>,
        events: Sender<TransportEvent>,
    ) -> Self {
        let now = Instant::now();
        let timing = options.timing;
        let session = Session {
            phase: ConnectionState::Disconnected,
            connection: None,
            generation: 0,
            notified: None,
            liveness: Liveness::new(now, timing.liveness_timeout(), timing.chunk_grace()),
            pending: HashMap::new(),
            late_chunks: HashSet::new(),
            next_heartbeat: now,
            version: None,
            name: None,
        };
        let inner = Inner {
            kind: options.kind,
            device_id: options.device_id,
            mode: Mutex::new(options.mode),
            connector,
            addresses: Mutex::new(AddressCandidate::new(options.addresses)),
            events,
            session: Mutex::new(session),
            packs: Mutex::new(StatusPacks::new(options.kind)),
            seq: AtomicU64::new(0),
            running: AtomicBool::new(false),
            timing,
        };
        Self {
            inner: Arc::new(inner),
            worker: Mutex::new(None),
        }
    }

    /// Start the worker thread; the first connection attempt is immediate
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        self.inner.running.store(true, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name(format!("{}-worker", self.inner.kind).to_lowercase())
            .spawn(move || run_worker(inner))?;
        *worker = Some(handle);
        Ok(())
    }

    pub fn kind(&self) -> TransportKind {
        self.inner.kind
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.session.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Last version reported by the peer
    pub fn peer_version(&self) -> Option<String> {
        self.inner.session.lock().version.clone()
    }

    pub fn peer_name(&self) -> Option<String> {
        self.inner.session.lock().name.clone()
    }

    /// Mode reported in subsequent heartbeats
    pub fn set_mode(&self, mode: ModeType) {
        *self.inner.mode.lock() = mode;
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.inner.timing
    }

    /// Queue `message` with the default ack timeout. Returns its sequence
    /// number.
    pub fn send(&self, message: &Outbound) -> Result<u64> {
        self.inner
            .send(message, self.inner.timing.send_timeout(), AckAction::None)
    }

    pub fn send_with(
        &self,
        message: &Outbound,
        timeout: Duration,
        action: AckAction,
    ) -> Result<u64> {
        self.inner.send(message, timeout, action)
    }

    /// Mark the start of an upload; opens the grace window
    pub fn begin_upload(&self) {
        self.inner.session.lock().liveness.chunk_sent(Instant::now());
    }

    /// Drop the connection; the worker reconnects on its next poll.
    /// Safe to call any number of times from any thread.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Liveness failure path: stop unless an upload is in its grace window.
    /// Returns true if the connection was stopped.
    pub fn stop_unless_sending_chunks(&self) -> bool {
        self.inner.stop_unless_sending_chunks()
    }

    /// Stop and end the worker thread
    pub fn shutdown(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take()
            && handle.join().is_err()
        {
            log::error!("{}: Worker thread panicked", self.inner.kind);
        }
        self.inner.stop();
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn emit(&self, event: ClientEvent) {
        let event = TransportEvent {
            transport: self.kind,
            event,
        };
        if self.events.send(event).is_err() {
            log::debug!("{}: Event receiver gone", self.kind);
        }
    }

    /// Report a connection change unless it repeats the last report
    fn notify(&self, session: &mut Session, connected: bool) {
        if session.notified == Some(connected) {
            return;
        }
        session.notified = Some(connected);
        log::info!(
            "{}: {}",
            self.kind,
            if connected { "Connected" } else { "Disconnected" }
        );
        self.emit(ClientEvent::Connection(connected));
    }

    fn send(&self, message: &Outbound, timeout: Duration, action: AckAction) -> Result<u64> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = message.to_envelope(seq)?.encode()?;

        let mut session = self.session.lock();
        let Some(connection) = session.connection.as_ref() else {
            return Err(LinkError::NotConnected);
        };
        connection
            .outbox
            .send(frame)
            .map_err(|_| LinkError::NotConnected)?;
        session.pending.insert(
            seq,
            Pending {
                kind: message.kind(),
                deadline: Instant::now() + timeout,
                action,
            },
        );
        Ok(seq)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::Relaxed) && self.session.lock().generation == generation
    }

    fn stop(&self) {
        let mut session = self.session.lock();
        self.teardown(&mut session);
    }

    fn stop_generation(&self, generation: u64) {
        let mut session = self.session.lock();
        if session.generation == generation {
            self.teardown(&mut session);
        }
    }

    fn stop_unless_sending_chunks(&self) -> bool {
        let mut session = self.session.lock();
        if session.liveness.sending_chunks(Instant::now()) {
            log::debug!("{}: Not stopping, upload in progress", self.kind);
            return false;
        }
        self.teardown(&mut session);
        true
    }

    fn teardown(&self, session: &mut Session) {
        if let Some(connection) = session.connection.take() {
            session.phase = ConnectionState::Stopping;
            log::info!("{}: Closing connection to {}", self.kind, connection.peer);
            connection.link.shutdown();
            // Dropping the outbox sender ends the writer thread
            drop(connection);
            session.generation += 1;
            session.pending.clear();
            session.late_chunks.clear();
            self.packs.lock().flush();
        }
        if session.phase != ConnectionState::Connecting {
            session.phase = ConnectionState::Disconnected;
            self.notify(session, false);
        }
    }

    fn poll_connect(self: &Arc<Self>) {
        let Some(address) = self.addresses.lock().next_address() else {
            return;
        };
        {
            let mut session = self.session.lock();
            if session.phase != ConnectionState::Disconnected {
                return;
            }
            session.phase = ConnectionState::Connecting;
        }

        log::debug!("{}: Connecting to {}", self.kind, address);
        let result = self
            .connector
            .connect(&address, self.timing.connect_timeout())
            .and_then(|link| self.attach(link));

        if let Err(e) = result {
            log::debug!("{}: Connection to {} failed: {}", self.kind, address, e);
            let mut session = self.session.lock();
            if session.phase == ConnectionState::Connecting {
                session.phase = ConnectionState::Disconnected;
                self.notify(&mut session, false);
            }
        }
    }

    fn attach(self: &Arc<Self>, link: Box<dyn Link>) -> Result<()> {
        let reader = link.try_clone()?;
        let writer = link.try_clone()?;
        let (outbox, outbox_rx) = unbounded();
        let peer = link.peer();

        let generation = {
            let mut session = self.session.lock();
            session.generation += 1;
            session.generation
        };

        let spawned = self
            .spawn_reader(generation, reader)
            .and_then(|_| self.spawn_writer(generation, writer, outbox_rx));
        if let Err(e) = spawned {
            link.shutdown();
            self.session.lock().generation += 1;
            return Err(e);
        }

        {
            let now = Instant::now();
            let mut session = self.session.lock();
            if session.generation != generation
                || session.phase != ConnectionState::Connecting
                || !self.running.load(Ordering::SeqCst)
            {
                link.shutdown();
                session.generation += 1;
                return Ok(());
            }
            session.liveness = Liveness::new(
                now,
                self.timing.liveness_timeout(),
                self.timing.chunk_grace(),
            );
            session.pending.clear();
            session.late_chunks.clear();
            session.next_heartbeat = now + self.timing.heartbeat_interval();
            log::info!("{}: Link up to {}", self.kind, peer);
            session.connection = Some(Connection { link, outbox, peer });
            session.phase = ConnectionState::Connected;
            self.notify(&mut session, true);
        }

        // Handshake
        for message in [Outbound::ReqName, Outbound::ReqVersion] {
            if let Err(e) = self.send(&message, self.timing.send_timeout(), AckAction::None) {
                log::warn!("{}: Handshake {} failed: {}", self.kind, message.kind(), e);
            }
        }
        Ok(())
    }

    fn spawn_reader(self: &Arc<Self>, generation: u64, link: Box<dyn Link>) -> Result<()> {
        let inner = Arc::clone(self);
        thread::Builder::new()
            .name(format!("{}-reader", self.kind).to_lowercase())
            .spawn(move || run_reader(inner, generation, link))?;
        Ok(())
    }

    fn spawn_writer(
        self: &Arc<Self>,
        generation: u64,
        link: Box<dyn Link>,
        outbox: Receiver<Vec<u8>>,
    ) -> Result<()> {
        let inner = Arc::clone(self);
        thread::Builder::new()
            .name(format!("{}-writer", self.kind).to_lowercase())
            .spawn(move || run_writer(inner, generation, link, outbox))?;
        Ok(())
    }

    /// Heartbeat, liveness and ack expiry while connected
    fn tick_connected(&self, now: Instant) {
        let (heartbeat_due, verdict) = {
            let mut session = self.session.lock();
            if session.phase != ConnectionState::Connected {
                return;
            }

            let heartbeat_due = now >= session.next_heartbeat;
            if heartbeat_due {
                session.next_heartbeat = now + self.timing.heartbeat_interval();
            }

            let expired: Vec<u64> = session
                .pending
                .iter()
                .filter(|(_, p)| now >= p.deadline)
                .map(|(&seq, _)| seq)
                .collect();
            let mut ack_missed = false;
            for seq in expired {
                if let Some(pending) = session.pending.remove(&seq) {
                    log::warn!("{}: No ack for {} #{}", self.kind, pending.kind, seq);
                    if pending.action == AckAction::ChunkDelivered {
                        session.late_chunks.insert(seq);
                    }
                    ack_missed = true;
                }
            }

            let verdict = if heartbeat_due {
                session.liveness.check(now)
            } else {
                Verdict::Alive
            };
            let verdict = match verdict {
                Verdict::Alive if ack_missed => session.liveness.failure(now),
                other => other,
            };
            (heartbeat_due, verdict)
        };

        match verdict {
            Verdict::Expired => {
                log::warn!("{}: Peer unresponsive, reconnecting", self.kind);
                self.stop();
                return;
            }
            Verdict::Deferred => {
                log::debug!("{}: Liveness failure ignored during upload", self.kind);
            }
            Verdict::Alive => {}
        }

        if heartbeat_due {
            let heartbeat = Outbound::Heartbeat {
                device_id: self.device_id.clone(),
                mode: *self.mode.lock(),
            };
            for message in [heartbeat, Outbound::ReqVersion] {
                if let Err(e) = self.send(&message, self.timing.send_timeout(), AckAction::None) {
                    log::debug!("{}: {} not sent: {}", self.kind, message.kind(), e);
                }
            }
        }
    }

    fn handle_frame(&self, generation: u64, payload: &[u8]) {
        let now = Instant::now();
        {
            // Any well-framed payload proves the peer is alive
            let mut session = self.session.lock();
            if session.generation != generation {
                return;
            }
            session.liveness.received(now);
        }

        let message = match Envelope::decode(payload).and_then(Inbound::from_envelope) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("{}: Dropping inbound frame: {}", self.kind, e);
                return;
            }
        };

        match message {
            Inbound::Ack { seq } => {
                let mut session = self.session.lock();
                let delivered = match session.pending.remove(&seq) {
                    Some(pending) => pending.action == AckAction::ChunkDelivered,
                    None => session.late_chunks.remove(&seq),
                };
                if delivered {
                    session.liveness.chunk_sent(now);
                }
            }
            Inbound::Version(version) => {
                self.packs.lock().version.log(Some(&version));
                let matched = version == PROTOCOL_VERSION;
                if !matched {
                    log::warn!(
                        "{}: Protocol mismatch, peer {} local {}",
                        self.kind,
                        version,
                        PROTOCOL_VERSION
                    );
                }
                self.session.lock().version = Some(version.clone());
                self.emit(ClientEvent::VersionChecked { version, matched });
            }
            Inbound::Name(name) => {
                log::info!("{}: Peer name {}", self.kind, name);
                self.session.lock().name = Some(name.clone());
                self.emit(ClientEvent::Message(Inbound::Name(name)));
            }
            Inbound::DeviceStatus(mut status) => {
                status.sort_devices();
                self.packs.lock().device.log(Some(&format!("{:?}", status.level)));
                self.emit(ClientEvent::Message(Inbound::DeviceStatus(status)));
            }
            Inbound::SystemStatus(status) => {
                self.packs.lock().system.log(Some(&format!("{:?}", status.level)));
                self.emit(ClientEvent::Message(Inbound::SystemStatus(status)));
            }
            Inbound::BatteryStatus(status) => {
                self.packs.lock().battery.log(Some(&status.message));
                self.emit(ClientEvent::Message(Inbound::BatteryStatus(status)));
            }
            Inbound::Touch(status) => {
                self.packs.lock().touch.log(Some(&format!("{:?}", status.level)));
                self.emit(ClientEvent::Message(Inbound::Touch(status)));
            }
            other => {
                log::debug!("{}: Received {:?}", self.kind, other);
                self.emit(ClientEvent::Message(other));
            }
        }
    }
}

fn run_worker(inner: Arc<Inner>) {
    log::info!("{}: Worker thread started", inner.kind);
    let mut next_poll = Instant::now();

    while inner.running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        let phase = inner.session.lock().phase;

        match phase {
            ConnectionState::Disconnected if cycle_start >= next_poll => {
                next_poll = cycle_start + inner.timing.connect_interval();
                inner.poll_connect();
            }
            ConnectionState::Connected => inner.tick_connected(cycle_start),
            _ => {}
        }

        let elapsed = cycle_start.elapsed();
        if elapsed < TICK {
            thread::sleep(TICK - elapsed);
        }
    }

    log::info!("{}: Worker thread stopped", inner.kind);
}

fn run_reader(inner: Arc<Inner>, generation: u64, mut link: Box<dyn Link>) {
    log::debug!("{}: Reader thread started (generation {})", inner.kind, generation);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = FrameDecoder::new();

    'read: while inner.is_current(generation) {
        match link.read(&mut buffer) {
            Ok(0) => {}
            Ok(n) => {
                decoder.push(&buffer[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(payload)) => inner.handle_frame(generation, &payload),
                        Ok(None) => break,
                        Err(e) => {
                            log::error!("{}: Unrecoverable stream: {}", inner.kind, e);
                            inner.stop_generation(generation);
                            break 'read;
                        }
                    }
                }
            }
            Err(e) => {
                if inner.is_current(generation) {
                    log::info!("{}: Connection lost: {}", inner.kind, e);
                }
                inner.stop_generation(generation);
                break;
            }
        }
    }

    log::debug!("{}: Reader thread stopped (generation {})", inner.kind, generation);
}

fn run_writer(
    inner: Arc<Inner>,
    generation: u64,
    mut link: Box<dyn Link>,
    outbox: Receiver<Vec<u8>>,
) {
    loop {
        match outbox.recv_timeout(WRITER_POLL) {
            Ok(frame) => {
                if let Err(e) = link.write_all(&frame) {
                    log::warn!("{}: Write failed: {}", inner.kind, e);
                    inner.stop_generation(generation);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !inner.is_current(generation) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
