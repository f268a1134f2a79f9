//! The bridge engine.
//!
//! A single task owns the snapshot and every piece of mutable state. Timer
//! ticks, config changes, inbound MPRIS calls and finished polls all arrive as
//! [`EngineEvent`]s on one channel and are handled strictly in order, so no
//! locking is needed. Network requests run as spawned tasks that report back
//! through the same channel.

use log::{debug, error, info, log, trace, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::config::{BridgeConfig, ConnectionConfig};
use crate::data::{PlayerCall, PlayerView};
use crate::logging::Verbosity;
use crate::mpris::ExportSink;
use crate::players::lms::{status_request, LmsRpcClient, LmsRpcError, RawStatus};
use super::commands::{translate, CommandContext, LocalUpdate};
use super::mapper::{map_status, MappedStatus};
use super::scheduler::{spawn_ticker, Completion, PollCycle};

/// Slack between the extrapolated and the polled position before a poll counts as a seek
const SEEK_TOLERANCE_US: i64 = 1_000_000;

#[derive(Debug)]
pub enum EngineEvent {
    /// Poll timer fired
    Tick,
    /// Out-of-band poll, coalesced with any poll in flight
    Refresh,
    /// New configuration; restarts polling if the connection changed
    ConfigChanged(BridgeConfig),
    /// Method call or property write from the bus
    Call(PlayerCall),
    /// A status poll finished
    PollCompleted {
        id: u64,
        outcome: Result<RawStatus, LmsRpcError>,
    },
    Shutdown,
}

/// Cloneable sender side of the engine's event channel
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    events: UnboundedSender<EngineEvent>,
}

impl BridgeHandle {
    /// Queue an event. Returns false once the engine has stopped.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn call(&self, call: PlayerCall) -> bool {
        self.send(EngineEvent::Call(call))
    }

    pub fn refresh(&self) -> bool {
        self.send(EngineEvent::Refresh)
    }

    pub fn reconfigure(&self, config: BridgeConfig) -> bool {
        self.send(EngineEvent::ConfigChanged(config))
    }

    pub fn shutdown(&self) -> bool {
        self.send(EngineEvent::Shutdown)
    }
}

/// The engine's event channel, created ahead of the engine so that the export
/// can be handed a [`BridgeHandle`] before the bridge exists
pub struct EngineChannel {
    tx: UnboundedSender<EngineEvent>,
    rx: UnboundedReceiver<EngineEvent>,
}

impl EngineChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle { events: self.tx.clone() }
    }
}

impl Default for EngineChannel {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Bridge<S: ExportSink> {
    client: LmsRpcClient,
    sink: S,
    config: BridgeConfig,
    connection: ConnectionConfig,
    verbosity: Verbosity,
    view: PlayerView,
    cycle: PollCycle,
    events_tx: UnboundedSender<EngineEvent>,
    events_rx: UnboundedReceiver<EngineEvent>,
    ticker: Option<JoinHandle<()>>,
    poll_task: Option<JoinHandle<()>>,
    commands: JoinSet<()>,
    /// Message of the failure currently being repeated, if polls are failing
    last_failure: Option<String>,
    released: bool,
}

impl<S: ExportSink> Bridge<S> {
    pub fn new(client: LmsRpcClient, sink: S, config: BridgeConfig) -> Self {
        Self::with_channel(EngineChannel::new(), client, sink, config)
    }

    /// Build the engine on a channel whose handles were given out earlier
    pub fn with_channel(channel: EngineChannel, client: LmsRpcClient, sink: S, config: BridgeConfig) -> Self {
        let EngineChannel { tx: events_tx, rx: events_rx } = channel;
        Self {
            client,
            sink,
            connection: config.connection(),
            verbosity: Verbosity::new(config.verbose_logging),
            view: PlayerView::new(&config.identity),
            config,
            cycle: PollCycle::new(),
            events_tx,
            events_rx,
            ticker: None,
            poll_task: None,
            commands: JoinSet::new(),
            last_failure: None,
            released: false,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle { events: self.events_tx.clone() }
    }

    /// Current exported state
    pub fn view(&self) -> &PlayerView {
        &self.view
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Whether the poll timer is armed
    pub fn timer_active(&self) -> bool {
        self.ticker.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Start polling and process events until `Shutdown`
    pub async fn run(mut self) {
        info!("Lyrion MPRIS bridge starting");
        self.restart();

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }

        self.teardown();
        info!("Lyrion MPRIS bridge stopped");
    }

    /// Handle one event. Returns false when the engine should stop.
    pub fn handle_event(&mut self, event: EngineEvent) -> bool {
        self.reap_commands();
        match event {
            EngineEvent::Tick | EngineEvent::Refresh => self.refresh(),
            EngineEvent::ConfigChanged(config) => self.reconfigure(config),
            EngineEvent::Call(call) => self.dispatch(call),
            EngineEvent::PollCompleted { id, outcome } => self.poll_completed(id, outcome),
            EngineEvent::Shutdown => return false,
        }
        true
    }

    /// Cancel the timer and anything in flight, poll now and re-arm the timer
    pub fn restart(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(poll) = self.poll_task.take() {
            poll.abort();
        }
        let id = self.cycle.restart();
        debug!("Polling restarted, interval {:?}", self.connection.poll_interval());
        self.start_poll(id);
        self.ticker = Some(spawn_ticker(self.connection.poll_interval(), self.events_tx.clone()));
    }

    /// Stop the timer, abort outstanding requests and release the export.
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(poll) = self.poll_task.take() {
            poll.abort();
        }
        self.commands.abort_all();
        self.cycle.cancel();
        if !self.released {
            self.released = true;
            self.sink.release();
            debug!("Export released");
        }
    }

    fn refresh(&mut self) {
        if let Some(id) = self.cycle.request() {
            self.start_poll(id);
        }
    }

    fn reconfigure(&mut self, config: BridgeConfig) {
        let verbosity = Verbosity::new(config.verbose_logging);
        if verbosity.is_verbose() && !self.verbosity.is_verbose() {
            info!("Verbose logging enabled");
        }
        self.verbosity = verbosity;

        let connection = config.connection();
        let connection_changed = connection != self.connection;
        let identity_changed = config.identity != self.config.identity;
        self.config = config;
        self.connection = connection;

        if connection_changed {
            info!("Connection settings changed, restarting polling");
            self.restart();
        } else if identity_changed && !self.view.snapshot.can_control {
            self.view.identity = self.config.identity.clone();
            self.sink.publish(&self.view);
        }
    }

    fn start_poll(&mut self, id: u64) {
        if !self.connection.is_usable() {
            log!(self.verbosity.detail(), "Server address or player id not configured, skipping poll {}", id);
            self.publish_disconnected();
            if let Completion::Apply { follow_up: Some(next) } = self.cycle.complete(id) {
                self.start_poll(next);
            }
            return;
        }

        log!(
            self.verbosity.detail(),
            "LMS refresh requestId={} playerId={} server={}",
            id,
            self.connection.player_id,
            self.connection.base_url()
        );

        let client = self.client.clone();
        let connection = self.connection.clone();
        let events = self.events_tx.clone();
        self.poll_task = Some(tokio::spawn(async move {
            let outcome = client
                .fetch_status(&connection, &connection.player_id, status_request())
                .await;
            let _ = events.send(EngineEvent::PollCompleted { id, outcome });
        }));
    }

    fn poll_completed(&mut self, id: u64, outcome: Result<RawStatus, LmsRpcError>) {
        match self.cycle.complete(id) {
            Completion::Stale => {
                trace!("Discarding superseded poll {}", id);
            }
            Completion::Apply { follow_up } => {
                self.poll_task = None;
                match outcome {
                    Ok(status) => self.apply_status(&status),
                    Err(err) => self.poll_failed(err),
                }
                if let Some(next) = follow_up {
                    self.start_poll(next);
                }
            }
        }
    }

    fn apply_status(&mut self, status: &RawStatus) {
        if self.last_failure.take().is_some() {
            info!("LMS status fetch recovered");
        }

        let mapped = map_status(status, &self.connection);
        log!(
            self.verbosity.detail(),
            "MPRIS state status={} trackId={} posUs={} loop={} shuffle={} volume={:?} canSeek={}",
            mapped.playback_status,
            mapped.metadata.track_id,
            mapped.position_us,
            mapped.loop_status,
            mapped.shuffle,
            mapped.volume,
            mapped.can_seek
        );

        let now = Instant::now();
        let jumped = self.position_jumped(&mapped, now);
        self.view.identity = mapped.identity.clone().unwrap_or_else(|| self.config.identity.clone());
        self.view.snapshot.apply(&mapped, now);
        self.sink.publish(&self.view);
        if jumped {
            log!(self.verbosity.detail(), "Server position jumped to {}us", mapped.position_us);
            self.sink.emit_seeked(self.view.snapshot.position(now));
        }
    }

    /// Whether a poll moved the current track's position somewhere extrapolation
    /// could not have taken it, e.g. a seek from another LMS client
    fn position_jumped(&self, mapped: &MappedStatus, now: Instant) -> bool {
        let snapshot = &self.view.snapshot;
        if !snapshot.can_control
            || snapshot.current_track().is_no_track()
            || *snapshot.current_track() != mapped.metadata.track_id
        {
            return false;
        }
        let drift = mapped.position_us - snapshot.position(now);
        let ahead_tolerance = i64::try_from(self.connection.poll_interval().as_micros())
            .unwrap_or(i64::MAX)
            .saturating_add(SEEK_TOLERANCE_US);
        drift > ahead_tolerance || drift < -SEEK_TOLERANCE_US
    }

    fn poll_failed(&mut self, err: LmsRpcError) {
        let message = err.to_string();
        if self.last_failure.as_deref() == Some(message.as_str()) {
            debug!("LMS status fetch still failing: {}", message);
        } else {
            error!("LMS status fetch failed: {}", message);
        }
        self.last_failure = Some(message);
        self.publish_disconnected();
    }

    fn publish_disconnected(&mut self) {
        self.view.identity = self.config.identity.clone();
        self.view.snapshot.disconnect(Instant::now());
        self.sink.publish(&self.view);
    }

    fn dispatch(&mut self, call: PlayerCall) {
        if !self.connection.is_usable() {
            debug!("Ignoring {}: server address or player id not configured", call);
            return;
        }

        let context = CommandContext {
            current_track: self.view.snapshot.current_track(),
            shuffle_mode: self.connection.shuffle_mode,
        };
        let translation = translate(&call, &context);
        if translation.is_ignored() {
            debug!("Ignoring {}", call);
            return;
        }
        log!(self.verbosity.detail(), "MPRIS {}", call);

        if let Some(command) = translation.command {
            let client = self.client.clone();
            let connection = self.connection.clone();
            let events = self.events_tx.clone();
            let refresh = translation.refresh_after_send;
            self.commands.spawn(async move {
                client.send_command(&connection, &connection.player_id, command).await;
                if refresh {
                    let _ = events.send(EngineEvent::Refresh);
                }
            });
        }

        if let Some(local) = translation.local {
            self.apply_local(local);
        }
    }

    fn apply_local(&mut self, local: LocalUpdate) {
        let now = Instant::now();
        let snapshot = &mut self.view.snapshot;
        let seeked = match local {
            LocalUpdate::SeekBy(offset_us) => {
                let position = snapshot.position(now).saturating_add(offset_us).max(0);
                snapshot.set_position(position, now);
                Some(position)
            }
            LocalUpdate::SeekTo(position) => {
                snapshot.set_position(position, now);
                Some(position.max(0))
            }
            LocalUpdate::Shuffle(enabled) => {
                snapshot.shuffle = enabled;
                None
            }
            LocalUpdate::LoopStatus(status) => {
                snapshot.loop_status = status;
                None
            }
            LocalUpdate::Volume(volume) => {
                snapshot.set_volume(volume);
                None
            }
        };

        self.sink.publish(&self.view);
        if let Some(position) = seeked {
            self.sink.emit_seeked(position);
        }
    }

    /// Drop finished command tasks so the set does not grow without bound
    fn reap_commands(&mut self) {
        while let Some(result) = self.commands.try_join_next() {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    warn!("Command task failed: {}", err);
                }
            }
        }
    }
}

impl<S: ExportSink> Drop for Bridge<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
