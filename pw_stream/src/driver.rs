//! ABOUTME: Single-owner task that serialises every stream transition
//! ABOUTME: Applies state machine effects: transports, reconnect timers, notifications

use pw_config::StreamConfig;
use pw_core::{utc_now, MonotonicTimer};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::history::History;
use crate::machine::{ConnectionMachine, ConnectionState, Effect};
use crate::metrics::StreamMetrics;
use crate::registry::SubscriptionRegistry;
use crate::sample::{parse_frame, Sample};
use crate::transport::{Connector, TransportEvent, TransportHandle, TransportSink};

/// Requests from the public handles
#[derive(Debug)]
pub(crate) enum Command {
    Connect(String),
    Disconnect,
    Seed { key: String, samples: Vec<Sample> },
    Send(String),
    Shutdown,
}

/// Callbacks from transports and timers
#[derive(Debug)]
pub(crate) enum DriverEvent {
    Transport { transport: u64, event: TransportEvent },
    ReconnectDue { timer: u64 },
}

/// Named, cancellable reconnect timer
struct ReconnectTimer {
    id: u64,
    task: JoinHandle<()>,
}

impl ReconnectTimer {
    fn cancel(self) {
        self.task.abort();
    }
}

/// State readable by observers without going through the driver
#[derive(Debug)]
pub(crate) struct Shared {
    pub history: History,
    pub registry: SubscriptionRegistry,
    pub state: RwLock<ConnectionState>,
}

impl Shared {
    pub fn state(&self) -> ConnectionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct Driver {
    config: StreamConfig,
    machine: ConnectionMachine,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    metrics: StreamMetrics,
    transport: Option<(u64, TransportHandle)>,
    reconnect: Option<ReconnectTimer>,
    opening: MonotonicTimer,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<DriverEvent>,
    events_tx: mpsc::UnboundedSender<DriverEvent>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(event) = self.events.recv() => self.handle_event(event),
            }
        }
        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(key) => {
                let effects = self.machine.connect(&key);
                self.apply(effects);
            }
            Command::Disconnect => {
                let effects = self.machine.disconnect();
                self.apply(effects);
            }
            Command::Seed { key, samples } => {
                if self.shared.history.seed(&key, samples) {
                    self.notify();
                }
            }
            Command::Send(text) => self.send(text),
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Transport { transport, event } => match event {
                TransportEvent::Opened => {
                    let effects = self.machine.on_open(transport);
                    if !effects.is_empty() {
                        info!(
                            key = ?self.machine.active_key(),
                            elapsed_ms = self.opening.elapsed().as_millis(),
                            "Telemetry stream open"
                        );
                    }
                    self.apply(effects);
                }
                TransportEvent::Message(text) => self.handle_frame(transport, &text),
                TransportEvent::Error(message) => {
                    let effects = self.machine.on_error(transport, message.clone());
                    if !effects.is_empty() {
                        self.metrics.transport_errors.inc();
                        warn!(key = ?self.machine.active_key(), error = %message, "Telemetry transport error");
                    }
                    self.apply(effects);
                }
                TransportEvent::Closed => {
                    let effects = self.machine.on_close(transport);
                    if !effects.is_empty() {
                        // the transport is gone; drop our handle without cancelling anything live
                        if self.transport.as_ref().is_some_and(|(id, _)| *id == transport) {
                            self.transport = None;
                        }
                        info!(key = ?self.machine.active_key(), "Telemetry stream closed");
                    }
                    self.apply(effects);
                }
            },
            DriverEvent::ReconnectDue { timer } => {
                if self.reconnect.as_ref().is_some_and(|t| t.id == timer) {
                    self.reconnect = None;
                }
                let effects = self.machine.on_reconnect_due(timer);
                self.apply(effects);
            }
        }
    }

    fn handle_frame(&mut self, transport: u64, text: &str) {
        if !self.machine.accepts_frames(transport) {
            return;
        }
        let Some(key) = self.machine.active_key().map(str::to_string) else {
            return;
        };

        match parse_frame(text, utc_now()) {
            Ok(sample) => {
                self.shared.history.append(&key, sample);
                self.metrics.samples_appended.inc();
                self.notify();
            }
            Err(e) => {
                self.metrics.frames_dropped.inc();
                debug!(key = %key, error = %e, "Dropping malformed telemetry frame");
            }
        }
    }

    fn send(&mut self, text: String) {
        let target = self.machine.sendable_transport();
        match (&self.transport, target) {
            (Some((id, handle)), Some(live)) if *id == live => {
                if !handle.send(text) {
                    debug!("Transport gone before outbound message could be queued");
                }
            }
            _ => debug!(status = %self.machine.status(), "Dropping outbound message, stream not open"),
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Open { key, transport } => self.open(key, transport),
                Effect::Close { transport } => {
                    if let Some((id, handle)) = self.transport.take() {
                        if id == transport {
                            debug!(transport, "Releasing telemetry transport");
                            handle.close();
                        } else {
                            self.transport = Some((id, handle));
                        }
                    }
                }
                Effect::ScheduleReconnect { timer, delay } => self.schedule_reconnect(timer, delay),
                Effect::CancelReconnect { timer } => {
                    if let Some(pending) = self.reconnect.take() {
                        debug!(timer, "Cancelling scheduled reconnect");
                        pending.cancel();
                    }
                }
                Effect::Notify => self.notify(),
                Effect::RetriesExhausted { key, attempts } => {
                    error!(key = %key, attempts, "Reconnect attempts exhausted, stream stays closed");
                }
            }
        }
        self.publish();
    }

    fn open(&mut self, key: String, transport: u64) {
        let sink = TransportSink::new(transport, self.events_tx.clone());
        self.opening.reset();

        match self.config.stream_url(&key) {
            Ok(url) => {
                self.metrics.connections_opened.inc();
                info!(key = %key, url = %url, transport, "Opening telemetry stream");
                let handle = self.connector.open(url, sink);
                self.transport = Some((transport, handle));
            }
            Err(e) => {
                // surfaces as error + close so the normal retry policy applies
                warn!(key = %key, error = %e, "Cannot build stream URL");
                sink.error(e.to_string());
                sink.closed();
            }
        }
    }

    fn schedule_reconnect(&mut self, timer: u64, delay: Duration) {
        if let Some(previous) = self.reconnect.take() {
            previous.cancel();
        }
        self.metrics.reconnects_scheduled.inc();
        info!(
            key = ?self.machine.active_key(),
            attempt = self.machine.state().reconnect_attempts,
            delay_ms = delay.as_millis(),
            "Scheduling telemetry reconnect"
        );

        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(DriverEvent::ReconnectDue { timer });
        });
        self.reconnect = Some(ReconnectTimer { id: timer, task });
    }

    fn publish(&self) {
        *self
            .shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.machine.state();
    }

    fn notify(&self) {
        self.publish();
        self.shared.registry.notify_all();
    }

    fn teardown(&mut self) {
        // observers must not see a live status once the driver is gone
        let effects = self.machine.disconnect();
        self.apply(effects);

        if let Some(pending) = self.reconnect.take() {
            pending.cancel();
        }
        if let Some((_, handle)) = self.transport.take() {
            handle.close();
        }
        debug!("Stream driver stopped");
    }
}

/// Running driver plus the handles needed to talk to it
#[derive(Debug)]
pub(crate) struct StreamCore {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    metrics: StreamMetrics,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamCore {
    /// Spawn the driver task; must be called inside a tokio runtime
    pub fn spawn(config: StreamConfig, connector: Arc<dyn Connector>, metrics: StreamMetrics) -> Self {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            history: History::new(config.max_points),
            registry: SubscriptionRegistry::new(),
            state: RwLock::new(ConnectionState::default()),
        });

        let driver = Driver {
            machine: ConnectionMachine::new(config.max_reconnects, config.reconnect_delay()),
            config,
            connector,
            shared: Arc::clone(&shared),
            metrics: metrics.clone(),
            transport: None,
            reconnect: None,
            opening: MonotonicTimer::new(),
            commands,
            events,
            events_tx,
        };
        let task = tokio::spawn(driver.run());

        Self {
            commands: commands_tx,
            shared,
            metrics,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Stream driver has shut down, ignoring command");
        }
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    /// Stop the driver and wait for it to release its transport
    pub async fn shutdown(&self) {
        self.command(Command::Shutdown);
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Stream driver task failed");
            }
        }
    }
}
