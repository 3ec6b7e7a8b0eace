//! ABOUTME: Connection lifecycle state machine with bounded fixed-delay reconnects
//! ABOUTME: Pure transitions that return the effects a driver must carry out

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle of the single stream transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Idle => write!(f, "idle"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Open => write!(f, "open"),
            ConnectionStatus::Closed => write!(f, "closed"),
            ConnectionStatus::Errored => write!(f, "errored"),
        }
    }
}

/// Observer-facing snapshot of the connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub active_key: Option<String>,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Idle,
            active_key: None,
            reconnect_attempts: 0,
            last_error: None,
        }
    }
}

/// Side effects requested by a transition, in the order they must run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a transport for `key`; its events are tagged with `transport`
    Open { key: String, transport: u64 },
    /// Release a transport without treating it as a failure
    Close { transport: u64 },
    ScheduleReconnect { timer: u64, delay: Duration },
    CancelReconnect { timer: u64 },
    Notify,
    /// Retry budget used up; the machine stays closed until an explicit connect
    RetriesExhausted { key: String, attempts: u32 },
}

/// Connection state machine for one stream consumer
///
/// Every transport and every reconnect timer gets a fresh generation
/// number. Events carrying a generation other than the live one are
/// stale and ignored, which keeps at most one transport in play.
#[derive(Debug)]
pub struct ConnectionMachine {
    max_reconnects: u32,
    reconnect_delay: Duration,
    status: ConnectionStatus,
    active_key: Option<String>,
    reconnect_attempts: u32,
    last_error: Option<String>,
    transport: Option<u64>,
    pending_reconnect: Option<u64>,
    next_generation: u64,
}

impl ConnectionMachine {
    pub fn new(max_reconnects: u32, reconnect_delay: Duration) -> Self {
        Self {
            max_reconnects,
            reconnect_delay,
            status: ConnectionStatus::Idle,
            active_key: None,
            reconnect_attempts: 0,
            last_error: None,
            transport: None,
            pending_reconnect: None,
            next_generation: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState {
            status: self.status,
            active_key: self.active_key.clone(),
            reconnect_attempts: self.reconnect_attempts,
            last_error: self.last_error.clone(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active_key.as_deref()
    }

    /// Generation of the transport currently owned, if any
    pub fn live_transport(&self) -> Option<u64> {
        self.transport
    }

    pub fn pending_reconnect(&self) -> Option<u64> {
        self.pending_reconnect
    }

    /// Explicit request to stream `key`
    ///
    /// Re-entry on `key` while connecting, open or waiting out a scheduled
    /// reconnect is a no-op. Anything else releases the current transport
    /// (not counted as a failure) and drops a pending reconnect. The retry
    /// budget is restored when the key changes or after it ran out.
    pub fn connect(&mut self, key: &str) -> Vec<Effect> {
        let same_key = self.active_key.as_deref() == Some(key);
        let live = matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Open
        );
        if same_key && live && self.transport.is_some() {
            return Vec::new();
        }
        if same_key && self.pending_reconnect.is_some() {
            return Vec::new();
        }

        let mut effects = self.release();
        if !same_key || self.reconnect_attempts >= self.max_reconnects {
            self.reconnect_attempts = 0;
        }
        self.active_key = Some(key.to_string());
        effects.extend(self.open_transport(key.to_string()));
        effects
    }

    /// Tear down the transport and suppress any further reconnects
    pub fn disconnect(&mut self) -> Vec<Effect> {
        let mut effects = self.release();
        self.reconnect_attempts = self.max_reconnects;
        self.active_key = None;
        self.status = ConnectionStatus::Idle;
        effects.push(Effect::Notify);
        effects
    }

    pub fn on_open(&mut self, transport: u64) -> Vec<Effect> {
        if !self.is_live(transport) {
            return Vec::new();
        }
        self.status = ConnectionStatus::Open;
        self.reconnect_attempts = 0;
        self.last_error = None;
        vec![Effect::Notify]
    }

    /// Record a runtime error; the transport stays up until it closes
    pub fn on_error(&mut self, transport: u64, message: String) -> Vec<Effect> {
        if !self.is_live(transport) {
            return Vec::new();
        }
        if self.status == ConnectionStatus::Connecting {
            self.status = ConnectionStatus::Errored;
        }
        self.last_error = Some(message);
        vec![Effect::Notify]
    }

    /// Unexpected close of the live transport
    pub fn on_close(&mut self, transport: u64) -> Vec<Effect> {
        if !self.is_live(transport) {
            return Vec::new();
        }
        self.transport = None;
        self.status = ConnectionStatus::Closed;

        let mut effects = vec![Effect::Notify];
        let Some(key) = self.active_key.clone() else {
            return effects;
        };

        if self.reconnect_attempts < self.max_reconnects {
            self.reconnect_attempts += 1;
            let timer = self.next_generation();
            self.pending_reconnect = Some(timer);
            effects.push(Effect::ScheduleReconnect {
                timer,
                delay: self.reconnect_delay,
            });
        } else {
            effects.push(Effect::RetriesExhausted {
                key,
                attempts: self.reconnect_attempts,
            });
        }
        effects
    }

    /// A scheduled reconnect fired
    pub fn on_reconnect_due(&mut self, timer: u64) -> Vec<Effect> {
        if self.pending_reconnect != Some(timer) {
            return Vec::new();
        }
        self.pending_reconnect = None;

        match (self.status, self.active_key.clone()) {
            (ConnectionStatus::Closed, Some(key)) => self.open_transport(key),
            _ => Vec::new(),
        }
    }

    /// Whether a data frame from `transport` should be consumed
    pub fn accepts_frames(&self, transport: u64) -> bool {
        self.is_live(transport)
            && matches!(
                self.status,
                ConnectionStatus::Connecting | ConnectionStatus::Open
            )
    }

    /// Transport an outbound message may be written to
    pub fn sendable_transport(&self) -> Option<u64> {
        match self.status {
            ConnectionStatus::Open => self.transport,
            _ => None,
        }
    }

    fn is_live(&self, transport: u64) -> bool {
        self.transport == Some(transport)
    }

    fn release(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(timer) = self.pending_reconnect.take() {
            effects.push(Effect::CancelReconnect { timer });
        }
        if let Some(transport) = self.transport.take() {
            effects.push(Effect::Close { transport });
        }
        effects
    }

    fn open_transport(&mut self, key: String) -> Vec<Effect> {
        let transport = self.next_generation();
        self.transport = Some(transport);
        self.status = ConnectionStatus::Connecting;
        vec![Effect::Open { key, transport }, Effect::Notify]
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}
