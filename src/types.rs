// src/types.rs
use crate::drivers::StimulationParams;

// which kind of device the user picked
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ConnectionMode {
    Simulation,
    Hardware,
}

// what to connect to
#[derive(PartialEq, Clone, Debug)]
pub enum ConnectionTarget {
    Serial { port: String },
    Simulation,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Simulated,
}

impl ConnectionState {
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Simulated)
    }
}

// forwarded from the main session to subscribers (voluntary window)
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionEvent {
    Force(f64),
    Trigger,
    Status(StimulationParams),
}

/// One row of the session log: `time,force,other`.
///
/// Exactly one of `force` / `tag` is set; `tag` is `TRIG` or raw device text.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub time: f64,
    pub force: Option<f64>,
    pub tag: Option<String>,
}

pub const TRIGGER_TAG: &str = "TRIG";
pub const LOG_COLUMNS: [&str; 3] = ["time", "force", "other"];

impl LogRecord {
    pub fn force(time: f64, force: f64) -> Self {
        Self {
            time,
            force: Some(force),
            tag: None,
        }
    }

    pub fn trigger(time: f64) -> Self {
        Self::raw(time, TRIGGER_TAG)
    }

    pub fn raw(time: f64, text: &str) -> Self {
        Self {
            time,
            force: None,
            tag: Some(text.to_owned()),
        }
    }

    pub fn is_trigger(&self) -> bool {
        self.tag.as_deref() == Some(TRIGGER_TAG)
    }

    /// The three log columns; the unused one is left empty.
    pub fn csv_fields(&self) -> [String; 3] {
        [
            format!("{:.4}", self.time),
            self.force.map(|f| f.to_string()).unwrap_or_default(),
            self.tag.clone().unwrap_or_default(),
        ]
    }
}
