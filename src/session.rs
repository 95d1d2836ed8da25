// src/session.rs
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use thiserror::Error;

use crate::config::AppConfig;
use crate::drivers::{
    decode_line, DeviceCommand, DeviceError, DeviceEvent, LineSource, ParseError, RollingBuffer,
    SerialLink, SimulatedDevice, StimulationParams, TriggerMarker,
};
use crate::recorder::{RecorderError, SessionRecorder};
use crate::types::{ConnectionState, ConnectionTarget, LogRecord, SessionEvent, TRIGGER_TAG};
use crate::voluntary::VoluntarySession;

/// What the session needs from whatever is drawing it.
pub trait ForceDisplay {
    fn display_force(&mut self, current: f64, max: f64);
    fn add_marker(&mut self, marker: &TriggerMarker);
    fn remove_marker(&mut self, marker: &TriggerMarker);
    fn show_message(&mut self, message: &str);
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(#[source] DeviceError),
    #[error("not connected to a device")]
    NotConnected,
    #[error("sending command failed: {0}")]
    DeviceWrite(#[source] DeviceError),
    #[error("log file: {0}")]
    FileIo(#[from] RecorderError),
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub lines: usize,
    pub forces: usize,
    pub triggers: usize,
    pub errors: usize,
}

/// One device session: connection, scrolling buffer, force trackers, the CSV
/// log and the subscribers that receive forwarded events.
pub struct SessionController {
    config: AppConfig,
    state: ConnectionState,
    source: Option<Box<dyn LineSource>>,
    buffer: RollingBuffer<f64>,
    current_force: f64,
    max_force: f64,
    recorder: SessionRecorder,
    subscribers: Vec<Sender<SessionEvent>>,
}

impl SessionController {
    pub fn new(config: AppConfig) -> Self {
        let buffer = RollingBuffer::new(config.plot_length);
        Self {
            config,
            state: ConnectionState::Disconnected,
            source: None,
            buffer,
            current_force: 0.0,
            max_force: 0.0,
            recorder: SessionRecorder::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn buffer(&self) -> &RollingBuffer<f64> {
        &self.buffer
    }

    #[cfg(test)]
    pub fn current_force(&self) -> f64 {
        self.current_force
    }

    #[cfg(test)]
    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    pub fn is_logging(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.recorder.path()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn source_name(&self) -> Option<String> {
        self.source.as_ref().map(|s| s.describe())
    }

    // ==================== CONNECTION ====================

    /// Open a device. An existing connection is closed first; on failure the
    /// session stays disconnected.
    pub fn connect(&mut self, target: ConnectionTarget) -> Result<(), SessionError> {
        if self.state != ConnectionState::Disconnected {
            self.disconnect();
        }
        match target {
            ConnectionTarget::Simulation => {
                let device = SimulatedDevice::new(&self.config.simulation, self.config.tick_interval());
                self.connect_source(Box::new(device), ConnectionState::Simulated);
            }
            ConnectionTarget::Serial { port } => {
                self.state = ConnectionState::Connecting;
                match SerialLink::open(&port, self.config.baud_rate) {
                    Ok(link) => self.connect_source(Box::new(link), ConnectionState::Connected),
                    Err(e) => {
                        log::warn!("{e}");
                        self.state = ConnectionState::Disconnected;
                        return Err(SessionError::Connection(e));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn connect_source(&mut self, source: Box<dyn LineSource>, state: ConnectionState) {
        log::info!("connected to {} ({state:?})", source.describe());
        self.source = Some(source);
        self.state = state;
    }

    /// Drop the device handle. The log stays open until toggled off.
    pub fn disconnect(&mut self) {
        if let Some(source) = self.source.take() {
            log::info!("disconnected from {}", source.describe());
        }
        self.state = ConnectionState::Disconnected;
    }

    // ==================== POLLING ====================

    /// One timer tick: read whatever the device has and dispatch every line.
    /// A read failure is reported and the next tick simply tries again.
    pub fn tick(&mut self, ui: &mut dyn ForceDisplay) -> TickSummary {
        let mut summary = TickSummary::default();
        if !self.state.is_live() {
            return summary;
        }
        let Some(source) = self.source.as_mut() else {
            return summary;
        };
        let lines = match source.read_lines() {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("{e}");
                ui.show_message(&format!("Read error: {e}"));
                summary.errors += 1;
                return summary;
            }
        };
        for line in &lines {
            summary.lines += 1;
            match self.dispatch_line(line, ui) {
                Ok(DeviceEvent::Force(_)) => summary.forces += 1,
                Ok(DeviceEvent::Trigger) => summary.triggers += 1,
                Ok(_) => {}
                Err(_) => summary.errors += 1,
            }
        }
        if summary.lines > 0 {
            log::debug!("tick: {summary:?}");
        }
        summary
    }

    /// Decode one line and apply it to the session.
    pub fn dispatch_line(
        &mut self,
        line: &str,
        ui: &mut dyn ForceDisplay,
    ) -> Result<DeviceEvent, ParseError> {
        let event = match decode_line(line) {
            Ok(event) => event,
            Err(e) => {
                log::warn!("{e}");
                ui.show_message(&format!("Error parsing: {e}"));
                return Err(e);
            }
        };
        match &event {
            DeviceEvent::Force(value) => self.handle_force(*value, ui),
            DeviceEvent::Trigger => self.handle_trigger(ui),
            DeviceEvent::Status(params) => self.handle_status(*params, ui),
            DeviceEvent::Raw(text) => {
                ui.show_message(text);
                self.write_log(LogRecord::raw(self.elapsed(), text), ui);
            }
        }
        Ok(event)
    }

    fn handle_force(&mut self, value: f64, ui: &mut dyn ForceDisplay) {
        self.current_force = value;
        if value > self.max_force {
            self.max_force = value;
        }
        self.write_log(LogRecord::force(self.elapsed(), value), ui);
        for marker in self.buffer.append(value) {
            ui.remove_marker(&marker);
        }
        ui.display_force(self.current_force, self.max_force);
        self.broadcast(SessionEvent::Force(value));
    }

    fn handle_trigger(&mut self, ui: &mut dyn ForceDisplay) {
        let marker = self.buffer.mark_trigger();
        ui.add_marker(&marker);
        ui.show_message(TRIGGER_TAG);
        self.write_log(LogRecord::trigger(self.elapsed()), ui);
        self.broadcast(SessionEvent::Trigger);
    }

    fn handle_status(&mut self, params: StimulationParams, ui: &mut dyn ForceDisplay) {
        log::debug!("stimulation status {params:?}");
        ui.show_message(&format!(
            "NMES status: freq={}, on={}, off={}, cycle={}",
            params.frequency,
            params.on_time,
            params.off_time,
            params.cycle_time()
        ));
        self.broadcast(SessionEvent::Status(params));
    }

    // log rows are timed from the start of the log, not the connection
    fn elapsed(&self) -> f64 {
        self.recorder.elapsed()
    }

    // ==================== LOGGING ====================

    /// Start logging to `path` or stop the current log. Returns whether a log
    /// is open afterwards.
    pub fn toggle_log(&mut self, path: &Path) -> Result<bool, SessionError> {
        if self.recorder.is_recording() {
            self.recorder.stop()?;
            Ok(false)
        } else {
            self.recorder.start(path)?;
            Ok(true)
        }
    }

    // a failed write turns logging off rather than failing every later row
    fn write_log(&mut self, record: LogRecord, ui: &mut dyn ForceDisplay) {
        if let Err(e) = self.recorder.write_record(&record) {
            log::warn!("{e}; logging disabled");
            ui.show_message(&format!("Logging stopped: {e}"));
            if let Err(e) = self.recorder.stop() {
                log::warn!("closing log failed: {e}");
            }
        }
    }

    // ==================== DEVICE COMMANDS ====================

    pub fn reset_max(&mut self, ui: &mut dyn ForceDisplay) {
        self.max_force = 0.0;
        ui.display_force(self.current_force, self.max_force);
    }

    pub fn tare(&mut self) -> Result<(), SessionError> {
        self.send(DeviceCommand::Tare)
    }

    pub fn send_stimulation(&mut self, params: StimulationParams) -> Result<(), SessionError> {
        self.send(DeviceCommand::SetStimulation(params))
    }

    pub fn request_status(&mut self) -> Result<(), SessionError> {
        self.send(DeviceCommand::QueryStatus)
    }

    // write failures leave the connection state alone
    fn send(&mut self, command: DeviceCommand) -> Result<(), SessionError> {
        let source = self.source.as_mut().ok_or(SessionError::NotConnected)?;
        source.send(&command).map_err(|e| {
            log::warn!("{e}");
            SessionError::DeviceWrite(e)
        })?;
        log::info!("sent {:?}", command.encode().trim_end());
        Ok(())
    }

    // ==================== SUBSCRIBERS ====================

    /// Forwarded copies of every force, trigger and status event from now on.
    /// Dropping the receiver ends the subscription.
    pub fn subscribe(&mut self) -> Receiver<SessionEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn broadcast(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Subscribe a voluntary-motion session and ask the device for its
    /// stimulation parameters so the target can be scaled.
    pub fn open_voluntary(&mut self, ui: &mut dyn ForceDisplay) -> VoluntarySession {
        let events = self.subscribe();
        let session = VoluntarySession::new(events, &self.config);
        if self.state.is_live() {
            match self.request_status() {
                Ok(()) => ui.show_message("Requested NMES status (?)"),
                Err(e) => ui.show_message(&format!("Status request failed: {e}")),
            }
        }
        session
    }
}
