//! Line protocol spoken by the force sensor / stimulator firmware.
//!
//! Inbound, one message per line:
//! - `Force:<float>`: one force sample
//! - `TRIG` (any case): one stimulation pulse
//! - `Pulse Status:<freq>,<on>,<off>`: current stimulation parameters
//!
//! Anything else is passed through as raw text.
use crate::drivers::ParseError;

pub const BAUD_RATE: u32 = 115_200;

const FORCE_PREFIX: &str = "Force:";
const TRIGGER_WORD: &str = "TRIG";
const STATUS_PREFIX: &str = "Pulse Status:";

/// Stimulation parameters as reported by (or sent to) the device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StimulationParams {
    pub frequency: f64,
    pub on_time: f64,
    pub off_time: f64,
}

impl StimulationParams {
    pub fn new(frequency: f64, on_time: f64, off_time: f64) -> Self {
        Self {
            frequency,
            on_time,
            off_time,
        }
    }

    pub fn cycle_time(&self) -> f64 {
        self.on_time + self.off_time
    }
}

/// One decoded device line.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceEvent {
    Force(f64),
    Trigger,
    Status(StimulationParams),
    Raw(String),
}

/// Classify a line (already stripped of its terminator). First match wins:
/// force, trigger, status, raw.
pub fn decode_line(line: &str) -> Result<DeviceEvent, ParseError> {
    if let Some(force) = parse_force(line) {
        return force.map(DeviceEvent::Force);
    }
    if line.eq_ignore_ascii_case(TRIGGER_WORD) {
        return Ok(DeviceEvent::Trigger);
    }
    if let Some(rest) = line.strip_prefix(STATUS_PREFIX) {
        return parse_status(line, rest).map(DeviceEvent::Status);
    }
    Ok(DeviceEvent::Raw(line.to_owned()))
}

/// `None` when the line is not a force line at all.
fn parse_force(line: &str) -> Option<Result<f64, ParseError>> {
    let rest = line.strip_prefix(FORCE_PREFIX)?.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'))
        .unwrap_or(rest.len());
    let number = &rest[..end];
    if number.is_empty() {
        return None;
    }
    Some(
        number
            .parse::<f64>()
            .map_err(|e| ParseError::new(line, format!("invalid force value {number:?}: {e}"))),
    )
}

fn parse_status(line: &str, fields: &str) -> Result<StimulationParams, ParseError> {
    let parts: Vec<&str> = fields.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ParseError::new(
            line,
            format!("expected 3 status fields, got {}", parts.len()),
        ));
    }
    let mut values = [0.0f64; 3];
    for (slot, (name, text)) in values
        .iter_mut()
        .zip(["frequency", "on time", "off time"].iter().zip(&parts))
    {
        *slot = text
            .parse()
            .map_err(|_| ParseError::new(line, format!("{name} {text:?} is not a number")))?;
    }
    Ok(StimulationParams::new(values[0], values[1], values[2]))
}

/// Commands written to the device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceCommand {
    /// Zero the force sensor baseline.
    Tare,
    SetStimulation(StimulationParams),
    QueryStatus,
}

impl DeviceCommand {
    pub fn encode(&self) -> String {
        match self {
            DeviceCommand::Tare => "RESET\n".to_owned(),
            DeviceCommand::SetStimulation(p) => {
                format!("{},{},{}\n", p.frequency, p.on_time, p.off_time)
            }
            DeviceCommand::QueryStatus => "?\n".to_owned(),
        }
    }
}
