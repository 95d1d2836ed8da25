use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::Duration;

use crate::config::SimulationConfig;
use crate::drivers::{DeviceCommand, DeviceError, LineSource, StimulationParams};

/// Synthetic device for working without hardware.
///
/// Every read is one tick: a `Force:` line from a sine wave and a `TRIG` line
/// whenever the simulated clock crosses a multiple of the trigger interval, so
/// `N` ticks yield exactly `floor(N * tick / interval)` triggers. `?` is
/// answered with a `Pulse Status:` line on the next read.
pub struct SimulatedDevice {
    amplitude: f64,
    frequency_hz: f64,
    tick: Duration,
    ticks: u64,
    tick_us: u128,
    interval_us: u128,
    triggers_sent: u128,
    params: StimulationParams,
    replies: VecDeque<String>,
}

impl SimulatedDevice {
    pub fn new(config: &SimulationConfig, tick: Duration) -> Self {
        Self {
            amplitude: config.amplitude,
            frequency_hz: config.frequency_hz,
            tick,
            ticks: 0,
            tick_us: tick.as_micros().max(1),
            interval_us: config.trigger_interval().as_micros().max(1),
            triggers_sent: 0,
            params: config.status(),
            replies: VecDeque::new(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.ticks as f64 * self.tick.as_secs_f64()
    }
}

impl LineSource for SimulatedDevice {
    fn read_lines(&mut self) -> Result<Vec<String>, DeviceError> {
        self.ticks += 1;
        let force = self.amplitude * (2.0 * PI * self.frequency_hz * self.elapsed_secs()).sin();
        let mut lines = vec![format!("Force:{force:.2}")];

        let due = self.ticks as u128 * self.tick_us / self.interval_us;
        while self.triggers_sent < due {
            self.triggers_sent += 1;
            lines.push("TRIG".to_owned());
        }
        lines.extend(self.replies.drain(..));
        Ok(lines)
    }

    fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError> {
        match command {
            DeviceCommand::Tare => log::debug!("simulated tare"),
            DeviceCommand::SetStimulation(params) => self.params = *params,
            DeviceCommand::QueryStatus => {
                let p = self.params;
                self.replies.push_back(format!(
                    "Pulse Status: {},{},{}",
                    p.frequency, p.on_time, p.off_time
                ));
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "Simulation".to_owned()
    }
}
