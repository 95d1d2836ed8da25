// src/voluntary.rs
use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};

use crate::config::{AppConfig, VoluntaryConfig};
use crate::drivers::{load_cycle_profile, ProfileError, ProfileOptions, RollingBuffer, TargetProfile};
use crate::types::SessionEvent;

/// Secondary force-matching session.
///
/// Fed only by events forwarded from the main session. Each trigger starts a new
/// cycle so the live trace lines up with the target profile.
pub struct VoluntarySession {
    events: Receiver<SessionEvent>,
    buffer: RollingBuffer<f64>,
    // samples since the current cycle began, including evicted ones
    cycle_samples: u64,
    sample_interval: f64,
    current_force: f64,
    max_force: f64,
    cycles: u64,
    cycle_time: Option<f64>,
    profile: TargetProfile,
    settings: VoluntaryConfig,
    profile_options: ProfileOptions,
    detached: bool,
}

impl VoluntarySession {
    pub fn new(events: Receiver<SessionEvent>, config: &AppConfig) -> Self {
        let settings = config.voluntary.clone();
        let sample_interval = config.tick_interval().as_secs_f64();
        let profile = TargetProfile::synthetic(
            settings.target_length,
            settings.default_amplitude,
            1.0,
            settings.target_length as f64 * sample_interval,
        );
        Self {
            events,
            buffer: RollingBuffer::new(profile.len()),
            cycle_samples: 0,
            sample_interval,
            current_force: 0.0,
            max_force: 0.0,
            cycles: 0,
            cycle_time: None,
            profile,
            settings,
            profile_options: ProfileOptions {
                points: config.profile_points,
                force_scale: config.force_scale,
            },
            detached: false,
        }
    }

    /// Apply every event waiting on the channel. Never blocks.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.detached {
                        log::info!("voluntary session lost its event source");
                    }
                    self.detached = true;
                    break;
                }
            }
        }
        handled
    }

    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Force(value) => {
                self.current_force = value;
                self.max_force = self.max_force.max(value);
                self.buffer.append(value);
                self.cycle_samples += 1;
            }
            SessionEvent::Trigger => {
                self.buffer.clear();
                self.buffer.mark_trigger();
                self.cycle_samples = 0;
                self.cycles += 1;
            }
            SessionEvent::Status(params) => self.set_cycle_time(params.cycle_time()),
        }
    }

    /// Rescale the synthetic target to the stimulation cycle.
    pub fn set_cycle_time(&mut self, cycle_time: f64) {
        self.cycle_time = Some(cycle_time);
        let frequency = if cycle_time > 0.0 { 1.0 / cycle_time } else { 1.0 };
        let profile = TargetProfile::synthetic(
            self.settings.target_length,
            self.settings.default_amplitude,
            frequency,
            cycle_time,
        );
        self.set_profile(profile);
    }

    pub fn load_default_profile(&mut self, amplitude: f64) {
        let len = self.settings.target_length;
        let profile =
            TargetProfile::synthetic(len, amplitude, 1.0, len as f64 * self.sample_interval);
        self.set_profile(profile);
    }

    /// Mean cycle from a session log. On error the current target is kept.
    pub fn load_profile_from_log(&mut self, path: &Path) -> Result<(), ProfileError> {
        let profile = load_cycle_profile(path, &self.profile_options)?;
        self.cycle_time = Some(profile.cycle_time());
        self.set_profile(profile);
        Ok(())
    }

    // the live trace keeps exactly one target's worth of samples
    fn set_profile(&mut self, profile: TargetProfile) {
        let mut buffer = RollingBuffer::new(profile.len());
        for value in self.buffer.values() {
            buffer.append(*value);
        }
        self.buffer = buffer;
        self.profile = profile;
    }

    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    pub fn buffer(&self) -> &RollingBuffer<f64> {
        &self.buffer
    }

    pub fn cycle_time(&self) -> Option<f64> {
        self.cycle_time
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn current_force(&self) -> f64 {
        self.current_force
    }

    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// `[seconds into the cycle, force]` for the live trace.
    pub fn trace_points(&self) -> Vec<[f64; 2]> {
        let first = self.cycle_samples.saturating_sub(self.buffer.len() as u64);
        self.buffer
            .values()
            .enumerate()
            .map(|(i, v)| [(first + i as u64) as f64 * self.sample_interval, *v])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::StimulationParams;
    use std::sync::mpsc::{channel, Sender};

    fn session() -> (Sender<SessionEvent>, VoluntarySession) {
        let (tx, rx) = channel();
        (tx, VoluntarySession::new(rx, &AppConfig::default()))
    }

    #[test]
    fn forces_fill_a_target_sized_window() {
        let (tx, mut voluntary) = session();
        for i in 0..130 {
            tx.send(SessionEvent::Force(i as f64)).unwrap();
        }
        assert_eq!(voluntary.pump(), 130);
        assert_eq!(voluntary.buffer().len(), voluntary.profile().len());
        assert_eq!(voluntary.max_force(), 129.0);
        let trace = voluntary.trace_points();
        assert_eq!(trace[0][1], 30.0);
        assert!((trace[0][0] - 30.0 * 0.02).abs() < 1e-9);
    }

    #[test]
    fn trigger_starts_a_new_cycle() {
        let (tx, mut voluntary) = session();
        tx.send(SessionEvent::Force(1.0)).unwrap();
        tx.send(SessionEvent::Force(2.0)).unwrap();
        tx.send(SessionEvent::Trigger).unwrap();
        tx.send(SessionEvent::Force(3.0)).unwrap();
        voluntary.pump();
        assert_eq!(voluntary.cycles(), 1);
        assert_eq!(voluntary.trace_points(), vec![[0.0, 3.0]]);
        assert_eq!(voluntary.buffer().markers().next().unwrap().position, 0);
    }

    #[test]
    fn status_rescales_the_target() {
        let (tx, mut voluntary) = session();
        tx.send(SessionEvent::Status(StimulationParams::new(35.0, 2.0, 3.0)))
            .unwrap();
        voluntary.pump();
        assert_eq!(voluntary.cycle_time(), Some(5.0));
        let expected = TargetProfile::synthetic(100, 0.5, 0.2, 5.0);
        assert_eq!(voluntary.profile(), &expected);

        voluntary.set_cycle_time(0.0);
        assert_eq!(voluntary.profile(), &TargetProfile::synthetic(100, 0.5, 1.0, 0.0));
    }

    #[test]
    fn default_profile_uses_amplitude() {
        let (_tx, mut voluntary) = session();
        voluntary.load_default_profile(3.0);
        assert!((voluntary.profile().peak() - 3.0).abs() < 0.01);
    }

    #[test]
    fn failed_load_keeps_current_profile() {
        let (_tx, mut voluntary) = session();
        let before = voluntary.profile().clone();
        let path = std::env::temp_dir().join("nmes_force_no_profile_here.txt");
        assert!(voluntary.load_profile_from_log(&path).is_err());
        assert_eq!(voluntary.profile(), &before);
    }

    #[test]
    fn loads_profile_from_log_file() {
        let path = std::env::temp_dir().join(format!(
            "nmes_force_{}_voluntary_profile.txt",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "time,force,other\n0.0,,TRIG\n0.5,1.0,\n1.0,,TRIG\n1.5,1.0,\n2.0,,TRIG\n",
        )
        .unwrap();
        let (tx, mut voluntary) = session();
        tx.send(SessionEvent::Force(4.0)).unwrap();
        voluntary.pump();
        voluntary.load_profile_from_log(&path).unwrap();
        assert_eq!(voluntary.profile().len(), 200);
        assert_eq!(voluntary.cycle_time(), Some(1.0));
        assert_eq!(voluntary.buffer().capacity(), 200);
        assert_eq!(voluntary.buffer().len(), 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn notices_when_the_main_session_goes_away() {
        let (tx, mut voluntary) = session();
        drop(tx);
        assert_eq!(voluntary.pump(), 0);
        assert!(voluntary.is_detached());
    }
}
