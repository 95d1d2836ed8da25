//! Target force profiles for the voluntary-motion exercise.
//!
//! A profile is one stimulation cycle worth of force values. It is either a
//! synthetic sine or the mean cycle of a logged session, where each cycle runs
//! from one `TRIG` row to the next.
use ndarray::{Array2, Axis};
use std::f64::consts::PI;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::drivers::ProfileError;
use crate::types::LogRecord;

#[derive(Clone, Debug, PartialEq)]
pub struct ProfileOptions {
    /// Points per resampled cycle.
    pub points: usize,
    /// Applied to every logged force value (kgf -> N by default).
    pub force_scale: f64,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            points: 200,
            force_scale: 9.81,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TargetProfile {
    values: Vec<f64>,
    cycle_time: f64,
}

impl TargetProfile {
    pub fn new(values: Vec<f64>, cycle_time: f64) -> Self {
        Self { values, cycle_time }
    }

    /// `len` points of `amplitude * sin(2π f t / len)` with `t` evenly spaced on `[0, len]`.
    pub fn synthetic(len: usize, amplitude: f64, frequency: f64, cycle_time: f64) -> Self {
        let len = len.max(2);
        let span = len as f64;
        let values = (0..len)
            .map(|i| {
                let t = span * i as f64 / (len - 1) as f64;
                amplitude * (2.0 * PI * frequency * t / span).sin()
            })
            .collect();
        Self { values, cycle_time }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn cycle_time(&self) -> f64 {
        self.cycle_time
    }

    pub fn peak(&self) -> f64 {
        self.values.iter().copied().fold(f64::MIN, f64::max)
    }

    /// `[seconds, force]` pairs spread over one cycle.
    pub fn plot_points(&self) -> Vec<[f64; 2]> {
        let last = self.values.len().saturating_sub(1).max(1) as f64;
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| [self.cycle_time * i as f64 / last, *v])
            .collect()
    }
}

pub fn load_cycle_profile(
    path: &Path,
    options: &ProfileOptions,
) -> Result<TargetProfile, ProfileError> {
    let records = read_force_log(path)?;
    let profile = extract_cycle_profile(&records, options)?;
    log::info!(
        "loaded mean profile from {} ({:.2}s cycle)",
        path.display(),
        profile.cycle_time()
    );
    Ok(profile)
}

pub fn read_force_log(path: &Path) -> Result<Vec<LogRecord>, ProfileError> {
    let file = File::open(path).map_err(|source| ProfileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_force_log(file)
}

/// Parse `time,force,other` rows after the header. Every row must have exactly
/// the three columns; raw device text in `other` is quoted when it holds commas.
pub fn parse_force_log<R: Read>(input: R) -> Result<Vec<LogRecord>, ProfileError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ProfileError::MalformedRow {
            line: e.position().map_or(0, |p| p.line() as usize),
            reason: e.to_string(),
        })?;
        let line = row.position().map_or(0, |p| p.line() as usize);
        let time_text = row.get(0).unwrap_or_default();
        let time = time_text
            .parse::<f64>()
            .map_err(|_| ProfileError::MalformedRow {
                line,
                reason: format!("time {time_text:?} is not a number"),
            })?;
        let force = match row.get(1) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<f64>().map_err(|_| ProfileError::MalformedRow {
                line,
                reason: format!("force {text:?} is not a number"),
            })?),
        };
        let tag = row
            .get(2)
            .filter(|t| !t.is_empty())
            .map(str::to_owned);
        records.push(LogRecord { time, force, tag });
    }
    Ok(records)
}

/// Mean cycle between consecutive triggers.
///
/// The reported cycle time is the first trigger pair's spacing only; the shape
/// averages every pair.
pub fn extract_cycle_profile(
    records: &[LogRecord],
    options: &ProfileOptions,
) -> Result<TargetProfile, ProfileError> {
    let triggers: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_trigger())
        .map(|(i, _)| i)
        .collect();
    if triggers.len() < 2 {
        return Err(ProfileError::InsufficientTriggers {
            found: triggers.len(),
        });
    }

    let points = options.points.max(2);
    let mut segments = Array2::<f64>::zeros((triggers.len() - 1, points));
    for (segment, pair) in triggers.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        let origin = records[start].time;
        let duration = records[end].time - origin;
        if !(duration > 0.0) {
            return Err(ProfileError::DegenerateSegment { segment });
        }
        let (times, forces): (Vec<f64>, Vec<f64>) = records[start + 1..end]
            .iter()
            .filter_map(|r| r.force.map(|f| (r.time - origin, f * options.force_scale)))
            .unzip();
        if times.is_empty() {
            return Err(ProfileError::EmptySegment { segment });
        }
        for (k, slot) in segments.row_mut(segment).iter_mut().enumerate() {
            let t = duration * k as f64 / (points - 1) as f64;
            *slot = interpolate(&times, &forces, t);
        }
    }

    let mean = segments
        .mean_axis(Axis(0))
        .ok_or(ProfileError::InsufficientTriggers {
            found: triggers.len(),
        })?;
    let cycle_time = records[triggers[1]].time - records[triggers[0]].time;
    Ok(TargetProfile::new(mean.to_vec(), cycle_time))
}

/// Piecewise-linear interpolation over increasing `xs`, clamped to the end values.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let i = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    if x1 == x0 {
        y1
    } else {
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0.02 s samples of `sin(2π t / 5)` over 10 s with triggers at 0, 5 and 10.
    fn sine_log() -> Vec<LogRecord> {
        let mut records = Vec::new();
        for k in 0..=500 {
            let t = k as f64 * 0.02;
            if k % 250 == 0 {
                records.push(LogRecord::trigger((k / 250) as f64 * 5.0));
            }
            records.push(LogRecord::force(t, (2.0 * PI * t / 5.0).sin()));
        }
        records
    }

    #[test]
    fn averages_a_sine_cycle() {
        let profile = extract_cycle_profile(&sine_log(), &ProfileOptions::default()).unwrap();
        assert_eq!(profile.len(), 200);
        assert_eq!(profile.cycle_time(), 5.0);
        for (k, value) in profile.values().iter().enumerate() {
            let t = 5.0 * k as f64 / 199.0;
            let expected = 9.81 * (2.0 * PI * t / 5.0).sin();
            // the last point clamps to the final sample before the next trigger
            let tolerance = if k == 199 { 0.3 } else { 0.01 };
            assert!(
                (value - expected).abs() < tolerance,
                "point {k}: {value} vs {expected}"
            );
        }
        assert!((profile.peak() - 9.81).abs() < 0.01);
    }

    #[test]
    fn cycle_time_comes_from_the_first_pair() {
        let records = vec![
            LogRecord::trigger(0.0),
            LogRecord::force(1.0, 1.0),
            LogRecord::trigger(2.0),
            LogRecord::force(3.0, 1.0),
            LogRecord::trigger(8.0),
        ];
        let options = ProfileOptions {
            points: 10,
            force_scale: 1.0,
        };
        let profile = extract_cycle_profile(&records, &options).unwrap();
        assert_eq!(profile.cycle_time(), 2.0);
        assert!(profile.values().iter().all(|v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn needs_two_triggers() {
        let records = vec![LogRecord::trigger(0.0), LogRecord::force(0.1, 1.0)];
        let err = extract_cycle_profile(&records, &ProfileOptions::default()).unwrap_err();
        assert!(matches!(err, ProfileError::InsufficientTriggers { found: 1 }));
    }

    #[test]
    fn coincident_triggers_are_degenerate() {
        let records = vec![
            LogRecord::force(0.0, 1.0),
            LogRecord::trigger(1.0),
            LogRecord::trigger(1.0),
            LogRecord::force(1.5, 1.0),
        ];
        let err = extract_cycle_profile(&records, &ProfileOptions::default()).unwrap_err();
        assert!(matches!(err, ProfileError::DegenerateSegment { segment: 0 }));
    }

    #[test]
    fn segment_without_force_is_rejected() {
        let records = vec![
            LogRecord::trigger(0.0),
            LogRecord::raw(0.5, "hello"),
            LogRecord::trigger(1.0),
        ];
        let err = extract_cycle_profile(&records, &ProfileOptions::default()).unwrap_err();
        assert!(matches!(err, ProfileError::EmptySegment { segment: 0 }));
    }

    #[test]
    fn parses_log_text() {
        let text = "time,force,other\n0.0000,1.5,\n0.0200,,TRIG\n\n0.0400,,\"Pulse Status:35,2,3\"\n";
        let records = parse_force_log(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], LogRecord::force(0.0, 1.5));
        assert!(records[1].is_trigger());
        assert_eq!(records[2].tag.as_deref(), Some("Pulse Status:35,2,3"));
    }

    #[test]
    fn malformed_rows_report_their_line() {
        let err = parse_force_log("time,force,other\n0.0,1.0,\nabc,1.0,\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ProfileError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn unquoted_extra_columns_are_malformed() {
        let err = parse_force_log("time,force,other\n0.0,1.0,\n0.1,,a,b\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ProfileError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn reads_back_what_the_recorder_wrote() {
        let path = std::env::temp_dir().join(format!(
            "nmes_force_{}_profile_roundtrip.txt",
            std::process::id()
        ));
        let mut recorder = crate::recorder::SessionRecorder::new();
        recorder.start(&path).unwrap();
        for record in [
            LogRecord::trigger(0.0),
            LogRecord::force(0.5, 2.0),
            LogRecord::raw(0.7, "booted v2, ok"),
            LogRecord::trigger(1.0),
        ] {
            recorder.write_record(&record).unwrap();
        }
        recorder.stop().unwrap();

        let records = read_force_log(&path).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].tag.as_deref(), Some("booted v2, ok"));
        let options = ProfileOptions {
            points: 5,
            force_scale: 1.0,
        };
        let profile = load_cycle_profile(&path, &options).unwrap();
        assert_eq!(profile.cycle_time(), 1.0);
        assert!(profile.values().iter().all(|v| (v - 2.0).abs() < 1e-12));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("nmes_force_missing_log.txt");
        let err = load_cycle_profile(&path, &ProfileOptions::default()).unwrap_err();
        assert!(matches!(err, ProfileError::Io { .. }));
    }

    #[test]
    fn synthetic_profile_spans_one_period() {
        let profile = TargetProfile::synthetic(100, 0.5, 1.0, 5.0);
        assert_eq!(profile.len(), 100);
        assert!(profile.values()[0].abs() < 1e-12);
        assert!(profile.values()[99].abs() < 1e-9);
        assert!((profile.peak() - 0.5).abs() < 1e-3);
        let points = profile.plot_points();
        assert_eq!(points[99][0], 5.0);
    }

    #[test]
    fn interpolation_is_clamped_and_linear() {
        let xs = [1.0, 2.0, 4.0];
        let ys = [10.0, 20.0, 0.0];
        assert_eq!(interpolate(&xs, &ys, 0.0), 10.0);
        assert_eq!(interpolate(&xs, &ys, 1.5), 15.0);
        assert_eq!(interpolate(&xs, &ys, 3.0), 10.0);
        assert_eq!(interpolate(&xs, &ys, 9.0), 0.0);
    }
}
