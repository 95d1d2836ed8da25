use std::path::PathBuf;
use thiserror::Error;

/// A device line that looked like a known message but could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot parse {line:?}: {reason}")]
pub struct ParseError {
    pub line: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: &str, reason: impl Into<String>) -> Self {
        Self {
            line: line.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("cannot read force log {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed log row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("not enough triggers to define a cycle (found {found}, need at least 2)")]
    InsufficientTriggers { found: usize },
    #[error("segment {segment} has zero duration (two triggers share a timestamp)")]
    DegenerateSegment { segment: usize },
    #[error("segment {segment} contains no force samples")]
    EmptySegment { segment: usize },
}
