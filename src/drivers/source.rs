use crate::drivers::{DeviceCommand, DeviceError};

/// Something that yields device lines on each tick and accepts commands.
pub trait LineSource {
    /// Lines received since the last call, terminators stripped. Must not block.
    fn read_lines(&mut self) -> Result<Vec<String>, DeviceError>;
    fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError>;
    fn describe(&self) -> String;
}

/// Longest partial line kept while waiting for its terminator.
pub const MAX_PENDING: usize = 4096;

/// Reassembles newline-terminated lines from arbitrary byte chunks.
#[derive(Default, Debug)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Complete, non-empty lines found so far; a trailing partial line is kept
    /// for the next chunk. Invalid UTF-8 is dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw).replace(char::REPLACEMENT_CHARACTER, "");
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_owned());
            }
        }
        if self.pending.len() > MAX_PENDING {
            log::warn!(
                "dropping {} bytes received without a line terminator",
                self.pending.len()
            );
            self.pending.clear();
        }
        lines
    }
}

#[cfg(test)]
pub use manual::ManualSource;

#[cfg(test)]
mod manual {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Scripted source: one queued batch per read. Sent commands are shared so a
    /// test can inspect them after handing the source to a session.
    pub struct ManualSource {
        batches: VecDeque<Result<Vec<String>, DeviceError>>,
        sent: Rc<RefCell<Vec<DeviceCommand>>>,
        fail_writes: bool,
    }

    impl ManualSource {
        pub fn new<I, S>(batches: I) -> Self
        where
            I: IntoIterator<Item = Vec<S>>,
            S: Into<String>,
        {
            Self {
                batches: batches
                    .into_iter()
                    .map(|b| Ok(b.into_iter().map(Into::into).collect()))
                    .collect(),
                sent: Rc::default(),
                fail_writes: false,
            }
        }

        pub fn push_error(&mut self, error: DeviceError) {
            self.batches.push_back(Err(error));
        }

        pub fn failing_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }

        pub fn sent(&self) -> Rc<RefCell<Vec<DeviceCommand>>> {
            Rc::clone(&self.sent)
        }
    }

    impl LineSource for ManualSource {
        fn read_lines(&mut self) -> Result<Vec<String>, DeviceError> {
            self.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError> {
            if self.fail_writes {
                return Err(DeviceError::Write(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device gone",
                )));
            }
            self.sent.borrow_mut().push(*command);
            Ok(())
        }

        fn describe(&self) -> String {
            "manual".to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_joins_partial_chunks() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"Force:1.").is_empty());
        assert_eq!(splitter.push(b"5\r\nTRIG\n\nPulse"), vec!["Force:1.5", "TRIG"]);
        assert_eq!(splitter.push(b" Status:35,2,3\n"), vec!["Pulse Status:35,2,3"]);
    }

    #[test]
    fn unterminated_input_is_bounded() {
        let mut splitter = LineSplitter::default();
        let noise = vec![b'x'; MAX_PENDING + 1];
        assert!(splitter.push(&noise).is_empty());
        assert!(splitter.pending.is_empty());
        assert_eq!(splitter.push(b"Force:2\n"), vec!["Force:2"]);
    }

    #[test]
    fn splitter_drops_invalid_bytes() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.push(b"TR\xffIG\n"), vec!["TRIG"]);
    }
}
