use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;

use crate::drivers::{DeviceCommand, DeviceError, LineSource, LineSplitter};

const READ_TIMEOUT: Duration = Duration::from_millis(500);
const MAX_READ_CHUNK: usize = 4096;

/// Force sensor firmware on a real serial port.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
    splitter: LineSplitter,
}

impl SerialLink {
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, DeviceError> {
        let handle = serialport::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|source| DeviceError::Open {
                port: port.to_owned(),
                source,
            })?;
        log::info!("opened {port} at {baud_rate} baud");
        Ok(Self {
            port: handle,
            name: port.to_owned(),
            splitter: LineSplitter::default(),
        })
    }
}

impl LineSource for SerialLink {
    // Reads only what is already waiting, so a tick never blocks on the port.
    fn read_lines(&mut self) -> Result<Vec<String>, DeviceError> {
        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| DeviceError::Read(e.into()))? as usize;
        if waiting == 0 {
            return Ok(Vec::new());
        }
        let mut chunk = vec![0u8; waiting.min(MAX_READ_CHUNK)];
        let n = match self.port.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(DeviceError::Read(e)),
        };
        Ok(self.splitter.push(&chunk[..n]))
    }

    fn send(&mut self, command: &DeviceCommand) -> Result<(), DeviceError> {
        self.port
            .write_all(command.encode().as_bytes())
            .map_err(DeviceError::Write)?;
        self.port.flush().map_err(DeviceError::Write)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
