// src/drivers/mod.rs
// device protocol, sources and the signal helpers built on them
pub mod buffer;
pub mod error;
pub mod profile;
pub mod protocol;
pub mod serial;
pub mod simulation;
pub mod source;
// re-exported for the session and GUI layers
pub use buffer::{RollingBuffer, TriggerMarker};
pub use error::{DeviceError, ParseError, ProfileError};
pub use profile::{load_cycle_profile, ProfileOptions, TargetProfile};
pub use protocol::{decode_line, DeviceCommand, DeviceEvent, StimulationParams, BAUD_RATE};
pub use serial::SerialLink;
pub use simulation::SimulatedDevice;
pub use source::{LineSource, LineSplitter};
#[cfg(test)]
pub use source::ManualSource;
