//! [`MidiBackend`] implementation over midir.
//!
//! Enumeration creates a transient probe client per call and drops it, so
//! nothing stays open between calls and hot-plug events are always visible.

use crate::backend::{
    InputCallback, InputHandle, MidiBackend, OutputHandle, PortDescriptor, PortDirection,
};
use crate::error::{Error, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::debug;

pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    /// Lazy: no OS MIDI client is created until the first enumeration or
    /// open call.
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn input_probe(&self) -> Result<MidiInput> {
        let mut input = MidiInput::new(&self.client_name)?;
        // Deliver everything; filtering is the codec's concern
        input.ignore(Ignore::None);
        Ok(input)
    }

    fn output_probe(&self) -> Result<MidiOutput> {
        Ok(MidiOutput::new(&self.client_name)?)
    }
}

impl std::fmt::Debug for MidirBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidirBackend")
            .field("client_name", &self.client_name)
            .finish()
    }
}

impl MidiBackend for MidirBackend {
    fn enumerate(&self, direction: PortDirection) -> Result<Vec<PortDescriptor>> {
        match direction {
            PortDirection::Input => {
                let probe = self.input_probe()?;
                Ok(probe
                    .ports()
                    .iter()
                    .enumerate()
                    .map(|(index, port)| PortDescriptor {
                        index,
                        name: probe
                            .port_name(port)
                            .unwrap_or_else(|_| format!("Unknown Device {index}")),
                    })
                    .collect())
            }
            PortDirection::Output => {
                let probe = self.output_probe()?;
                Ok(probe
                    .ports()
                    .iter()
                    .enumerate()
                    .map(|(index, port)| PortDescriptor {
                        index,
                        name: probe
                            .port_name(port)
                            .unwrap_or_else(|_| format!("Unknown Device {index}")),
                    })
                    .collect())
            }
        }
    }

    fn open_input(&self, index: usize, mut callback: InputCallback) -> Result<Box<dyn InputHandle>> {
        let probe = self.input_probe()?;
        let ports = probe.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| Error::DeviceOpen(format!("no input port at index {index}")))?;

        // midir reports absolute microsecond timestamps; the codec wants
        // seconds since the previous message on the port.
        let mut last_timestamp: Option<u64> = None;
        let connection = probe.connect(
            port,
            "midilink-in",
            move |timestamp, bytes, _: &mut ()| {
                let delta_time = last_timestamp
                    .map(|prev| timestamp.saturating_sub(prev) as f64 / 1_000_000.0)
                    .unwrap_or(0.0);
                last_timestamp = Some(timestamp);
                callback(delta_time, bytes);
            },
            (),
        )?;
        debug!(index, "opened input port");
        Ok(Box::new(MidirInputHandle {
            _connection: connection,
        }))
    }

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputHandle>> {
        let probe = self.output_probe()?;
        let ports = probe.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| Error::DeviceOpen(format!("no output port at index {index}")))?;

        let connection = probe.connect(port, "midilink-out")?;
        debug!(index, "opened output port");
        Ok(Box::new(MidirOutputHandle { connection }))
    }
}

/// Closes the port when dropped (midir semantics).
struct MidirInputHandle {
    _connection: MidiInputConnection<()>,
}

impl InputHandle for MidirInputHandle {}

struct MidirOutputHandle {
    connection: MidiOutputConnection,
}

impl OutputHandle for MidirOutputHandle {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.connection.send(bytes)?)
    }
}
