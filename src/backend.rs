//! The transport seam: port enumeration and open/close/send, abstracted so
//! the resolver and monitor never touch a MIDI library directly.
//!
//! The midir-backed implementation lives in [`crate::io`] behind the
//! `midi-io` feature; tests supply fakes.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

/// One entry of a live enumeration snapshot.
///
/// Indices are not stable across attach/detach, so descriptors are produced
/// fresh per resolution attempt and never cached beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub index: usize,
    pub name: String,
}

/// Callback invoked for every raw message a device delivers.
///
/// `delta_time` is seconds since the previous message on the same port.
pub type InputCallback = Box<dyn FnMut(f64, &[u8]) + Send + 'static>;

/// An open input port. Dropping the handle closes the port.
pub trait InputHandle: Send {}

/// An open output port. Dropping the handle closes the port.
pub trait OutputHandle: Send {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Port enumeration and transport, the one interface a device library has
/// to satisfy.
///
/// `enumerate` must re-query the live device list on every call so hot-plug
/// events are observed promptly, and must leave nothing open afterward.
pub trait MidiBackend: Send + Sync + 'static {
    fn enumerate(&self, direction: PortDirection) -> Result<Vec<PortDescriptor>>;

    fn open_input(&self, index: usize, callback: InputCallback) -> Result<Box<dyn InputHandle>>;

    fn open_output(&self, index: usize) -> Result<Box<dyn OutputHandle>>;
}
