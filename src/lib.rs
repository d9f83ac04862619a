//! Name-stable MIDI device connections with automatic reattach, plus a
//! short-message codec.
//!
//! OS MIDI enumeration hands out numeric port indices that change across
//! replug, reconnect, and driver rescans. This crate keeps a logical
//! connection keyed by *name* instead: a per-connection monitor re-validates
//! the name-to-index binding on a fixed cadence, closes and re-resolves when
//! the device moves or disappears, and reports edge-triggered
//! Connected/Disconnected transitions. Incoming and outgoing bytes pass
//! through a small channel-voice codec ([`MidiEvent`]).
//!
//! An always-available virtual loopback pair (reserved names `"to Host"` /
//! `"from Host"`) carries in-process MIDI alongside hardware ports.
//!
//! Hardware transport uses midir behind the `midi-io` feature (default);
//! any other transport can plug in through the [`MidiBackend`] trait.

pub mod error;
pub use error::{Error, Result};

mod event;
pub use event::{InboundMessage, MessageKind, MidiEvent};

mod backend;
pub use backend::{
    InputCallback, InputHandle, MidiBackend, OutputHandle, PortDescriptor, PortDirection,
};

mod catalog;
pub use catalog::PortCatalog;

mod resolver;
pub use resolver::{resolve_in, strip_numeric_suffix, PortResolver};

mod loopback;
pub use loopback::{
    virtual_name, LoopbackGuard, VirtualLoopback, VIRTUAL_INPUT_NAME, VIRTUAL_OUTPUT_NAME,
};

mod monitor;
pub use monitor::{LinkStatus, RawPolicy, DEFAULT_POLL_INTERVAL};

mod link;
pub use link::{
    InputBuilder, InputConnection, MidiLink, MidiLinkBuilder, OutputBuilder, OutputConnection,
};

#[cfg(feature = "midi-io")]
pub mod io;

#[cfg(feature = "midi-io")]
pub use io::MidirBackend;
