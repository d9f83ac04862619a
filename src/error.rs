//! Error types for the connection and codec layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("empty MIDI message")]
    EmptyMessage,

    /// The status high nibble is outside the channel-voice range (8-14).
    /// System and realtime bytes are passed through raw, never decoded.
    #[error("unsupported status byte 0x{0:02X}")]
    UnsupportedStatus(u8),

    #[error("unknown MIDI message type: {0}")]
    UnknownType(String),

    #[error("invalid MIDI channel {0} (expected 1-16)")]
    InvalidChannel(u8),

    #[error("device open failed: {0}")]
    DeviceOpen(String),

    #[error("MIDI backend error: {0}")]
    Backend(String),

    #[error("connection is closed")]
    ConnectionClosed,
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::Backend(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::Backend(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::DeviceOpen(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::DeviceOpen(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
