//! Structured MIDI events and the raw-byte codec.
//!
//! A short MIDI message is `[status] ++ data`, where the status byte packs
//! the message type (high nibble, 8-14) and the zero-based channel (low
//! nibble). [`MidiEvent`] is the decoded form; channels are 1-based on this
//! side of the codec.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Channel-voice message types, one per status high nibble (8-14).
///
/// Nibble 15 (system/realtime) is deliberately absent: those messages are
/// never structured-decoded, only passed through raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "noteoff")]
    NoteOff,
    #[serde(rename = "noteon")]
    NoteOn,
    #[serde(rename = "polyat")]
    PolyAftertouch,
    #[serde(rename = "controlchange")]
    ControlChange,
    #[serde(rename = "programchange")]
    ProgramChange,
    #[serde(rename = "channelat")]
    ChannelAftertouch,
    #[serde(rename = "pitchbend")]
    PitchBend,
}

impl MessageKind {
    /// Status high nibble for this kind.
    pub const fn status_nibble(self) -> u8 {
        match self {
            MessageKind::NoteOff => 0x8,
            MessageKind::NoteOn => 0x9,
            MessageKind::PolyAftertouch => 0xA,
            MessageKind::ControlChange => 0xB,
            MessageKind::ProgramChange => 0xC,
            MessageKind::ChannelAftertouch => 0xD,
            MessageKind::PitchBend => 0xE,
        }
    }

    /// Reverse lookup from a status high nibble. `None` outside 8-14.
    pub const fn from_status_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x8 => Some(MessageKind::NoteOff),
            0x9 => Some(MessageKind::NoteOn),
            0xA => Some(MessageKind::PolyAftertouch),
            0xB => Some(MessageKind::ControlChange),
            0xC => Some(MessageKind::ProgramChange),
            0xD => Some(MessageKind::ChannelAftertouch),
            0xE => Some(MessageKind::PitchBend),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::NoteOff => "noteoff",
            MessageKind::NoteOn => "noteon",
            MessageKind::PolyAftertouch => "polyat",
            MessageKind::ControlChange => "controlchange",
            MessageKind::ProgramChange => "programchange",
            MessageKind::ChannelAftertouch => "channelat",
            MessageKind::PitchBend => "pitchbend",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "noteoff" => Ok(MessageKind::NoteOff),
            "noteon" => Ok(MessageKind::NoteOn),
            "polyat" => Ok(MessageKind::PolyAftertouch),
            "controlchange" => Ok(MessageKind::ControlChange),
            "programchange" => Ok(MessageKind::ProgramChange),
            "channelat" => Ok(MessageKind::ChannelAftertouch),
            "pitchbend" => Ok(MessageKind::PitchBend),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded channel-voice MIDI message.
///
/// Immutable value type: produced by [`MidiEvent::decode`] or the typed
/// constructors, consumed by [`MidiEvent::encode`] or a consumer sink.
/// `raw` keeps the original wire bytes for diagnostics when the event came
/// off a device; constructed events leave it empty until encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Seconds since the previous message on the same port.
    pub delta_time: f64,
    /// 1-based channel (1-16).
    pub channel: u8,
    pub kind: MessageKind,
    /// Data bytes (status byte removed), each 0-127.
    pub data: SmallVec<[u8; 2]>,
    /// Original unparsed message, empty for locally constructed events.
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub raw: SmallVec<[u8; 3]>,
}

impl MidiEvent {
    /// Decode a raw short message. The first byte must be a channel-voice
    /// status byte; system/realtime statuses yield
    /// [`Error::UnsupportedStatus`] so the caller can forward them raw.
    pub fn decode(raw: &[u8], delta_time: f64) -> Result<Self> {
        let status = *raw.first().ok_or(Error::EmptyMessage)?;
        let kind = MessageKind::from_status_nibble(status >> 4)
            .ok_or(Error::UnsupportedStatus(status))?;
        Ok(MidiEvent {
            delta_time,
            channel: (status & 0x0F) + 1,
            kind,
            data: SmallVec::from_slice(&raw[1..]),
            raw: SmallVec::from_slice(raw),
        })
    }

    /// Encode to wire bytes: `[(nibble << 4) | (channel - 1)] ++ data`.
    ///
    /// Channels outside 1-16 are rejected, not clamped.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if !(1..=16).contains(&self.channel) {
            return Err(Error::InvalidChannel(self.channel));
        }
        let status = (self.kind.status_nibble() << 4) | (self.channel - 1);
        let mut bytes = Vec::with_capacity(1 + self.data.len());
        bytes.push(status);
        bytes.extend_from_slice(&self.data);
        Ok(bytes)
    }

    fn with_data(channel: u8, kind: MessageKind, data: &[u8]) -> Self {
        MidiEvent {
            delta_time: 0.0,
            channel,
            kind,
            data: SmallVec::from_slice(data),
            raw: SmallVec::new(),
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::with_data(channel, MessageKind::NoteOn, &[note & 0x7F, velocity & 0x7F])
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::with_data(channel, MessageKind::NoteOff, &[note & 0x7F, velocity & 0x7F])
    }

    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::with_data(
            channel,
            MessageKind::ControlChange,
            &[controller & 0x7F, value & 0x7F],
        )
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        Self::with_data(channel, MessageKind::ProgramChange, &[program & 0x7F])
    }

    pub fn channel_aftertouch(channel: u8, pressure: u8) -> Self {
        Self::with_data(channel, MessageKind::ChannelAftertouch, &[pressure & 0x7F])
    }

    /// `value`: signed 14-bit (-8192 to 8191), clamped.
    pub fn pitch_bend(channel: u8, value: i16) -> Self {
        let unsigned = (value as i32 + 8192).clamp(0, 16383) as u16;
        let lsb = (unsigned & 0x7F) as u8;
        let msb = ((unsigned >> 7) & 0x7F) as u8;
        Self::with_data(channel, MessageKind::PitchBend, &[lsb, msb])
    }

    pub fn is_note_on(&self) -> bool {
        self.kind == MessageKind::NoteOn
    }

    pub fn is_note_off(&self) -> bool {
        self.kind == MessageKind::NoteOff
    }

    pub fn note(&self) -> Option<u8> {
        match self.kind {
            MessageKind::NoteOn | MessageKind::NoteOff | MessageKind::PolyAftertouch => {
                self.data.first().copied()
            }
            _ => None,
        }
    }

    pub fn velocity(&self) -> Option<u8> {
        match self.kind {
            MessageKind::NoteOn | MessageKind::NoteOff => self.data.get(1).copied(),
            _ => None,
        }
    }
}

/// What an input connection delivers to its sink.
///
/// `Raw` carries messages the codec refuses to structure (system/realtime
/// statuses); whether those are delivered at all is a [`RawPolicy`] choice.
///
/// [`RawPolicy`]: crate::RawPolicy
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Event(MidiEvent),
    Raw { delta_time: f64, bytes: Vec<u8> },
}

impl InboundMessage {
    pub fn as_event(&self) -> Option<&MidiEvent> {
        match self {
            InboundMessage::Event(event) => Some(event),
            InboundMessage::Raw { .. } => None,
        }
    }
}
