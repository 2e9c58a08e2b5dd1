//! MIDI 1.0 wire codec and message types
//!
//! Maps raw 3-byte status/data tuples to a structured `Message` and back.
//! Decoding clamps every data field to its wire bit width; encoding is total,
//! so every constructible `Message` has a legal 3-byte form.

use std::fmt;

use thiserror::Error;

/// Center value of the 14-bit pitch-bend range.
pub const PITCH_BEND_CENTER: u16 = 8192;

/// A status byte the codec does not know how to decode.
///
/// Covers data bytes in status position (below 0x80) and the undefined
/// real-time statuses 0xF9 and 0xFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unrecognised MIDI status byte 0x{0:02X}")]
pub struct UnrecognisedStatus(pub u8);

/// One of the eight MIDI Time Code quarter-frame fragments.
///
/// The wire form packs a 3-bit fragment type and a 4-bit nibble into the
/// first data byte; only the structural split is supported here, timecode
/// assembly is left to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterFrame {
    /// Frame count, low nibble
    FrameLow(u8),
    /// Frame count, high nibble
    FrameHigh(u8),
    /// Seconds, low nibble
    SecondLow(u8),
    /// Seconds, high nibble
    SecondHigh(u8),
    /// Minutes, low nibble
    MinuteLow(u8),
    /// Minutes, high nibble
    MinuteHigh(u8),
    /// Hours, low nibble
    HourLow(u8),
    /// Frame rate plus the high bit of the hours
    RateHourHigh(u8),
}

impl QuarterFrame {
    /// Unpack a quarter-frame fragment from the first data byte.
    pub fn from_data(data1: u8) -> Self {
        let nibble = data1 & 0x0F;
        match (data1 >> 4) & 0x07 {
            0 => QuarterFrame::FrameLow(nibble),
            1 => QuarterFrame::FrameHigh(nibble),
            2 => QuarterFrame::SecondLow(nibble),
            3 => QuarterFrame::SecondHigh(nibble),
            4 => QuarterFrame::MinuteLow(nibble),
            5 => QuarterFrame::MinuteHigh(nibble),
            6 => QuarterFrame::HourLow(nibble),
            _ => QuarterFrame::RateHourHigh(nibble),
        }
    }

    /// Pack the fragment back into the first data byte.
    pub fn to_data(self) -> u8 {
        let (ty, nibble) = match self {
            QuarterFrame::FrameLow(n) => (0, n),
            QuarterFrame::FrameHigh(n) => (1, n),
            QuarterFrame::SecondLow(n) => (2, n),
            QuarterFrame::SecondHigh(n) => (3, n),
            QuarterFrame::MinuteLow(n) => (4, n),
            QuarterFrame::MinuteHigh(n) => (5, n),
            QuarterFrame::HourLow(n) => (6, n),
            QuarterFrame::RateHourHigh(n) => (7, n),
        };
        (ty << 4) | (nibble & 0x0F)
    }
}

/// MIDI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Note Off: channel (0-15), key (0-127), velocity (0-127)
    NoteOff { channel: u8, key: u8, velocity: u8 },

    /// Note On: channel (0-15), key (0-127), velocity (0-127)
    ///
    /// Velocity 0 is kept as Note On; the state layer gives it the same
    /// effect as a Note Off, and the wire round-trip stays exact.
    NoteOn { channel: u8, key: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (0-15), key (0-127), pressure (0-127)
    PolyKeyPressure { channel: u8, key: u8, pressure: u8 },

    /// Control Change: channel (0-15), controller (0-127), value (0-127)
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), bend (0-16383, center 8192)
    ///
    /// The raw unsigned 14-bit value; the center offset is applied by the
    /// state layer, not here.
    PitchBend { channel: u8, bend: u16 },

    /// System Exclusive, short form only: the two data bytes that fit a
    /// 3-byte message. Long-form payloads are not supported.
    SystemExclusive { data1: u8, data2: u8 },

    /// MIDI Time Code quarter frame (0xF1)
    QuarterFrame(QuarterFrame),

    /// Song Position Pointer: beats since start (0-16383)
    SongPosition { beats: u16 },

    /// Song Select: song (0-127)
    SongSelect { song: u8 },

    /// Reserved system-common status 0xF4
    Reserved1,

    /// Reserved system-common status 0xF5
    Reserved2,

    /// Tune Request (0xF6)
    TuneRequest,

    /// End of Exclusive (0xF7)
    EndOfExclusive,

    /// Timing Clock (0xF8)
    TimingClock,

    /// Start (0xFA)
    Start,

    /// Continue (0xFB)
    Continue,

    /// Stop (0xFC)
    Stop,

    /// Active Sensing (0xFE)
    ActiveSensing,

    /// System Reset (0xFF)
    Reset,
}

#[inline]
fn combine_14bit(data1: u8, data2: u8) -> u16 {
    (((data2 & 0x7F) as u16) << 7) | ((data1 & 0x7F) as u16)
}

#[inline]
fn split_14bit(value: u16) -> (u8, u8) {
    ((value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8)
}

impl Message {
    /// Decode one message from its raw status/data bytes.
    ///
    /// Status classification: a byte with the top five bits set is a
    /// real-time status on its own (0xF8-0xFF); a byte with the top four
    /// bits set is a system-common status on its own (0xF0-0xF7); anything
    /// else splits into a type nibble and a channel nibble. Data bytes are
    /// masked to 7 bits, never rejected.
    pub fn decode(status: u8, data1: u8, data2: u8) -> Result<Self, UnrecognisedStatus> {
        if status & 0xF8 == 0xF8 {
            // Real-time: the whole byte is the type. 0xF9/0xFD are undefined.
            return match status {
                0xF8 => Ok(Message::TimingClock),
                0xFA => Ok(Message::Start),
                0xFB => Ok(Message::Continue),
                0xFC => Ok(Message::Stop),
                0xFE => Ok(Message::ActiveSensing),
                0xFF => Ok(Message::Reset),
                _ => Err(UnrecognisedStatus(status)),
            };
        }

        if status & 0xF0 == 0xF0 {
            // System common: the whole byte is the type.
            return Ok(match status {
                0xF0 => Message::SystemExclusive {
                    data1: data1 & 0x7F,
                    data2: data2 & 0x7F,
                },
                0xF1 => Message::QuarterFrame(QuarterFrame::from_data(data1)),
                0xF2 => Message::SongPosition {
                    beats: combine_14bit(data1, data2),
                },
                0xF3 => Message::SongSelect { song: data1 & 0x7F },
                0xF4 => Message::Reserved1,
                0xF5 => Message::Reserved2,
                0xF6 => Message::TuneRequest,
                _ => Message::EndOfExclusive,
            });
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => Ok(Message::NoteOff {
                channel,
                key: data1 & 0x7F,
                velocity: data2 & 0x7F,
            }),
            0x90 => Ok(Message::NoteOn {
                channel,
                key: data1 & 0x7F,
                velocity: data2 & 0x7F,
            }),
            0xA0 => Ok(Message::PolyKeyPressure {
                channel,
                key: data1 & 0x7F,
                pressure: data2 & 0x7F,
            }),
            0xB0 => Ok(Message::ControlChange {
                channel,
                controller: data1 & 0x7F,
                value: data2 & 0x7F,
            }),
            0xC0 => Ok(Message::ProgramChange {
                channel,
                program: data1 & 0x7F,
            }),
            0xD0 => Ok(Message::ChannelPressure {
                channel,
                pressure: data1 & 0x7F,
            }),
            0xE0 => Ok(Message::PitchBend {
                channel,
                bend: combine_14bit(data1, data2),
            }),
            // Data byte in status position (running status is unsupported)
            _ => Err(UnrecognisedStatus(status)),
        }
    }

    /// Decode a raw callback slice; missing data bytes read as zero.
    pub fn from_raw(data: &[u8]) -> Result<Self, UnrecognisedStatus> {
        match *data {
            [] => Err(UnrecognisedStatus(0)),
            [status] => Self::decode(status, 0, 0),
            [status, data1] => Self::decode(status, data1, 0),
            [status, data1, data2, ..] => Self::decode(status, data1, data2),
        }
    }

    /// Encode to the 3-byte wire form. Unused data bytes are zero.
    ///
    /// Total for every message: data fields are masked to their bit width,
    /// so even a hand-built out-of-range value encodes to legal bytes.
    pub fn encode(&self) -> [u8; 3] {
        match *self {
            Message::NoteOff {
                channel,
                key,
                velocity,
            } => [0x80 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
            Message::NoteOn {
                channel,
                key,
                velocity,
            } => [0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F],
            Message::PolyKeyPressure {
                channel,
                key,
                pressure,
            } => [0xA0 | (channel & 0x0F), key & 0x7F, pressure & 0x7F],
            Message::ControlChange {
                channel,
                controller,
                value,
            } => [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F],
            Message::ProgramChange { channel, program } => {
                [0xC0 | (channel & 0x0F), program & 0x7F, 0]
            }
            Message::ChannelPressure { channel, pressure } => {
                [0xD0 | (channel & 0x0F), pressure & 0x7F, 0]
            }
            Message::PitchBend { channel, bend } => {
                let (lsb, msb) = split_14bit(bend);
                [0xE0 | (channel & 0x0F), lsb, msb]
            }
            Message::SystemExclusive { data1, data2 } => [0xF0, data1 & 0x7F, data2 & 0x7F],
            Message::QuarterFrame(frame) => [0xF1, frame.to_data(), 0],
            Message::SongPosition { beats } => {
                let (lsb, msb) = split_14bit(beats);
                [0xF2, lsb, msb]
            }
            Message::SongSelect { song } => [0xF3, song & 0x7F, 0],
            Message::Reserved1 => [0xF4, 0, 0],
            Message::Reserved2 => [0xF5, 0, 0],
            Message::TuneRequest => [0xF6, 0, 0],
            Message::EndOfExclusive => [0xF7, 0, 0],
            Message::TimingClock => [0xF8, 0, 0],
            Message::Start => [0xFA, 0, 0],
            Message::Continue => [0xFB, 0, 0],
            Message::Stop => [0xFC, 0, 0],
            Message::ActiveSensing => [0xFE, 0, 0],
            Message::Reset => [0xFF, 0, 0],
        }
    }

    /// Number of meaningful bytes in the wire form (1-3).
    pub fn wire_len(&self) -> usize {
        match self {
            Message::NoteOff { .. }
            | Message::NoteOn { .. }
            | Message::PolyKeyPressure { .. }
            | Message::ControlChange { .. }
            | Message::PitchBend { .. }
            | Message::SystemExclusive { .. }
            | Message::SongPosition { .. } => 3,
            Message::ProgramChange { .. }
            | Message::ChannelPressure { .. }
            | Message::QuarterFrame(_)
            | Message::SongSelect { .. } => 2,
            _ => 1,
        }
    }

    /// Get the channel for channel voice messages (0-15), None otherwise
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Message::NoteOff { channel, .. }
            | Message::NoteOn { channel, .. }
            | Message::PolyKeyPressure { channel, .. }
            | Message::ControlChange { channel, .. }
            | Message::ProgramChange { channel, .. }
            | Message::ChannelPressure { channel, .. }
            | Message::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// Check if this is a channel voice message
    pub fn is_channel_voice(&self) -> bool {
        self.channel().is_some()
    }

    /// Check if this is a system common or real-time message
    pub fn is_system(&self) -> bool {
        !self.is_channel_voice()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Message::NoteOff {
                channel,
                key,
                velocity,
            } => write!(f, "NoteOff ch:{} k:{} v:{}", channel + 1, key, velocity),
            Message::NoteOn {
                channel,
                key,
                velocity,
            } => write!(f, "NoteOn ch:{} k:{} v:{}", channel + 1, key, velocity),
            Message::PolyKeyPressure {
                channel,
                key,
                pressure,
            } => write!(f, "PolyPressure ch:{} k:{} p:{}", channel + 1, key, pressure),
            Message::ControlChange {
                channel,
                controller,
                value,
            } => write!(f, "CC ch:{} cc:{} v:{}", channel + 1, controller, value),
            Message::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            Message::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            Message::PitchBend { channel, bend } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, bend)
            }
            Message::SystemExclusive { data1, data2 } => {
                write!(f, "SysEx {:02X} {:02X}", data1, data2)
            }
            Message::QuarterFrame(frame) => write!(f, "QuarterFrame {:?}", frame),
            Message::SongPosition { beats } => write!(f, "SongPosition {}", beats),
            Message::SongSelect { song } => write!(f, "SongSelect {}", song),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// MIDI value conversion utilities
pub mod convert {
    /// Convert 14-bit value (0-16383) to 7-bit value (0-127)
    pub fn to_7bit(value_14bit: u16) -> u8 {
        ((value_14bit >> 7) & 0x7F) as u8
    }

    /// Convert 7-bit value (0-127) to 14-bit value (0-16383)
    pub fn to_14bit(value_7bit: u8) -> u16 {
        ((value_7bit as u16) << 7) | (value_7bit as u16)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_note_on() {
        let msg = Message::decode(0x90, 60, 100).unwrap();
        assert_eq!(
            msg,
            Message::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100,
            }
        );
    }

    #[test]
    fn decode_note_on_velocity_zero_is_not_rewritten() {
        // Velocity-0 Note On must survive decode unchanged so that
        // decode(encode(m)) == m holds for it; the state layer treats it
        // like a Note Off anyway.
        let msg = Message::decode(0x90, 60, 0).unwrap();
        assert_eq!(
            msg,
            Message::NoteOn {
                channel: 0,
                key: 60,
                velocity: 0,
            }
        );
    }

    #[test]
    fn decode_note_off() {
        let msg = Message::decode(0x83, 64, 40).unwrap();
        assert_eq!(
            msg,
            Message::NoteOff {
                channel: 3,
                key: 64,
                velocity: 40,
            }
        );
    }

    #[test]
    fn decode_control_change() {
        let msg = Message::decode(0xB2, 7, 100).unwrap();
        assert_eq!(
            msg,
            Message::ControlChange {
                channel: 2,
                controller: 7,
                value: 100,
            }
        );
    }

    #[test]
    fn decode_program_and_pressure_use_one_data_byte() {
        assert_eq!(
            Message::decode(0xC5, 12, 99).unwrap(),
            Message::ProgramChange {
                channel: 5,
                program: 12,
            }
        );
        assert_eq!(
            Message::decode(0xD1, 80, 99).unwrap(),
            Message::ChannelPressure {
                channel: 1,
                pressure: 80,
            }
        );
    }

    #[test]
    fn decode_pitch_bend_combines_14_bits() {
        // LSB=0, MSB=64 -> 8192 (center)
        let msg = Message::decode(0xE0, 0x00, 0x40).unwrap();
        assert_eq!(
            msg,
            Message::PitchBend {
                channel: 0,
                bend: 8192,
            }
        );
    }

    #[test]
    fn decode_masks_data_high_bits() {
        let msg = Message::decode(0x90, 0xFF, 0xFF).unwrap();
        assert_eq!(
            msg,
            Message::NoteOn {
                channel: 0,
                key: 127,
                velocity: 127,
            }
        );
    }

    #[test]
    fn decode_song_position() {
        let msg = Message::decode(0xF2, 0x01, 0x02).unwrap();
        assert_eq!(msg, Message::SongPosition { beats: 0x101 });
    }

    #[test]
    fn decode_quarter_frame_fragments() {
        for ty in 0..8u8 {
            let data1 = (ty << 4) | 0x0A;
            let msg = Message::decode(0xF1, data1, 0).unwrap();
            match msg {
                Message::QuarterFrame(frame) => assert_eq!(frame.to_data(), data1),
                other => panic!("expected QuarterFrame, got {:?}", other),
            }
        }
    }

    #[test]
    fn decode_real_time_statuses() {
        assert_eq!(Message::decode(0xF8, 0, 0).unwrap(), Message::TimingClock);
        assert_eq!(Message::decode(0xFA, 0, 0).unwrap(), Message::Start);
        assert_eq!(Message::decode(0xFB, 0, 0).unwrap(), Message::Continue);
        assert_eq!(Message::decode(0xFC, 0, 0).unwrap(), Message::Stop);
        assert_eq!(Message::decode(0xFE, 0, 0).unwrap(), Message::ActiveSensing);
    }

    #[test]
    fn decode_reserved_system_common() {
        assert_eq!(Message::decode(0xF4, 0, 0).unwrap(), Message::Reserved1);
        assert_eq!(Message::decode(0xF5, 0, 0).unwrap(), Message::Reserved2);
    }

    #[test]
    fn reset_is_not_a_reserved_variant() {
        // 0xFF is System Reset in its own right. At least one MIDI stack in
        // the wild folds it into a reserved system-common variant; that
        // aliasing is deliberately not reproduced here.
        let msg = Message::decode(0xFF, 0, 0).unwrap();
        assert_eq!(msg, Message::Reset);
        assert_ne!(msg, Message::Reserved1);
        assert_ne!(msg, Message::Reserved2);
    }

    #[test]
    fn unrecognised_statuses_fail() {
        for status in [0x00, 0x42, 0x7F, 0xF9, 0xFD] {
            assert_eq!(
                Message::decode(status, 0, 0),
                Err(UnrecognisedStatus(status))
            );
        }
    }

    #[test]
    fn classification_over_full_status_range() {
        // 0x80-0xEF: type nibble + channel nibble; 0xF0-0xF7 and the known
        // real-time bytes: the whole byte is the type. Either way the
        // encoded status reproduces the input byte exactly.
        for status in 0x80..=0xFFu8 {
            match Message::decode(status, 0, 0) {
                Ok(msg) => {
                    assert_eq!(msg.encode()[0], status);
                    if status < 0xF0 {
                        assert_eq!(msg.channel(), Some(status & 0x0F));
                    } else {
                        assert_eq!(msg.channel(), None);
                    }
                }
                Err(UnrecognisedStatus(s)) => {
                    assert!(s == 0xF9 || s == 0xFD, "unexpected failure on {:02X}", s);
                }
            }
        }
    }

    #[test]
    fn encode_note_on() {
        let msg = Message::NoteOn {
            channel: 0,
            key: 60,
            velocity: 100,
        };
        assert_eq!(msg.encode(), [0x90, 60, 100]);
    }

    #[test]
    fn encode_masks_out_of_range_fields() {
        // A hand-built message with fields past their bit width still
        // produces legal wire bytes.
        let msg = Message::NoteOn {
            channel: 0x12,
            key: 200,
            velocity: 255,
        };
        let [status, d1, d2] = msg.encode();
        assert_eq!(status, 0x92);
        assert!(d1 < 0x80 && d2 < 0x80);
    }

    #[test]
    fn from_raw_pads_missing_data_bytes() {
        assert_eq!(Message::from_raw(&[0xF8]).unwrap(), Message::TimingClock);
        assert_eq!(
            Message::from_raw(&[0xC2, 7]).unwrap(),
            Message::ProgramChange {
                channel: 2,
                program: 7,
            }
        );
        assert_eq!(
            Message::from_raw(&[0x90, 60, 100]).unwrap(),
            Message::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100,
            }
        );
        assert!(Message::from_raw(&[]).is_err());
    }

    #[test]
    fn wire_len_matches_status() {
        assert_eq!(
            Message::NoteOn {
                channel: 0,
                key: 60,
                velocity: 1,
            }
            .wire_len(),
            3
        );
        assert_eq!(
            Message::ProgramChange {
                channel: 0,
                program: 1,
            }
            .wire_len(),
            2
        );
        assert_eq!(Message::TimingClock.wire_len(), 1);
    }

    #[test]
    fn convert_7bit_14bit() {
        assert_eq!(convert::to_7bit(0), 0);
        assert_eq!(convert::to_7bit(8192), 64);
        assert_eq!(convert::to_7bit(16383), 127);
        assert_eq!(convert::to_14bit(0), 0);
        assert_eq!(convert::to_14bit(64), 8256);
        assert_eq!(convert::to_14bit(127), 16383);
    }

    #[test]
    fn format_hex_output() {
        assert_eq!(format_hex(&[0x90, 0x3C, 0x64]), "90 3C 64");
    }

    fn channel_voice_strategy() -> impl Strategy<Value = Message> {
        prop_oneof![
            (0u8..16, 0u8..128, 0u8..128).prop_map(|(channel, key, velocity)| Message::NoteOff {
                channel,
                key,
                velocity,
            }),
            (0u8..16, 0u8..128, 0u8..128).prop_map(|(channel, key, velocity)| Message::NoteOn {
                channel,
                key,
                velocity,
            }),
            (0u8..16, 0u8..128, 0u8..128).prop_map(|(channel, key, pressure)| {
                Message::PolyKeyPressure {
                    channel,
                    key,
                    pressure,
                }
            }),
            (0u8..16, 0u8..128, 0u8..128).prop_map(|(channel, controller, value)| {
                Message::ControlChange {
                    channel,
                    controller,
                    value,
                }
            }),
            (0u8..16, 0u8..128)
                .prop_map(|(channel, program)| Message::ProgramChange { channel, program }),
            (0u8..16, 0u8..128)
                .prop_map(|(channel, pressure)| Message::ChannelPressure { channel, pressure }),
            (0u8..16, 0u16..16384).prop_map(|(channel, bend)| Message::PitchBend { channel, bend }),
        ]
    }

    fn system_strategy() -> impl Strategy<Value = Message> {
        prop_oneof![
            (0u8..128, 0u8..128).prop_map(|(data1, data2)| Message::SystemExclusive {
                data1,
                data2,
            }),
            (0u8..8, 0u8..16).prop_map(|(ty, nibble)| {
                Message::QuarterFrame(QuarterFrame::from_data((ty << 4) | nibble))
            }),
            (0u16..16384).prop_map(|beats| Message::SongPosition { beats }),
            (0u8..128).prop_map(|song| Message::SongSelect { song }),
            proptest::sample::select(vec![
                Message::Reserved1,
                Message::Reserved2,
                Message::TuneRequest,
                Message::EndOfExclusive,
                Message::TimingClock,
                Message::Start,
                Message::Continue,
                Message::Stop,
                Message::ActiveSensing,
                Message::Reset,
            ]),
        ]
    }

    proptest! {
        #[test]
        fn round_trip(msg in prop_oneof![channel_voice_strategy(), system_strategy()]) {
            let [status, data1, data2] = msg.encode();
            prop_assert_eq!(Message::decode(status, data1, data2).unwrap(), msg);
        }
    }
}
