//! Whole-device aggregate over all 16 channels

use crate::midi::Message;

use super::channel::ChannelState;

/// Number of MIDI channels.
pub const CHANNEL_COUNT: usize = 16;

/// Point-in-time state of one device, folded from a message stream.
///
/// Created zeroed; [`reset`] applies the MIDI power-on defaults. The only
/// mutation path is [`update`], which folds one decoded message into the
/// aggregate and treats every out-of-scope message kind as a no-op.
///
/// [`reset`]: DeviceState::reset
/// [`update`]: DeviceState::update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub channels: [ChannelState; CHANNEL_COUNT],
}

impl DeviceState {
    /// Zeroed device.
    pub fn new() -> Self {
        Self {
            channels: [ChannelState::new(); CHANNEL_COUNT],
        }
    }

    /// Reset every channel to the power-on defaults.
    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
    }

    /// Fold one message into the aggregate.
    ///
    /// The channel nibble is clamped to 4 bits like the codec clamps wire
    /// fields; key 127 addresses no tracked key and is ignored.
    pub fn update(&mut self, message: &Message) {
        match *message {
            Message::NoteOff { channel, key, .. } => {
                // Release velocity is intentionally discarded
                if let Some(k) = self.key_mut(channel, key) {
                    k.velocity = 0;
                }
            }
            Message::NoteOn {
                channel,
                key,
                velocity,
            } => {
                if let Some(k) = self.key_mut(channel, key) {
                    k.velocity = velocity & 0x7F;
                }
            }
            Message::PolyKeyPressure {
                channel,
                key,
                pressure,
            } => {
                if let Some(k) = self.key_mut(channel, key) {
                    k.pressure = pressure & 0x7F;
                }
            }
            Message::ControlChange {
                channel,
                controller,
                value,
            } => self.channel_mut(channel).control_change(controller, value),
            Message::ProgramChange { channel, program } => {
                self.channel_mut(channel).program = program & 0x7F;
            }
            Message::ChannelPressure { channel, pressure } => {
                self.channel_mut(channel).pressure = pressure & 0x7F;
            }
            Message::PitchBend { channel, bend } => {
                self.channel_mut(channel).set_pitch_bend(bend);
            }
            Message::Reset => self.reset(),
            // System common and the remaining real-time kinds carry no
            // channel state
            _ => {}
        }
    }

    fn channel_mut(&mut self, channel: u8) -> &mut ChannelState {
        &mut self.channels[(channel & 0x0F) as usize]
    }

    fn key_mut(&mut self, channel: u8, key: u8) -> Option<&mut super::KeyState> {
        self.channels[(channel & 0x0F) as usize]
            .keys
            .get_mut((key & 0x7F) as usize)
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}
