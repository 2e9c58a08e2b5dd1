//! Single-channel state: keys, controllers, program, pressure, pitch bend

use crate::midi::PITCH_BEND_CENTER;

/// Number of tracked keys per channel.
pub const KEY_COUNT: usize = 127;

/// Number of addressable continuous controllers per channel; 120-127 are
/// channel mode switches, not stored values.
pub const CONTROLLER_COUNT: usize = 120;

/// Controller numbers with defined behaviour beyond storing a value.
pub mod controllers {
    /// Expression (reset default 127)
    pub const EXPRESSION: u8 = 11;
    /// Non-registered parameter number LSB (reset default 127)
    pub const NRPN_LSB: u8 = 98;
    /// Non-registered parameter number MSB (reset default 127)
    pub const NRPN_MSB: u8 = 99;
    /// Registered parameter number LSB (reset default 127)
    pub const RPN_LSB: u8 = 100;
    /// Registered parameter number MSB (reset default 127)
    pub const RPN_MSB: u8 = 101;
    /// All Sound Off
    pub const ALL_SOUND_OFF: u8 = 120;
    /// Reset All Controllers
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    /// Local Control on/off
    pub const LOCAL_CONTROL: u8 = 122;
    /// All Notes Off
    pub const ALL_NOTES_OFF: u8 = 123;
    /// Omni Mode Off (implies All Notes Off)
    pub const OMNI_MODE_OFF: u8 = 124;
    /// Omni Mode On (implies All Notes Off)
    pub const OMNI_MODE_ON: u8 = 125;
    /// Mono Mode On (implies All Notes Off)
    pub const MONO_MODE_ON: u8 = 126;
    /// Poly Mode On (implies All Notes Off)
    pub const POLY_MODE_ON: u8 = 127;

    /// Controllers that hold 127 after Reset All Controllers.
    pub const RESET_TO_MAX: [u8; 5] = [EXPRESSION, NRPN_LSB, NRPN_MSB, RPN_LSB, RPN_MSB];
}

/// Last seen velocity and polyphonic pressure for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    /// 0 when the key is released
    pub velocity: u8,
    pub pressure: u8,
}

/// Last seen value of one continuous controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub value: u8,
}

/// Aggregate state of one MIDI channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelState {
    /// Selected program (0-127)
    pub program: u8,
    /// Channel pressure (0-127)
    pub pressure: u8,
    /// Center-relative pitch bend, [-8192, 8191], 0 = center
    pub pitch_bend: i16,
    pub keys: [KeyState; KEY_COUNT],
    pub controllers: [ControllerState; CONTROLLER_COUNT],
}

impl ChannelState {
    /// Zeroed channel.
    pub fn new() -> Self {
        Self {
            program: 0,
            pressure: 0,
            pitch_bend: 0,
            keys: [KeyState::default(); KEY_COUNT],
            controllers: [ControllerState::default(); CONTROLLER_COUNT],
        }
    }

    /// Apply one Control Change to this channel.
    pub fn control_change(&mut self, controller: u8, value: u8) {
        use self::controllers::*;
        match controller & 0x7F {
            ALL_SOUND_OFF | ALL_NOTES_OFF | OMNI_MODE_OFF | OMNI_MODE_ON | MONO_MODE_ON
            | POLY_MODE_ON => self.silence(),
            RESET_ALL_CONTROLLERS => self.reset(),
            LOCAL_CONTROL => {}
            controller => self.controllers[controller as usize].value = value & 0x7F,
        }
    }

    /// Zero every key. The all-notes/sound-off path.
    pub fn silence(&mut self) {
        for key in self.keys.iter_mut() {
            *key = KeyState::default();
        }
    }

    /// Reset All Controllers.
    ///
    /// Controllers go to zero except the five that default to 127
    /// (expression and the NRPN/RPN selectors); pressure, pitch bend, and
    /// per-key pressure are cleared. Key velocities are kept: reset does
    /// not imply all-notes-off, combine with [`silence`] for that.
    ///
    /// [`silence`]: ChannelState::silence
    pub fn reset(&mut self) {
        for controller in self.controllers.iter_mut() {
            controller.value = 0;
        }
        for number in controllers::RESET_TO_MAX {
            self.controllers[number as usize].value = 127;
        }
        self.pressure = 0;
        self.pitch_bend = 0;
        for key in self.keys.iter_mut() {
            key.pressure = 0;
        }
    }

    /// Store a raw unsigned 14-bit bend as center-relative.
    pub fn set_pitch_bend(&mut self, bend: u16) {
        self.pitch_bend = (bend & 0x3FFF) as i16 - PITCH_BEND_CENTER as i16;
    }

    /// Pitch bend in -1.0..=1.0. The positive half divides by 8191, the
    /// rest by 8192, matching the asymmetric stored range.
    pub fn pitch_bend_normalised(&self) -> f32 {
        if self.pitch_bend > 0 {
            self.pitch_bend as f32 / 8191.0
        } else {
            self.pitch_bend as f32 / 8192.0
        }
    }

    /// Value of a controller, zero for the channel-mode range.
    pub fn controller(&self, controller: u8) -> u8 {
        self.controllers
            .get(controller as usize)
            .map(|c| c.value)
            .unwrap_or(0)
    }

    /// Combined 14-bit value of an MSB/LSB controller pair.
    ///
    /// Controllers 0-31 carry the MSB and their companion at `n + 32` the
    /// LSB; returns `None` outside that range.
    pub fn controller_pair(&self, controller: u8) -> Option<u16> {
        if controller >= 32 {
            return None;
        }
        let msb = self.controllers[controller as usize].value as u16;
        let lsb = self.controllers[controller as usize + 32].value as u16;
        Some((msb << 7) | lsb)
    }

    /// Normalised 14-bit controller pair in 0.0..=1.0.
    pub fn controller_pair_normalised(&self, controller: u8) -> Option<f32> {
        self.controller_pair(controller)
            .map(|value| value as f32 / 16383.0)
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}
