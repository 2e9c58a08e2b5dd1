//! Per-channel device state aggregation
//!
//! Folds a stream of decoded messages into a point-in-time picture of the
//! device: key velocities and pressures, controller values, program,
//! channel pressure, and pitch bend for each of the 16 channels. Wrap a
//! [`DeviceState`] in a [`StateEventHandler`] to sample it concurrently
//! with updates.
//!
//! [`StateEventHandler`]: crate::handlers::StateEventHandler

mod channel;
mod device;

pub use channel::{controllers, ChannelState, ControllerState, KeyState};
pub use channel::{CONTROLLER_COUNT, KEY_COUNT};
pub use device::{DeviceState, CHANNEL_COUNT};

/// Normalise a 7-bit value into 0.0..=1.0.
pub fn normalised_7bit(value: u8) -> f32 {
    value as f32 / 127.0
}
