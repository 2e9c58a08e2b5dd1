//! midilink - MIDI 1.0 device I/O core
//!
//! Three pieces do the real work:
//!
//! - [`midi::Message`]: bit-exact encode/decode between raw 3-byte
//!   status/data tuples and a closed tagged message union.
//! - [`ring::RingBuffer`] + [`handlers::QueueEventHandler`]: a bounded,
//!   lock-guarded queue handing messages from the device callback to
//!   application threads, with a sticky dropped-message flag instead of
//!   blocking.
//! - [`state::DeviceState`] + [`handlers::StateEventHandler`]: a
//!   16-channel aggregate folded from the message stream, sampled
//!   concurrently with updates.
//!
//! The [`device`] module is the thin midir shim that owns the OS handles
//! and invokes a caller-supplied [`handlers::EventHandler`] from the
//! driver callback. [`monitor`] and [`repl`] are the CLI front end.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use midilink::{EventHandler, InputPort, QueueEventHandler};
//!
//! # fn main() -> anyhow::Result<()> {
//! let queue = Arc::new(QueueEventHandler::with_capacity(256));
//! let port = InputPort::connect("Keystation", Arc::clone(&queue) as Arc<dyn EventHandler>)?;
//!
//! while let Some(message) = queue.pop() {
//!     println!("{}", message);
//! }
//! if queue.dropped() {
//!     eprintln!("messages were lost since the last check");
//! }
//! # drop(port);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod handlers;
pub mod midi;
pub mod monitor;
pub mod repl;
pub mod ring;
pub mod state;

pub use config::AppConfig;
pub use device::{discovery, InputPort, OutputPort};
pub use handlers::{DeliveryEvent, EventHandler, QueueEventHandler, StateEventHandler};
pub use midi::{Message, QuarterFrame, UnrecognisedStatus, PITCH_BEND_CENTER};
pub use ring::RingBuffer;
pub use state::DeviceState;
