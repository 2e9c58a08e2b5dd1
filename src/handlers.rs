//! Event handlers bridging the device callback to application threads
//!
//! The device layer invokes a caller-supplied [`EventHandler`] once per
//! delivery-context callback. Two implementations are provided: a bounded
//! queue that hands whole messages to a consumer thread, and a state
//! aggregator that folds messages into a snapshot. Every public operation
//! takes the handler's mutex for exactly one logical step and never blocks
//! waiting for space or data.

use parking_lot::Mutex;
use tracing::warn;

use crate::midi::Message;
use crate::ring::RingBuffer;
use crate::state::DeviceState;

/// One invocation from the platform MIDI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// A complete short message: raw wire bytes plus the driver timestamp
    /// in microseconds.
    Data {
        status: u8,
        data1: u8,
        data2: u8,
        timestamp: u64,
    },
    /// Driver-side input overrun: the OS dropped data before we saw it.
    Overflow,
    /// Input port opened.
    Opened,
    /// Input port closed.
    Closed,
    /// Driver-reported error condition.
    Error,
    /// Long-form SysEx delivery; payloads are unsupported.
    LongData,
}

/// Capability interface invoked from the delivery context.
///
/// Implementations must not block and must not call back into the device
/// control API: the callback runs on a driver-owned thread.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &DeliveryEvent);
}

struct QueueInner {
    ring: RingBuffer<Message>,
    dropped_messages: bool,
}

/// Bounded message queue between the delivery context and consumer threads.
///
/// A push into a full queue discards the message and latches a sticky
/// dropped flag instead of blocking; the consumer polls [`dropped`]
/// (read-and-clear) to learn that loss occurred since its last check.
///
/// [`dropped`]: QueueEventHandler::dropped
pub struct QueueEventHandler {
    inner: Mutex<QueueInner>,
}

impl QueueEventHandler {
    /// Create a queue holding up to `capacity` messages.
    ///
    /// There is no default capacity; the embedding application chooses.
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                ring: RingBuffer::new(capacity),
                dropped_messages: false,
            }),
        }
    }

    /// Append one message; on a full queue the message is discarded and the
    /// dropped flag latches.
    pub fn push(&self, message: Message) {
        let mut inner = self.inner.lock();
        if inner.ring.push(message).is_err() {
            inner.dropped_messages = true;
        }
    }

    /// Remove the oldest message, or `None` when the queue is empty.
    pub fn pop(&self) -> Option<Message> {
        self.inner.lock().ring.pop().ok()
    }

    /// Were any messages lost since the last call? Clears the flag.
    pub fn dropped(&self) -> bool {
        let mut inner = self.inner.lock();
        std::mem::take(&mut inner.dropped_messages)
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ring.is_empty()
    }
}

impl EventHandler for QueueEventHandler {
    fn handle(&self, event: &DeliveryEvent) {
        match *event {
            DeliveryEvent::Data {
                status,
                data1,
                data2,
                timestamp: _,
            } => match Message::decode(status, data1, data2) {
                Ok(message) => self.push(message),
                // Malformed input drops one message, never the connection
                Err(err) => warn!("dropping message: {}", err),
            },
            DeliveryEvent::Overflow => {
                self.inner.lock().dropped_messages = true;
                warn!("driver reported input overrun");
            }
            // Open/close/error/long-form are defined no-ops for the queue
            DeliveryEvent::Opened
            | DeliveryEvent::Closed
            | DeliveryEvent::Error
            | DeliveryEvent::LongData => {}
        }
    }
}

/// Device-state aggregator behind a mutex.
///
/// The delivery context folds messages in via [`EventHandler::handle`];
/// application threads sample with [`snapshot`] or read in place with
/// [`with_state`], both under the same lock.
///
/// [`snapshot`]: StateEventHandler::snapshot
/// [`with_state`]: StateEventHandler::with_state
pub struct StateEventHandler {
    state: Mutex<DeviceState>,
}

impl StateEventHandler {
    /// Create a handler over a zeroed [`DeviceState`].
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DeviceState::new()),
        }
    }

    /// Fold one message into the aggregate.
    pub fn update(&self, message: &Message) {
        self.state.lock().update(message);
    }

    /// Apply the MIDI power-on defaults to every channel.
    pub fn reset(&self) {
        self.state.lock().reset();
    }

    /// Copy of the aggregate at this instant.
    pub fn snapshot(&self) -> DeviceState {
        self.state.lock().clone()
    }

    /// Read the aggregate in place while holding the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&DeviceState) -> R) -> R {
        f(&self.state.lock())
    }
}

impl Default for StateEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for StateEventHandler {
    fn handle(&self, event: &DeliveryEvent) {
        match *event {
            DeliveryEvent::Data {
                status,
                data1,
                data2,
                timestamp: _,
            } => match Message::decode(status, data1, data2) {
                Ok(message) => self.update(&message),
                Err(err) => warn!("dropping message: {}", err),
            },
            // State tracking has nothing to record for the rest
            _ => {}
        }
    }
}
