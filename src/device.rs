//! MIDI device lifecycle shim over midir
//!
//! Owns the OS port handles and the callback registration; everything it
//! does with the bytes themselves goes through the codec and the event
//! handlers. The driver callback runs on an OS-owned thread (the delivery
//! context): it must never block and never call back into the port control
//! API.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::handlers::{DeliveryEvent, EventHandler};
use crate::midi::{format_hex, Message};

/// Debug-only tracking of the delivery context.
///
/// The driver callback tags its thread for the duration of one delivery;
/// re-entering the delivery path on the same thread, or touching the port
/// control API from inside it, is a programming error that fails loudly in
/// debug builds and compiles to nothing in release.
pub mod guard {
    use std::cell::Cell;

    thread_local! {
        static IN_DELIVERY: Cell<bool> = Cell::new(false);
    }

    /// RAII tag for one delivery-context invocation.
    pub struct DeliveryGuard {
        _priv: (),
    }

    /// Mark the current thread as the delivery context.
    pub fn enter() -> DeliveryGuard {
        IN_DELIVERY.with(|flag| {
            debug_assert!(
                !flag.get(),
                "delivery context re-entered on the same thread"
            );
            flag.set(true);
        });
        DeliveryGuard { _priv: () }
    }

    /// Is the current thread inside a delivery-context invocation?
    pub fn in_delivery_context() -> bool {
        IN_DELIVERY.with(|flag| flag.get())
    }

    /// Assert that a control-API operation is not running on the delivery
    /// thread.
    pub fn assert_outside_delivery(operation: &str) {
        debug_assert!(
            !in_delivery_context(),
            "{} must not be called from the delivery context",
            operation
        );
        let _ = operation;
    }

    impl Drop for DeliveryGuard {
        fn drop(&mut self) {
            IN_DELIVERY.with(|flag| flag.set(false));
        }
    }
}

/// Turn one raw callback slice into a delivery event.
///
/// Anything longer than a short message is long-form SysEx territory and
/// reported as `LongData`; an empty slice is a driver error.
fn classify_raw(data: &[u8], timestamp: u64) -> DeliveryEvent {
    match *data {
        [] => DeliveryEvent::Error,
        [status] => DeliveryEvent::Data {
            status,
            data1: 0,
            data2: 0,
            timestamp,
        },
        [status, data1] => DeliveryEvent::Data {
            status,
            data1,
            data2: 0,
            timestamp,
        },
        [status, data1, data2] => DeliveryEvent::Data {
            status,
            data1,
            data2,
            timestamp,
        },
        _ => DeliveryEvent::LongData,
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
    }

    /// Discover input ports
    pub fn input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new("midilink-scan").context("failed to create MIDI input")?;
        let mut infos = Vec::new();
        for (index, port) in midi_in.ports().iter().enumerate() {
            if let Ok(name) = midi_in.port_name(port) {
                infos.push(PortInfo { index, name });
            }
        }
        Ok(infos)
    }

    /// Discover output ports
    pub fn output_ports() -> Result<Vec<PortInfo>> {
        let midi_out = MidiOutput::new("midilink-scan").context("failed to create MIDI output")?;
        let mut infos = Vec::new();
        for (index, port) in midi_out.ports().iter().enumerate() {
            if let Ok(name) = midi_out.port_name(port) {
                infos.push(PortInfo { index, name });
            }
        }
        Ok(infos)
    }
}

/// Pick a port by numeric index or case-insensitive substring.
fn select_port<P: Clone>(
    ports: &[P],
    name_of: impl Fn(&P) -> Option<String>,
    selector: &str,
) -> Option<(P, String)> {
    if let Ok(index) = selector.parse::<usize>() {
        let port = ports.get(index)?;
        let name = name_of(port)?;
        return Some((port.clone(), name));
    }
    for port in ports {
        if let Some(name) = name_of(port) {
            if name.to_lowercase().contains(&selector.to_lowercase()) {
                debug!("Port '{}' matches selector '{}'", name, selector);
                return Some((port.clone(), name));
            }
        }
    }
    None
}

/// An open input connection feeding a caller-supplied handler.
///
/// The handler is held behind `Arc<dyn EventHandler>`; the callback owns a
/// clone, so the handler outlives every delivery — teardown happens after
/// delivery has ceased, never concurrently with it.
pub struct InputPort {
    connection: Option<MidiInputConnection<()>>,
    port_name: String,
    handler: Arc<dyn EventHandler>,
}

impl InputPort {
    /// Open the input port matching `selector` (index or name substring)
    /// and route its events into `handler`.
    pub fn connect(selector: &str, handler: Arc<dyn EventHandler>) -> Result<Self> {
        guard::assert_outside_delivery("InputPort::connect");

        let midi_in = MidiInput::new("midilink-input").context("failed to create MIDI input")?;
        let ports = midi_in.ports();
        let (port, port_name) = select_port(&ports, |p| midi_in.port_name(p).ok(), selector)
            .ok_or_else(|| anyhow!("no input port matching '{}'", selector))?;

        info!("Connecting to input port: {}", port_name);

        let callback_handler = Arc::clone(&handler);
        let connection = midi_in
            .connect(
                &port,
                "midilink",
                move |timestamp, data, _| {
                    let _guard = guard::enter();
                    callback_handler.handle(&classify_raw(data, timestamp));
                },
                (),
            )
            .map_err(|e| anyhow!("failed to connect to input port '{}': {}", port_name, e))?;

        // midir has no open notification of its own; synthesise one so
        // handlers see the full lifecycle.
        handler.handle(&DeliveryEvent::Opened);

        Ok(Self {
            connection: Some(connection),
            port_name,
            handler,
        })
    }

    /// Name of the connected port.
    pub fn name(&self) -> &str {
        &self.port_name
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Close the connection. Further delivery ceases before this returns.
    pub fn close(&mut self) {
        guard::assert_outside_delivery("InputPort::close");
        if let Some(connection) = self.connection.take() {
            connection.close();
            self.handler.handle(&DeliveryEvent::Closed);
            info!("Input port closed: {}", self.port_name);
        }
    }
}

impl Drop for InputPort {
    fn drop(&mut self) {
        self.close();
    }
}

/// An open output connection for transmitting encoded messages.
pub struct OutputPort {
    connection: Arc<Mutex<MidiOutputConnection>>,
    port_name: String,
}

impl OutputPort {
    /// Open the output port matching `selector` (index or name substring).
    pub fn connect(selector: &str) -> Result<Self> {
        guard::assert_outside_delivery("OutputPort::connect");

        let midi_out = MidiOutput::new("midilink-output").context("failed to create MIDI output")?;
        let ports = midi_out.ports();
        let (port, port_name) = select_port(&ports, |p| midi_out.port_name(p).ok(), selector)
            .ok_or_else(|| anyhow!("no output port matching '{}'", selector))?;

        info!("Connecting to output port: {}", port_name);

        let connection = midi_out
            .connect(&port, "midilink")
            .map_err(|e| anyhow!("failed to connect to output port '{}': {}", port_name, e))?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            port_name,
        })
    }

    /// Name of the connected port.
    pub fn name(&self) -> &str {
        &self.port_name
    }

    /// Encode and send one message.
    pub fn transmit(&self, message: &Message) -> Result<()> {
        let bytes = message.encode();
        let len = message.wire_len();
        let mut connection = self.connection.lock();
        connection
            .send(&bytes[..len])
            .context("failed to send MIDI message")?;
        debug!("Sent: {} | {}", format_hex(&bytes[..len]), message);
        Ok(())
    }

    /// Send raw bytes untouched.
    pub fn send_raw(&self, data: &[u8]) -> Result<()> {
        let mut connection = self.connection.lock();
        connection.send(data).context("failed to send raw bytes")?;
        debug!("Sent raw: {}", format_hex(data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_short_messages() {
        assert_eq!(
            classify_raw(&[0x90, 60, 100], 7),
            DeliveryEvent::Data {
                status: 0x90,
                data1: 60,
                data2: 100,
                timestamp: 7,
            }
        );
        assert_eq!(
            classify_raw(&[0xF8], 0),
            DeliveryEvent::Data {
                status: 0xF8,
                data1: 0,
                data2: 0,
                timestamp: 0,
            }
        );
        assert_eq!(
            classify_raw(&[0xC0, 5], 0),
            DeliveryEvent::Data {
                status: 0xC0,
                data1: 5,
                data2: 0,
                timestamp: 0,
            }
        );
    }

    #[test]
    fn classify_long_and_empty() {
        assert_eq!(
            classify_raw(&[0xF0, 1, 2, 3, 0xF7], 0),
            DeliveryEvent::LongData
        );
        assert_eq!(classify_raw(&[], 0), DeliveryEvent::Error);
    }

    #[test]
    fn guard_clears_on_drop() {
        assert!(!guard::in_delivery_context());
        {
            let _guard = guard::enter();
            assert!(guard::in_delivery_context());
        }
        assert!(!guard::in_delivery_context());
    }

    #[test]
    #[should_panic(expected = "re-entered")]
    #[cfg(debug_assertions)]
    fn guard_rejects_reentry() {
        let _outer = guard::enter();
        let _inner = guard::enter();
    }

    #[test]
    fn port_discovery_does_not_panic() {
        // Port availability depends on the system; just exercise the calls
        let _ = discovery::input_ports();
        let _ = discovery::output_ports();
    }
}
