//! MIDI traffic monitor
//!
//! Attaches a queue or state handler to an input port and renders what
//! arrives: a scrolling decode of the traffic, or a periodically sampled
//! view of the aggregated device state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use colored::*;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::config::AppConfig;
use crate::device::{discovery, InputPort};
use crate::handlers::{EventHandler, QueueEventHandler, StateEventHandler};
use crate::midi::{format_hex, Message};
use crate::state::{normalised_7bit, DeviceState};

/// Poll interval for the queue drain loop.
const DRAIN_IDLE: Duration = Duration::from_millis(5);

/// Refresh interval for the state view.
const STATE_REFRESH: Duration = Duration::from_millis(500);

/// List all ports in a formatted way
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    match discovery::input_ports() {
        Ok(ports) if ports.is_empty() => println!("\n  {}", "No input ports found".dimmed()),
        Ok(ports) => {
            println!("\n{}", "Input Ports:".bold());
            for port in ports {
                println!("  {}: {}", port.index, port.name);
            }
        }
        Err(e) => println!("  {} {}", "input scan failed:".red(), e),
    }

    match discovery::output_ports() {
        Ok(ports) if ports.is_empty() => println!("\n  {}", "No output ports found".dimmed()),
        Ok(ports) => {
            println!("\n{}", "Output Ports:".bold());
            for port in ports {
                println!("  {}: {}", port.index, port.name);
            }
        }
        Err(e) => println!("  {} {}", "output scan failed:".red(), e),
    }

    println!();
}

fn spawn_ctrl_c(running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        running.store(false, Ordering::Relaxed);
    });
}

/// Scrolling decode of everything arriving on one input port.
pub async fn run_monitor(config: &AppConfig) -> Result<()> {
    println!("{}", "=== MIDI Monitor ===".bold().cyan());

    let queue = Arc::new(QueueEventHandler::with_capacity(config.midi.queue_capacity));
    let handler: Arc<dyn EventHandler> = Arc::clone(&queue) as Arc<dyn EventHandler>;
    let port = InputPort::connect(&config.midi.input_port, handler)?;
    info!("Monitoring input port '{}'", port.name());

    println!("Monitoring '{}'  (Ctrl+C to exit)\n", port.name());
    println!("{}", "Format: [timestamp] HEX => PARSED".dimmed());
    println!("{}\n", "─".repeat(72).dimmed());

    let running = Arc::new(AtomicBool::new(true));
    spawn_ctrl_c(Arc::clone(&running));

    let start = Instant::now();
    while running.load(Ordering::Relaxed) {
        let mut drained = false;
        while let Some(message) = queue.pop() {
            drained = true;
            print_message(start.elapsed().as_millis() as u64, &message);
        }
        if queue.dropped() {
            println!(
                "{}",
                "messages dropped: queue full or driver overrun".yellow()
            );
        }
        if !drained {
            sleep(DRAIN_IDLE).await;
        }
    }

    println!("\n{}", "Monitor stopped".yellow());
    Ok(())
}

fn print_message(timestamp_ms: u64, message: &Message) {
    let bytes = message.encode();
    let hex = format_hex(&bytes[..message.wire_len()]);

    // Color code by message type
    let hex_colored = match message {
        Message::NoteOn { .. } => hex.bright_green(),
        Message::NoteOff { .. } => hex.bright_red(),
        Message::ControlChange { .. } => hex.bright_yellow(),
        Message::PitchBend { .. } => hex.bright_cyan(),
        Message::SystemExclusive { .. } => hex.bright_magenta(),
        _ => hex.normal(),
    };

    println!(
        "[{}ms] {:12} => {}",
        format!("{:08}", timestamp_ms).dimmed(),
        hex_colored,
        message.to_string().bright_blue()
    );
}

/// Periodically sampled view of the aggregated device state.
pub async fn run_state_view(config: &AppConfig) -> Result<()> {
    println!("{}", "=== MIDI State View ===".bold().cyan());

    let state_handler = Arc::new(StateEventHandler::new());
    let handler: Arc<dyn EventHandler> = Arc::clone(&state_handler) as Arc<dyn EventHandler>;
    let port = InputPort::connect(&config.midi.input_port, handler)?;
    info!("Tracking state of input port '{}'", port.name());

    println!("Tracking '{}'  (Ctrl+C to exit)\n", port.name());

    let running = Arc::new(AtomicBool::new(true));
    spawn_ctrl_c(Arc::clone(&running));

    let mut last = state_handler.snapshot();
    while running.load(Ordering::Relaxed) {
        sleep(STATE_REFRESH).await;
        let snapshot = state_handler.snapshot();
        if snapshot != last {
            render_state(&snapshot);
            last = snapshot;
        }
    }

    println!("\n{}", "State view stopped".yellow());
    Ok(())
}

fn render_state(state: &DeviceState) {
    println!("{}", "─".repeat(72).dimmed());
    let mut anything = false;
    for (number, channel) in state.channels.iter().enumerate() {
        let held: Vec<String> = channel
            .keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.velocity > 0)
            .map(|(key, state)| format!("{}@{}", key, state.velocity))
            .collect();

        if held.is_empty() && channel.pitch_bend == 0 && channel.pressure == 0 {
            continue;
        }
        anything = true;

        println!(
            "ch {:2}  prog {:3}  vol {:4.2}  bend {:+.3}  pressure {:3}  keys [{}]",
            (number + 1).to_string().bold(),
            channel.program,
            normalised_7bit(channel.controller(7)),
            channel.pitch_bend_normalised(),
            channel.pressure,
            held.join(" ").green()
        );
    }
    if !anything {
        println!("{}", "all channels idle".dimmed());
    }
}
