//! midilink - MIDI monitor and send tool
//!
//! Watches a MIDI input port (scrolling decode or aggregated state view)
//! and sends hand-typed messages to an output port.

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midilink::config::{AppConfig, MidiConfig};
use midilink::device::OutputPort;
use midilink::{monitor, repl};

/// Midilink - watch and drive MIDI devices from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Input port selector (index or name substring), overrides config
    #[arg(short, long)]
    input: Option<String>,

    /// Output port selector (index or name substring), overrides config
    #[arg(short, long)]
    output: Option<String>,

    /// Queue capacity, overrides config
    #[arg(long)]
    capacity: Option<usize>,

    /// Show the aggregated device state instead of the message stream
    #[arg(long)]
    state_view: bool,

    /// Run the interactive send REPL (requires an output port)
    #[arg(long)]
    repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        monitor::list_ports_formatted();
        return Ok(());
    }

    let config = resolve_config(&args).await?;

    if args.repl {
        let selector = match &config.midi.output_port {
            Some(selector) => selector.clone(),
            None => bail!("the REPL needs an output port (--output or midi.output_port)"),
        };
        let output = OutputPort::connect(&selector)?;
        info!("Output connected: {}", output.name());
        return repl::run_repl(&output).await;
    }

    if args.state_view {
        monitor::run_state_view(&config).await
    } else {
        monitor::run_monitor(&config).await
    }
}

/// CLI arguments win over the config file; the file is only read when the
/// command line leaves something undecided.
async fn resolve_config(args: &Args) -> Result<AppConfig> {
    let config = match (&args.input, args.capacity) {
        (Some(input), Some(capacity)) => AppConfig {
            midi: MidiConfig {
                input_port: input.clone(),
                output_port: args.output.clone(),
                queue_capacity: capacity,
            },
        },
        _ => {
            let mut config = AppConfig::load(&args.config).await?;
            if let Some(input) = &args.input {
                config.midi.input_port = input.clone();
            }
            if let Some(output) = &args.output {
                config.midi.output_port = Some(output.clone());
            }
            if let Some(capacity) = args.capacity {
                config.midi.queue_capacity = capacity;
            }
            config
        }
    };
    config.validate()?;
    Ok(config)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
