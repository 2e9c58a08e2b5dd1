//! Interactive send loop
//!
//! Parses simple commands into messages and transmits them on an output
//! port. Channels are entered 1-16 as printed by the monitor.

use anyhow::Result;
use colored::*;
use rustyline::DefaultEditor;

use crate::device::OutputPort;
use crate::midi::{convert, Message};

/// One parsed REPL command.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Messages to encode and transmit, in order
    Send(Vec<Message>),
    /// Raw bytes to send untouched
    Raw(Vec<u8>),
    Help,
    Quit,
}

pub async fn run_repl(output: &OutputPort) -> Result<()> {
    println!("{}", "=== MIDI Send REPL ===".bold().cyan());
    println!("Connected to '{}'. Type 'help' for commands.\n", output.name());

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("midilink> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                match parse_command(line) {
                    Ok(Command::Quit) => break,
                    Ok(Command::Help) => print_help(),
                    Ok(Command::Send(messages)) => {
                        for message in messages {
                            match output.transmit(&message) {
                                Ok(()) => println!("sent {}", message.to_string().green()),
                                Err(e) => println!("{} {}", "send failed:".red(), e),
                            }
                        }
                    }
                    Ok(Command::Raw(bytes)) => match output.send_raw(&bytes) {
                        Ok(()) => println!("sent {} raw bytes", bytes.len()),
                        Err(e) => println!("{} {}", "send failed:".red(), e),
                    },
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(_) => break,
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        "\
note-on <ch> <key> <vel>     Note On (channel 1-16)
note-off <ch> <key>          Note Off
poly <ch> <key> <pressure>   Polyphonic key pressure
cc <ch> <controller> <value> Control change
cc14 <ch> <msb-ctl> <value>  14-bit CC pair (controller 0-31, value 0-16383)
pc <ch> <program>            Program change
pressure <ch> <value>        Channel pressure
pb <ch> <bend>               Pitch bend (0-16383, 8192 = center)
song <n>                     Song select
pos <beats>                  Song position pointer
clock|start|continue|stop    Real-time messages
tune|reset                   Tune request / system reset
hex <bytes...>               Send raw hex bytes, e.g. hex 90 3C 64
help                         This text
quit                         Leave the REPL"
    );
}

fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((command, args)) = parts.split_first() else {
        return Err("empty command".into());
    };

    match *command {
        "quit" | "exit" => Ok(Command::Quit),
        "help" => Ok(Command::Help),
        "note-on" | "on" => {
            let (channel, key, velocity) = (channel_arg(args, 0)?, arg(args, 1, "key")?, arg(args, 2, "velocity")?);
            Ok(Command::Send(vec![Message::NoteOn {
                channel,
                key,
                velocity,
            }]))
        }
        "note-off" | "off" => {
            let (channel, key) = (channel_arg(args, 0)?, arg(args, 1, "key")?);
            Ok(Command::Send(vec![Message::NoteOff {
                channel,
                key,
                velocity: 0,
            }]))
        }
        "poly" => {
            let (channel, key, pressure) = (channel_arg(args, 0)?, arg(args, 1, "key")?, arg(args, 2, "pressure")?);
            Ok(Command::Send(vec![Message::PolyKeyPressure {
                channel,
                key,
                pressure,
            }]))
        }
        "cc" => {
            let (channel, controller, value) = (
                channel_arg(args, 0)?,
                arg(args, 1, "controller")?,
                arg(args, 2, "value")?,
            );
            Ok(Command::Send(vec![Message::ControlChange {
                channel,
                controller,
                value,
            }]))
        }
        "cc14" => {
            let channel = channel_arg(args, 0)?;
            let controller: u8 = arg(args, 1, "controller")?;
            let value: u16 = arg(args, 2, "value")?;
            if controller >= 32 {
                return Err("cc14 controller must be 0-31 (the MSB of the pair)".into());
            }
            // MSB on the named controller, LSB on its companion at +32
            Ok(Command::Send(vec![
                Message::ControlChange {
                    channel,
                    controller,
                    value: convert::to_7bit(value),
                },
                Message::ControlChange {
                    channel,
                    controller: controller + 32,
                    value: (value & 0x7F) as u8,
                },
            ]))
        }
        "pc" => {
            let (channel, program) = (channel_arg(args, 0)?, arg(args, 1, "program")?);
            Ok(Command::Send(vec![Message::ProgramChange {
                channel,
                program,
            }]))
        }
        "pressure" => {
            let (channel, pressure) = (channel_arg(args, 0)?, arg(args, 1, "value")?);
            Ok(Command::Send(vec![Message::ChannelPressure {
                channel,
                pressure,
            }]))
        }
        "pb" => {
            let (channel, bend) = (channel_arg(args, 0)?, arg(args, 1, "bend")?);
            Ok(Command::Send(vec![Message::PitchBend { channel, bend }]))
        }
        "song" => Ok(Command::Send(vec![Message::SongSelect {
            song: arg(args, 0, "song")?,
        }])),
        "pos" => Ok(Command::Send(vec![Message::SongPosition {
            beats: arg(args, 0, "beats")?,
        }])),
        "clock" => Ok(Command::Send(vec![Message::TimingClock])),
        "start" => Ok(Command::Send(vec![Message::Start])),
        "continue" => Ok(Command::Send(vec![Message::Continue])),
        "stop" => Ok(Command::Send(vec![Message::Stop])),
        "tune" => Ok(Command::Send(vec![Message::TuneRequest])),
        "reset" => Ok(Command::Send(vec![Message::Reset])),
        "hex" => {
            if args.is_empty() {
                return Err("hex needs at least one byte".into());
            }
            let bytes = args
                .iter()
                .map(|part| u8::from_str_radix(part, 16))
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|e| format!("bad hex byte: {}", e))?;
            Ok(Command::Raw(bytes))
        }
        other => Err(format!("unknown command '{}', try 'help'", other)),
    }
}

fn arg<T: std::str::FromStr>(args: &[&str], index: usize, name: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(index)
        .ok_or_else(|| format!("missing argument <{}>", name))?;
    raw.parse()
        .map_err(|e| format!("bad {} '{}': {}", name, raw, e))
}

/// Channels are entered 1-16, stored 0-15.
fn channel_arg(args: &[&str], index: usize) -> Result<u8, String> {
    let channel: u8 = arg(args, index, "channel")?;
    if !(1..=16).contains(&channel) {
        return Err(format!("channel must be 1-16, got {}", channel));
    }
    Ok(channel - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_note_on_with_one_based_channel() {
        assert_eq!(
            parse_command("note-on 1 60 100"),
            Ok(Command::Send(vec![Message::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100,
            }]))
        );
    }

    #[test]
    fn rejects_out_of_range_channel() {
        assert!(parse_command("note-on 0 60 100").is_err());
        assert!(parse_command("note-on 17 60 100").is_err());
    }

    #[test]
    fn parses_pitch_bend_center() {
        assert_eq!(
            parse_command("pb 3 8192"),
            Ok(Command::Send(vec![Message::PitchBend {
                channel: 2,
                bend: 8192,
            }]))
        );
    }

    #[test]
    fn cc14_splits_into_msb_lsb_pair() {
        assert_eq!(
            parse_command("cc14 1 7 16383"),
            Ok(Command::Send(vec![
                Message::ControlChange {
                    channel: 0,
                    controller: 7,
                    value: 127,
                },
                Message::ControlChange {
                    channel: 0,
                    controller: 39,
                    value: 127,
                },
            ]))
        );
        assert!(parse_command("cc14 1 40 100").is_err());
    }

    #[test]
    fn parses_real_time_and_raw_hex() {
        assert_eq!(parse_command("clock"), Ok(Command::Send(vec![Message::TimingClock])));
        assert_eq!(
            parse_command("hex 90 3C 64"),
            Ok(Command::Raw(vec![0x90, 0x3C, 0x64]))
        );
        assert!(parse_command("hex zz").is_err());
    }

    #[test]
    fn missing_arguments_report_their_name() {
        let err = parse_command("note-on 1 60").unwrap_err();
        assert!(err.contains("velocity"));
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse_command("frobnicate").is_err());
    }
}
