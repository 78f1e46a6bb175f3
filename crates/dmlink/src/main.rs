//! dmlink - headless DM4800 MIDI control surface
//!
//! This is the main entry point. It:
//! 1. Loads settings and the console tables
//! 2. Opens the MIDI ports (remembered or given on the command line)
//! 3. Runs one control thread that handles inbound CCs and console commands
//!
//! ## Command line flags
//!
//! - `--list-ports`: print available MIDI ports and exit
//! - `--midi-in <port>`, `--midi-out <port>`: open these ports instead of the remembered ones
//! - `--data-dir <dir>`: directory holding the CSV tables
//! - `--settings <file>`: settings file (default `~/.config/dmlink/settings.yaml`)
//! - `--wide`: start with stereo pairs shown as single wide strips

mod commands;
mod config;

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use flume::{Receiver, Selector, Sender};

use commands::{parse_command, Command, PortDirection, HELP};
use config::{default_settings_path, load_settings, save_settings, Settings};
use dmlink_midi::midi::INBOUND_QUEUE;
use dmlink_midi::{
    display_rows, CcMessage, ChannelKey, ControlType, DisplayMode, MidiConnection,
    MidiInputHandler, MidiOutputPort, MixerSurface, SurfaceTables, TablePaths, ToggleOutcome,
};

#[derive(Debug, Default, PartialEq)]
struct Args {
    help: bool,
    list_ports: bool,
    midi_in: Option<String>,
    midi_out: Option<String>,
    data_dir: Option<PathBuf>,
    settings: Option<PathBuf>,
    wide: bool,
}

const USAGE: &str = "\
usage: dmlink [--list-ports] [--midi-in <port>] [--midi-out <port>]
              [--data-dir <dir>] [--settings <file>] [--wide]";

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = || {
            args.next()
                .with_context(|| format!("Missing value for {}", arg))
        };
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "--list-ports" => parsed.list_ports = true,
            "--wide" => parsed.wide = true,
            "--midi-in" => parsed.midi_in = Some(value()?),
            "--midi-out" => parsed.midi_out = Some(value()?),
            "--data-dir" => parsed.data_dir = Some(PathBuf::from(value()?)),
            "--settings" => parsed.settings = Some(PathBuf::from(value()?)),
            other => bail!("Unknown argument: {}\n{}", other, USAGE),
        }
    }

    Ok(parsed)
}

fn print_ports() {
    match MidiConnection::list_input_ports() {
        Ok(ports) => {
            println!("MIDI inputs:");
            ports.iter().for_each(|name| println!("  {}", name));
        }
        Err(e) => eprintln!("Warning: {}", e),
    }
    match MidiConnection::list_output_ports() {
        Ok(ports) => {
            println!("MIDI outputs:");
            ports.iter().for_each(|name| println!("  {}", name));
        }
        Err(e) => eprintln!("Warning: {}", e),
    }
}

/// Everything the control thread works on
struct Console {
    surface: MixerSurface<MidiOutputPort>,
    input: Option<MidiInputHandler>,
    midi_tx: Sender<CcMessage>,
    settings: Settings,
    settings_path: PathBuf,
}

impl Console {
    fn open_input(&mut self, name: &str) -> bool {
        // Drop the old connection first so the port is free to reopen
        self.input = None;
        match MidiInputHandler::connect(name, self.midi_tx.clone()) {
            Ok(handler) => {
                println!("MIDI in:  {}", handler.port_name());
                self.settings.midi_in_port = Some(handler.port_name().to_string());
                self.input = Some(handler);
                true
            }
            Err(e) => {
                log::warn!("MIDI: {}", e);
                false
            }
        }
    }

    fn open_output(&mut self, name: &str) -> bool {
        match self.surface.sender_mut().open(name).map(str::to_string) {
            Ok(resolved) => {
                println!("MIDI out: {}", resolved);
                self.settings.midi_out_port = Some(resolved);
                true
            }
            Err(e) => {
                log::warn!("MIDI: {}", e);
                false
            }
        }
    }

    /// Open ports from the command line, falling back to remembered ones
    fn open_startup_ports(&mut self, midi_in: Option<String>, midi_out: Option<String>) {
        let remembered = |port: &Option<String>| {
            if self.settings.remember_ports {
                port.clone()
            } else {
                None
            }
        };
        let input = midi_in.or_else(|| remembered(&self.settings.midi_in_port));
        let output = midi_out.or_else(|| remembered(&self.settings.midi_out_port));

        match input {
            Some(name) => {
                self.open_input(&name);
            }
            None => log::info!("MIDI: No input port configured"),
        }
        match output {
            Some(name) => {
                self.open_output(&name);
            }
            None => log::info!("MIDI: No output port configured, local changes will not be sent"),
        }
    }

    fn save(&self) {
        if let Err(e) = save_settings(&self.settings, &self.settings_path) {
            log::warn!("{:#}", e);
        }
    }

    fn print_strip(&self, key: &ChannelKey) {
        let (Some(descriptor), Some(strip)) =
            (self.surface.layout().strip_for(key), self.surface.strip(key))
        else {
            println!("{}: no such strip", key);
            return;
        };

        let kind = strip.kind();
        print!("{:<10} fader {:>3}", descriptor.title, strip.get_fader());
        if kind.has_pan {
            print!("  {} {:>3}", descriptor.pan_label, strip.pan_display());
        }
        if kind.has_mute {
            print!("  mute {}", if strip.get_mute() { "on" } else { "off" });
        }
        if let Some(partner) = strip.partner() {
            print!("  linked to {}", partner);
        }
        println!();

        if kind.has_scribble {
            let (top, bottom) = display_rows(self.surface.label(&descriptor.key));
            println!("           [{}] [{}]", top, bottom);
        }
    }

    fn set(&mut self, strip: ChannelKey, control: ControlType, value: i32) {
        let dispatch = self.surface.set(strip, control, value);

        for change in &dispatch.changes {
            println!(
                "{}: {} -> {}{}",
                change.address,
                change.previous,
                change.current,
                if change.mirrored { " (linked)" } else { "" }
            );
        }
        if let Some(message) = dispatch.sent {
            println!(
                "sent Ch {} CC {} = {}",
                message.channel, message.cc, message.value
            );
        }
        if let Some(reason) = &dispatch.dropped {
            println!("not sent: {}", reason);
        }
    }

    /// Run one command; returns `false` when the console should exit
    fn run(&mut self, command: Command) -> bool {
        match command {
            Command::Set {
                strip,
                control,
                value,
            } => self.set(strip, control, value),
            Command::Toggle => match self.surface.toggle_display_mode() {
                ToggleOutcome::Toggled(report) => {
                    println!(
                        "Display mode: {} ({} strips, {} linked pairs)",
                        report.mode, report.strips, report.linked_pairs
                    );
                    self.settings.stereo_display_mode = report.mode;
                    self.save();
                }
                ToggleOutcome::Ignored => println!("Display rebuild already in progress"),
            },
            Command::Show(strip) => self.print_strip(&strip),
            Command::Label { strip, text } => match self.surface.set_label(&strip, &text) {
                Some(label) => println!("{}: \"{}\"", strip, label),
                None => println!("{} has no scribble strip", strip),
            },
            Command::Monitor(count) => {
                for entry in self.surface.monitor().recent(count) {
                    println!("{}", entry);
                }
            }
            Command::Log(true) => {
                let path = self.settings.midi_log_path();
                if self.surface.monitor_mut().start_logging(&path) {
                    println!("Logging MIDI to {:?}", path);
                } else {
                    println!("Cannot open {:?}", path);
                }
            }
            Command::Log(false) => self.surface.monitor_mut().stop_logging(),
            Command::Ports => {
                print_ports();
                let current = |name: Option<&str>| name.unwrap_or("(none)").to_string();
                println!(
                    "Open: in {}, out {}",
                    current(self.input.as_ref().map(MidiInputHandler::port_name)),
                    current(self.surface.sender().port_name())
                );
            }
            Command::Open { direction, name } => {
                let opened = match direction {
                    PortDirection::In => self.open_input(&name),
                    PortDirection::Out => self.open_output(&name),
                };
                if opened && self.settings.remember_ports {
                    self.save();
                } else if !opened {
                    println!("No MIDI port matching {:?}", name);
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }
}

/// Forward stdin lines to the control thread until EOF
fn read_console(tx: Sender<String>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        if tx.send(line).is_err() {
            break;
        }
    }
}

enum Event {
    Midi(CcMessage),
    Line(String),
    ConsoleClosed,
}

fn next_event(midi_rx: &Receiver<CcMessage>, line_rx: Option<&Receiver<String>>) -> Event {
    match line_rx {
        Some(line_rx) => Selector::new()
            .recv(midi_rx, |m| m.map_or(Event::ConsoleClosed, Event::Midi))
            .recv(line_rx, |l| l.map_or(Event::ConsoleClosed, Event::Line))
            .wait(),
        None => midi_rx.recv().map_or(Event::ConsoleClosed, Event::Midi),
    }
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug to trace every CC
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }
    if args.list_ports {
        print_ports();
        return Ok(());
    }

    log::info!("dmlink starting up");

    let settings_path = args.settings.unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    if let Some(dir) = args.data_dir {
        settings.data_dir = dir;
    }
    if args.wide {
        settings.stereo_display_mode = DisplayMode::WideCombined;
    }

    let tables = SurfaceTables::load(&TablePaths::in_dir(&settings.data_dir))
        .with_context(|| format!("Failed to load console tables from {:?}", settings.data_dir))?;
    log::info!(
        "Loaded {} CC mapping(s), {} stereo pair(s)",
        tables.mappings.len(),
        tables.registry.pair_count()
    );

    let surface = MixerSurface::new(tables, settings.stereo_display_mode, MidiOutputPort::new());
    let (midi_tx, midi_rx) = flume::bounded(INBOUND_QUEUE);

    let mut console = Console {
        surface,
        input: None,
        midi_tx,
        settings,
        settings_path,
    };
    console.open_startup_ports(args.midi_in, args.midi_out);

    let (line_tx, line_rx) = flume::unbounded();
    std::thread::Builder::new()
        .name("dmlink-console".to_string())
        .spawn(move || read_console(line_tx))
        .context("Failed to start console reader")?;

    println!(
        "dmlink ready ({} display). Type 'help' for commands.",
        console.surface.display_mode()
    );

    let mut line_rx = Some(line_rx);
    loop {
        match next_event(&midi_rx, line_rx.as_ref()) {
            Event::Midi(message) => {
                console.surface.handle(message.into());
            }
            Event::Line(line) => match parse_command(&line) {
                Ok(Some(command)) => {
                    if !console.run(command) {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("{}", e),
            },
            Event::ConsoleClosed if line_rx.is_some() => {
                // No stdin (e.g. running as a service): keep serving MIDI
                log::info!("Console input closed, continuing with MIDI only");
                line_rx = None;
            }
            Event::ConsoleClosed => break,
        }
    }

    console.surface.monitor_mut().stop_logging();
    console.surface.sender_mut().close();
    log::info!("dmlink shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--midi-in", "DM-4800 MIDI 1", "--data-dir", "/srv/dm", "--wide"]).unwrap();
        assert_eq!(
            parsed,
            Args {
                midi_in: Some("DM-4800 MIDI 1".to_string()),
                data_dir: Some(PathBuf::from("/srv/dm")),
                wide: true,
                ..Default::default()
            }
        );
        assert_eq!(args(&[]).unwrap(), Args::default());
        assert!(args(&["--list-ports"]).unwrap().list_ports);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&["--midi-out"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }
}
