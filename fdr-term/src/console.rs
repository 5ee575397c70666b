use std::{
    io::{BufRead, Write},
    str::FromStr,
};

use clap::Parser;
use fdr::{EventSink, SimConnectManager};
use simconnect::Connector;

/// Flight data recorder console for Microsoft Flight Simulator.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "fdr-term", version)]
pub struct Options {
    /// Print every event as JSON instead of reading commands from stdin
    #[arg(long)]
    pub non_interactive: bool,

    /// Application name announced to the simulator
    #[arg(long, value_name = "NAME")]
    pub app_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    Status,
    Airplane,
    Environment,
    Simulator,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Ok(Command::TogglePause),
            "s" | "status" => Ok(Command::Status),
            "a" | "airplane" => Ok(Command::Airplane),
            "e" | "environment" => Ok(Command::Environment),
            "sim" | "simulator" => Ok(Command::Simulator),
            "h" | "help" | "?" => Ok(Command::Help),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command {:?}, try 'help'", other)),
        }
    }
}

const HELP: &str = "commands: pause, status, airplane, environment, simulator, help, quit";

/// Prints every published event as a line of JSON.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        println!("{} {}", event, payload);
    }
}

fn print_json<T: serde::Serialize>(output: &mut impl Write, value: &T) -> std::io::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    writeln!(output, "{}", text)
}

/// Reads commands from `input` until `quit` or end of input.
pub fn run<C: Connector>(
    manager: &SimConnectManager<C>,
    input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<()> {
    writeln!(output, "{}", HELP)?;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::TogglePause) => manager.toggle_pause(),
            Ok(Command::Status) => {
                writeln!(output, "{}", manager.connection_state())?;
            }
            Ok(Command::Airplane) => print_json(&mut output, &manager.airplane_state())?,
            Ok(Command::Environment) => print_json(&mut output, &manager.environment_state())?,
            Ok(Command::Simulator) => print_json(&mut output, &manager.simulator_state())?,
            Ok(Command::Help) => writeln!(output, "{}", HELP)?,
            Ok(Command::Quit) => break,
            Err(e) => writeln!(output, "{}", e)?,
        }
    }

    Ok(())
}
