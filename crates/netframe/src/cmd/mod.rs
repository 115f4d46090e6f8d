use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and echo every message back to its sender.
    Echo(EchoArgs),
    /// Connect and send a payload, optionally waiting for one reply.
    Send(SendArgs),
    /// Accept connections and print received messages to stdout.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Dispatch a parsed subcommand, returning the process exit code.
pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (host:port).
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (host:port).
    pub addr: String,

    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,

    /// Read the payload from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,

    /// Queue the payload this many times before flushing.
    #[arg(long, default_value = "1")]
    pub repeat: usize,

    /// Wait for one reply and print it.
    #[arg(long)]
    pub wait: bool,

    /// Reply deadline when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,

    /// Per-write send timeout (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub send_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    pub addr: String,

    /// Exit successfully after printing this many messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build and feature details.
    #[arg(long)]
    pub extended: bool,
}
