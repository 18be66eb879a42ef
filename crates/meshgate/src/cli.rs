//! Clap derive structures for the `meshgate` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshgate -- control switches and fans behind a LAN mesh gateway
#[derive(Debug, Parser)]
#[command(
    name = "meshgate",
    version,
    about = "Control mesh gateway switches and fans from the command line",
    long_about = "Discovers the gateway on the LAN via multicast DNS, drives outputs\n\
        through its HTTP command endpoint, and follows state changes pushed\n\
        over UDP.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file path (defaults to the platform config dir)
    #[arg(long, env = "MESHGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Gateway host or IPv4 address (skips discovery)
    #[arg(long, short = 'H', env = "MESHGATE_HOST", global = true)]
    pub host: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MESHGATE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Timeout in seconds (command requests; discovery for `discover`)
    #[arg(long, env = "MESHGATE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find the gateway on the local network
    Discover(DiscoverArgs),

    /// List and inspect configured devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Turn a device on (switch: 1, fan: full speed)
    On(DeviceArg),

    /// Turn a device off
    Off(DeviceArg),

    /// Set a fan's speed (0-4)
    Speed(SpeedArgs),

    /// Set a device's raw state (switch: 0/1, fan: 0-100)
    Set(SetArgs),

    /// Ask every board to report its outputs
    Status,

    /// Follow state changes and gateway connectivity
    Watch(WatchArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Arguments ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Only accept a gateway advertising this serial
    #[arg(long)]
    pub serial: Option<String>,
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List configured devices
    #[command(alias = "ls")]
    List {
        /// Query the gateway for current states first
        #[arg(long)]
        live: bool,
    },

    /// Show one device
    Get {
        /// Device key (`board_sub`) or name
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct DeviceArg {
    /// Device key (`board_sub`) or name
    pub device: String,
}

#[derive(Debug, Args)]
pub struct SpeedArgs {
    /// Device key (`board_sub`) or name
    pub device: String,

    /// Speed ordinal: 0 = off, 4 = full
    pub level: u8,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device key (`board_sub`) or name
    pub device: String,

    /// Raw state value
    pub state: u8,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(long)]
    pub duration: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a starter config file
    Init {
        /// Gateway serial to pin discovery to
        #[arg(long)]
        serial: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
