//! Clap derive structures for the `gizwits` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// gizwits -- talk to Gizwits-connected devices through the cloud relay
#[derive(Debug, Parser)]
#[command(
    name = "gizwits",
    version,
    about = "Control Gizwits devices from the command line",
    long_about = "Lists bound devices, streams relay events, reads and writes\n\
        attributes, and manages the sub-devices of center-control gateways.",
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
    /// Application profile to use
    #[arg(long, short = 'p', env = "GIZWITS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Application id (overrides profile)
    #[arg(long, env = "GIZWITS_APP_ID", global = true)]
    pub app_id: Option<String>,

    /// End-user open id (overrides profile)
    #[arg(long, env = "GIZWITS_OPEN_ID", global = true, hide_env_values = true)]
    pub open_id: Option<String>,

    /// Directory service host (overrides profile)
    #[arg(long, env = "GIZWITS_API_HOST", global = true)]
    pub api_host: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GIZWITS_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "GIZWITS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Seconds to wait for relay handshakes and replies
    #[arg(long, short = 'w', default_value = "15", global = true)]
    pub wait: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List devices bound to the current user
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Stream relay events for one or more devices
    Watch(WatchArgs),

    /// Read device attributes
    Read(ReadArgs),

    /// Write attributes and/or raw data to a device
    Write(WriteArgs),

    /// Manage the sub-devices of a center-control device
    #[command(alias = "sub")]
    Subdevices(SubdevicesArgs),

    /// Bind a sub-device through an integrator endpoint
    Bind(BindArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Relay traffic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Device ids to connect (all bound devices when omitted)
    pub dids: Vec<String>,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Device id
    pub did: String,

    /// Attribute names to read (all when omitted)
    #[arg(long = "attr", short = 'a')]
    pub attrs: Vec<String>,
}

#[derive(Debug, Args)]
#[command(group(clap::ArgGroup::new("payload").required(true).multiple(true)))]
pub struct WriteArgs {
    /// Device id
    pub did: String,

    /// Attributes as a JSON object, e.g. '{"power": true}'
    #[arg(long, group = "payload")]
    pub attrs: Option<String>,

    /// Read the attributes JSON object from a file
    #[arg(long, group = "payload", conflicts_with = "attrs")]
    pub from_file: Option<PathBuf>,

    /// Raw data as hex, e.g. 0a0b0c
    #[arg(long, group = "payload")]
    pub raw: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Sub-devices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SubdevicesArgs {
    #[command(subcommand)]
    pub command: SubdevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubdevicesCommand {
    /// Fetch the sub-device list of a center-control device
    #[command(alias = "ls")]
    List {
        /// Center-control device id
        did: String,
    },

    /// Ask a center-control device to admit sub-devices
    Add {
        /// Center-control device id
        did: String,

        /// Sub-device MAC (repeatable; none admits any candidate)
        #[arg(long = "mac", short = 'm')]
        macs: Vec<String>,
    },

    /// Remove sub-devices from a center-control device
    #[command(alias = "rm")]
    Delete {
        /// Center-control device id
        did: String,

        /// Cloud ids of the sub-devices to remove
        #[arg(required = true)]
        targets: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct BindArgs {
    /// Integrator binding endpoint URL
    #[arg(long)]
    pub url: String,

    /// Device MAC
    #[arg(long)]
    pub mac: String,

    /// Product key of the device
    #[arg(long)]
    pub product_key: String,

    /// Bound device whose relay endpoint the new device shares
    #[arg(long)]
    pub parent: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Application id
        #[arg(long)]
        app_id: String,

        /// Directory service host
        #[arg(long)]
        api_host: Option<String>,

        /// Environment variable holding the open id
        #[arg(long)]
        open_id_env: Option<String>,
    },

    /// Display current configuration
    Show,

    /// Set a profile value
    Set {
        /// Profile key (app_id, api_host, open_id_env, lang, use_tls, page_limit, ...)
        key: String,

        /// Value to set
        value: String,
    },

    /// List profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store an open id in the system keyring (read from stdin)
    SetOpenId {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
