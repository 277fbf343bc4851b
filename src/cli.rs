//! Command-line argument parsing.
//!
//! The flags describe a single run directly. `--config` is the alternative
//! entry point and cannot be combined with the resolver, key, MTU or
//! positional arguments.

use clap::Parser;
use std::path::PathBuf;

/// Launcher and supervisor for dnstt-client.
#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "dnstt-helper",
    disable_version_flag = true,
    after_help = "Examples:\n  \
        dnstt-helper --udp 8.8.8.8:53 --pubkey-file server.pub t.example.com 127.0.0.1:7000\n  \
        dnstt-helper --config config.json\n  \
        dnstt-helper --auto-select --config config.json"
)]
pub struct Cli {
    /// Configuration file (JSON or YAML).
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with_all = ["udp", "doh", "dot", "pubkey", "pubkey_file", "mtu", "domain", "local_addr"]
    )]
    pub config: Option<PathBuf>,

    /// UDP DNS resolver address.
    #[arg(long, value_name = "ADDR")]
    pub udp: Option<String>,

    /// DNS-over-HTTPS resolver URL.
    #[arg(long, value_name = "URL")]
    pub doh: Option<String>,

    /// DNS-over-TLS resolver address.
    #[arg(long, value_name = "ADDR")]
    pub dot: Option<String>,

    /// Server public key.
    #[arg(long, value_name = "KEY")]
    pub pubkey: Option<String>,

    /// Server public key file.
    #[arg(long, value_name = "FILE")]
    pub pubkey_file: Option<PathBuf>,

    /// MTU size ("auto" or numeric) [default: auto]
    #[arg(long, value_name = "MTU")]
    pub mtu: Option<String>,

    /// Auto-select the fastest resolver.
    #[arg(long)]
    pub auto_select: bool,

    /// Path to the dnstt-client executable.
    #[arg(long, value_name = "PATH")]
    pub client: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Show version.
    #[arg(short = 'V', long)]
    pub version: bool,

    /// Tunnel domain.
    #[arg(value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Local address to listen on.
    #[arg(value_name = "LOCAL_ADDR")]
    pub local_addr: Option<String>,
}
