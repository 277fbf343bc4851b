//! dnstt-helper - resolver selection and supervision for dnstt-client
//!
//! This library picks the resolver and MTU a DNS tunnel client should use and
//! keeps the client running: it probes and ranks candidate resolvers, derives
//! an MTU for the preferred one and restarts the client with failover when it
//! exits with an error.
pub mod app;
pub mod cli;
pub mod config;
pub mod mtu;
pub mod resolver;
pub mod supervisor;
pub mod task_group;

pub use app::{App, AppBuilder};
pub use config::{ConfigError, RunConfig};
pub use resolver::{ProbeResult, ResolverKind, ResolverSpec};

/// Version reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
