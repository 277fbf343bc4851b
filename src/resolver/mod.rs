//! Resolver model, probing and ranking.
//!
//! A resolver is one DNS transport endpoint the tunnel client can be pointed
//! at. Before the client is launched the candidates can be probed
//! concurrently and ranked so the fastest reachable one is tried first.

pub mod probe;
pub mod rank;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use probe::{probe_all, probe_all_with_timeout, probe_resolver, PROBE_TIMEOUT};
pub use rank::{rank, select_fastest};

/// The DNS transport a resolver speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Plain DNS over UDP.
    Udp,
    /// DNS-over-HTTPS.
    Doh,
    /// DNS-over-TLS.
    Dot,
}

impl ResolverKind {
    /// The tunnel-client flag that selects this transport.
    pub fn client_flag(self) -> &'static str {
        match self {
            ResolverKind::Udp => "-udp",
            ResolverKind::Doh => "-doh",
            ResolverKind::Dot => "-dot",
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolverKind::Udp => "udp",
            ResolverKind::Doh => "doh",
            ResolverKind::Dot => "dot",
        };
        f.write_str(name)
    }
}

/// A single resolver endpoint.
///
/// `udp` and `dot` resolvers are addressed by `addr` (`host:port`), `doh`
/// resolvers by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResolverSpec {
    #[serde(rename = "type")]
    pub kind: ResolverKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default)]
    pub priority: i32,
}

impl ResolverSpec {
    pub fn udp(addr: impl Into<String>, priority: i32) -> Self {
        Self {
            kind: ResolverKind::Udp,
            addr: addr.into(),
            url: String::new(),
            priority,
        }
    }

    pub fn doh(url: impl Into<String>, priority: i32) -> Self {
        Self {
            kind: ResolverKind::Doh,
            addr: String::new(),
            url: url.into(),
            priority,
        }
    }

    pub fn dot(addr: impl Into<String>, priority: i32) -> Self {
        Self {
            kind: ResolverKind::Dot,
            addr: addr.into(),
            url: String::new(),
            priority,
        }
    }

    /// The address or URL handed to the tunnel client for this resolver.
    pub fn endpoint(&self) -> &str {
        match self.kind {
            ResolverKind::Udp | ResolverKind::Dot => &self.addr,
            ResolverKind::Doh => &self.url,
        }
    }
}

impl fmt::Display for ResolverSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Outcome of probing one resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub resolver: ResolverSpec,
    pub latency: Duration,
    pub success: bool,
}
