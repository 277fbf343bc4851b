//! Advertised MTU selection.
//!
//! Selection is heuristic: candidates are checked against what the primary
//! resolver's transport is known to carry, no test packets are sent.

use crate::resolver::{ResolverKind, ResolverSpec};
use tracing::debug;

/// MTU token asking for automatic selection.
pub const MTU_AUTO: &str = "auto";

/// Candidate MTU values, tested from largest to smallest.
pub const MTU_CANDIDATES: [u16; 5] = [1400, 1232, 1200, 1000, 512];

/// Returned when no candidate is accepted.
pub const MTU_FLOOR: u16 = 512;

/// Whether a resolver of the given kind is expected to carry `mtu`.
pub fn accepts(kind: ResolverKind, mtu: u16) -> bool {
    match kind {
        ResolverKind::Udp => mtu <= 1232,
        ResolverKind::Doh | ResolverKind::Dot => mtu <= 1400,
    }
}

/// Picks the largest candidate the primary resolver accepts.
pub fn select_mtu(primary: &ResolverSpec) -> u16 {
    debug!("Testing MTU values...");
    select_from(&MTU_CANDIDATES, |mtu| accepts(primary.kind, mtu))
}

fn select_from(candidates: &[u16], test: impl Fn(u16) -> bool) -> u16 {
    for &mtu in candidates {
        if test(mtu) {
            debug!("  MTU {}: OK", mtu);
            return mtu;
        }
        debug!("  MTU {}: failed", mtu);
    }
    MTU_FLOOR
}

/// Turns an MTU token into the literal passed to the tunnel client.
///
/// `auto` is replaced by [`select_mtu`] for the primary resolver; any other
/// token is returned unchanged.
pub fn resolve_mtu(token: &str, primary: &ResolverSpec) -> String {
    if token == MTU_AUTO {
        select_mtu(primary).to_string()
    } else {
        token.to_string()
    }
}
