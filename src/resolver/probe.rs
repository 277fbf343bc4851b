//! Reachability probes for candidate resolvers.
//!
//! A probe is a single connection attempt, not a DNS query: `udp` resolvers
//! get a connected UDP socket, `dot` resolvers a TCP handshake. `doh`
//! resolvers are reported reachable without any network traffic; there is no
//! HTTP round trip behind that result.

use super::{ProbeResult, ResolverKind, ResolverSpec};
use crate::task_group::TaskGroup;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Hard limit for a single connection attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes a single resolver once.
pub async fn probe_resolver(resolver: &ResolverSpec, limit: Duration) -> ProbeResult {
    let start = Instant::now();
    let outcome = match resolver.kind {
        ResolverKind::Udp => dial_udp(&resolver.addr, limit).await,
        ResolverKind::Dot => dial_tcp(&resolver.addr, limit).await,
        ResolverKind::Doh => Ok(()),
    };
    let latency = start.elapsed();

    let kind = resolver.kind.to_string();
    metrics::histogram!("resolver_probe_duration_seconds", "kind" => kind.clone())
        .record(latency.as_secs_f64());

    match &outcome {
        Ok(()) => debug!(resolver = %resolver, kind = %kind, ?latency, "Probe succeeded"),
        Err(e) => {
            metrics::counter!("resolver_probe_failures_total", "kind" => kind.clone()).increment(1);
            debug!(resolver = %resolver, kind = %kind, error = %e, "Probe failed");
        }
    }

    ProbeResult {
        resolver: resolver.clone(),
        latency,
        success: outcome.is_ok(),
    }
}

/// Probes every resolver concurrently with the default [`PROBE_TIMEOUT`].
pub async fn probe_all(resolvers: &[ResolverSpec]) -> Vec<ProbeResult> {
    probe_all_with_timeout(resolvers, PROBE_TIMEOUT).await
}

/// Probes every resolver concurrently, one task each, and returns once all of
/// them have finished.
///
/// Results come back in input order regardless of completion order, one per
/// input. A probe task that panics is reported as a failure at `limit`.
pub async fn probe_all_with_timeout(resolvers: &[ResolverSpec], limit: Duration) -> Vec<ProbeResult> {
    let collected: Arc<Mutex<Vec<(usize, ProbeResult)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(resolvers.len())));
    let group = TaskGroup::new();

    for (index, resolver) in resolvers.iter().cloned().enumerate() {
        let collected = Arc::clone(&collected);
        group.spawn("ResolverProbe", async move {
            let result = probe_resolver(&resolver, limit).await;
            collected
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((index, result));
        });
    }

    group.join_all().await;

    let finished = std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner));
    let mut slots: Vec<Option<ProbeResult>> = vec![None; resolvers.len()];
    for (index, result) in finished {
        slots[index] = Some(result);
    }
    slots
        .into_iter()
        .zip(resolvers)
        .map(|(slot, resolver)| slot.unwrap_or_else(|| missing_result(resolver, limit)))
        .collect()
}

fn missing_result(resolver: &ResolverSpec, limit: Duration) -> ProbeResult {
    warn!(resolver = %resolver, "Probe produced no result, counting it as failed");
    ProbeResult {
        resolver: resolver.clone(),
        latency: limit,
        success: false,
    }
}

async fn dial_udp(addr: &str, limit: Duration) -> io::Result<()> {
    let attempt = async {
        let target = lookup_host(addr)
            .await?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;
        let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await
    };
    timeout(limit, attempt).await.map_err(timed_out)?
}

async fn dial_tcp(addr: &str, limit: Duration) -> io::Result<()> {
    let stream = timeout(limit, TcpStream::connect(addr)).await.map_err(timed_out)??;
    drop(stream);
    Ok(())
}

fn timed_out(_: tokio::time::error::Elapsed) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "probe timed out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_doh_probe_always_succeeds() {
        let resolver = ResolverSpec::doh("https://unreachable.invalid/dns-query", 2);
        let result = probe_resolver(&resolver, PROBE_TIMEOUT).await;
        assert!(result.success);
        assert!(result.latency < Duration::from_millis(50));
        assert_eq!(result.resolver, resolver);
    }

    #[tokio::test]
    async fn test_dot_probe_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = probe_resolver(&ResolverSpec::dot(addr.to_string(), 3), PROBE_TIMEOUT).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_dot_probe_fails_on_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = probe_resolver(&ResolverSpec::dot(addr.to_string(), 3), PROBE_TIMEOUT).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_udp_probe_connects_socket() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let result = probe_resolver(&ResolverSpec::udp(addr.to_string(), 1), PROBE_TIMEOUT).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_malformed_address_fails() {
        let result = probe_resolver(&ResolverSpec::udp("not an address", 1), PROBE_TIMEOUT).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        // TEST-NET-1 addresses never answer; each probe either times out or
        // fails at once.
        let resolvers: Vec<_> = (1..=4)
            .map(|i| ResolverSpec::dot(format!("192.0.2.{}:853", i), i))
            .collect();
        let limit = Duration::from_millis(500);

        let start = std::time::Instant::now();
        let results = probe_all_with_timeout(&resolvers, limit).await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| !r.success));
        assert!(elapsed < limit * 2, "probes took {:?}", elapsed);
    }

    #[test]
    fn test_missing_result_is_a_failure_at_the_limit() {
        let resolver = ResolverSpec::udp("10.0.0.1:53", 1);
        let result = missing_result(&resolver, PROBE_TIMEOUT);
        assert_eq!(result.resolver, resolver);
        assert!(!result.success);
        assert_eq!(result.latency, PROBE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_probe_all_keeps_input_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().to_string();
        let resolvers = vec![
            ResolverSpec::udp("not an address", 1),
            ResolverSpec::doh("https://dns.example/dns-query", 2),
            ResolverSpec::dot(open, 3),
        ];

        let results = probe_all(&resolvers).await;

        assert_eq!(results.len(), 3);
        let probed: Vec<_> = results.iter().map(|r| r.resolver.clone()).collect();
        assert_eq!(probed, resolvers);
        assert_eq!(
            results.iter().map(|r| r.success).collect::<Vec<_>>(),
            vec![false, true, true]
        );
    }
}
