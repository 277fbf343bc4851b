//! Ordering of probe results into a resolver priority list.

use super::{probe_all, ProbeResult, ResolverSpec};
use tracing::info;

/// Orders probe results: every reachable resolver before every unreachable
/// one, ascending latency within each group, input order on ties.
pub fn rank(results: &[ProbeResult]) -> Vec<ResolverSpec> {
    sort_results(results)
        .into_iter()
        .map(|result| result.resolver.clone())
        .collect()
}

fn sort_results(results: &[ProbeResult]) -> Vec<&ProbeResult> {
    let mut ordered: Vec<&ProbeResult> = results.iter().collect();
    // `sort_by` is stable, which keeps input order for equal keys.
    ordered.sort_by(|a, b| {
        b.success
            .cmp(&a.success)
            .then_with(|| a.latency.cmp(&b.latency))
    });
    ordered
}

/// Probes all resolvers and returns them fastest-reachable first.
pub async fn select_fastest(resolvers: &[ResolverSpec]) -> Vec<ResolverSpec> {
    let results = probe_all(resolvers).await;
    let ordered = sort_results(&results);

    for (position, result) in ordered.iter().enumerate() {
        let status = if result.success {
            format!("{:?}", result.latency)
        } else {
            "failed".to_string()
        };
        info!(
            "  {}. {} ({}): {}",
            position + 1,
            result.resolver,
            result.resolver.kind,
            status
        );
    }

    let ranked: Vec<ResolverSpec> = ordered.into_iter().map(|r| r.resolver.clone()).collect();
    if let Some(head) = ranked.first() {
        info!("Selected: {}", head);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(resolver: ResolverSpec, millis: u64, success: bool) -> ProbeResult {
        ProbeResult {
            resolver,
            latency: Duration::from_millis(millis),
            success,
        }
    }

    #[test]
    fn test_successes_precede_failures() {
        let a = ResolverSpec::udp("10.0.0.1:53", 1);
        let b = ResolverSpec::dot("10.0.0.2:853", 3);
        let c = ResolverSpec::doh("https://dns.example/dns-query", 2);
        let results = vec![
            result(a.clone(), 1, false),
            result(b.clone(), 300, true),
            result(c.clone(), 0, true),
        ];

        assert_eq!(rank(&results), vec![c, b, a]);
    }

    #[test]
    fn test_failures_sorted_by_latency_too() {
        let a = ResolverSpec::udp("10.0.0.1:53", 1);
        let b = ResolverSpec::udp("10.0.0.2:53", 1);
        let results = vec![result(a.clone(), 5000, false), result(b.clone(), 20, false)];

        assert_eq!(rank(&results), vec![b, a]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let a = ResolverSpec::doh("https://a.example/dns-query", 1);
        let b = ResolverSpec::doh("https://b.example/dns-query", 2);
        let c = ResolverSpec::doh("https://c.example/dns-query", 3);
        let results = vec![
            result(a.clone(), 7, true),
            result(b.clone(), 7, true),
            result(c.clone(), 7, true),
        ];

        assert_eq!(rank(&results), vec![a, b, c]);
    }

    #[test]
    fn test_ranking_is_a_permutation() {
        let resolvers: Vec<ResolverSpec> = (0..8)
            .map(|i| ResolverSpec::udp(format!("10.0.0.{}:53", i), i))
            .collect();
        let results: Vec<ProbeResult> = resolvers
            .iter()
            .enumerate()
            .map(|(i, r)| result(r.clone(), (i as u64 * 37) % 11, i % 3 != 0))
            .collect();

        let ranked = rank(&results);

        assert_eq!(ranked.len(), resolvers.len());
        for r in &resolvers {
            assert!(ranked.contains(r));
        }

        let by_resolver = |spec: &ResolverSpec| results.iter().find(|r| &r.resolver == spec).unwrap();
        for pair in ranked.windows(2) {
            let (first, second) = (by_resolver(&pair[0]), by_resolver(&pair[1]));
            assert!(first.success >= second.success);
            if first.success == second.success {
                assert!(first.latency <= second.latency);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(rank(&[]).is_empty());
    }
}
