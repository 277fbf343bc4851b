use dnstt_helper::resolver::{probe_all_with_timeout, rank, ResolverSpec};
use dnstt_helper::supervisor::test_utils::{FakeLauncher, FakeOutcome};
use dnstt_helper::{App, RunConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_unreachable_resolver_ranks_last() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let reachable = ResolverSpec::dot(listener.local_addr().unwrap().to_string(), 1);
    let unreachable = ResolverSpec::dot(closed_port().await, 2);
    let doh = ResolverSpec::doh("https://dns.example/dns-query", 3);

    let resolvers = vec![unreachable.clone(), reachable.clone(), doh.clone()];
    let results = probe_all_with_timeout(&resolvers, Duration::from_secs(2)).await;
    let ranked = rank(&results);

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[2], unreachable);
    assert!(ranked[..2].contains(&reachable));
    assert!(ranked[..2].contains(&doh));
}

#[tokio::test]
async fn test_auto_select_moves_reachable_resolver_first() {
    let unreachable = ResolverSpec::dot(closed_port().await, 1);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let reachable = ResolverSpec::dot(listener.local_addr().unwrap().to_string(), 2);

    let config = RunConfig {
        domain: "t.example.com".into(),
        local_addr: "127.0.0.1:7000".into(),
        pubkey: Some("abcd".into()),
        resolvers: vec![unreachable.clone(), reachable.clone()],
        ..Default::default()
    };
    let launcher = Arc::new(FakeLauncher::new());
    launcher.push(FakeOutcome::Success);

    let finished = App::builder(config)
        .auto_select(true)
        .launcher_override(launcher.clone())
        .skip_signal_relay(true)
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(finished.resolvers, vec![reachable.clone(), unreachable]);
    assert_eq!(launcher.calls()[0][1], reachable.addr);
    assert_eq!(finished.mtu, "1400");
}

#[tokio::test]
async fn test_single_resolver_is_not_probed() {
    // With one resolver there is nothing to rank; even an unreachable one is kept.
    let unreachable = ResolverSpec::udp("not an address", 1);
    let config = RunConfig {
        domain: "t.example.com".into(),
        local_addr: "127.0.0.1:7000".into(),
        pubkey: Some("abcd".into()),
        resolvers: vec![unreachable.clone()],
        ..Default::default()
    };
    let launcher = Arc::new(FakeLauncher::new());
    launcher.push(FakeOutcome::Success);

    let finished = App::builder(config)
        .auto_select(true)
        .launcher_override(launcher.clone())
        .skip_signal_relay(true)
        .build()
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(finished.resolvers, vec![unreachable]);
}
