//! Command line for the tunnel client.

use crate::config::{KeySource, RunConfig};
use crate::mtu::MTU_AUTO;

/// Builds the tunnel-client arguments for the current head resolver:
/// resolver flag and value, key flag and value, optional `-mtu`, then the
/// domain and local address as positionals.
pub fn build_client_args(config: &RunConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(resolver) = config.primary_resolver() {
        args.push(resolver.kind.client_flag().to_string());
        args.push(resolver.endpoint().to_string());
    }

    match config.key_source() {
        Some(KeySource::Inline(key)) => {
            args.push("-pubkey".to_string());
            args.push(key.to_string());
        }
        Some(KeySource::File(path)) => {
            args.push("-pubkey-file".to_string());
            args.push(path.display().to_string());
        }
        None => {}
    }

    if !config.mtu.is_empty() && config.mtu != MTU_AUTO {
        args.push("-mtu".to_string());
        args.push(config.mtu.clone());
    }

    args.push(config.domain.clone());
    args.push(config.local_addr.clone());
    args
}

/// Moves the current head resolver to the back of the list.
pub fn rotate_resolvers<T>(resolvers: &mut [T]) {
    if resolvers.len() > 1 {
        resolvers.rotate_left(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverSpec;
    use std::path::PathBuf;

    fn config() -> RunConfig {
        RunConfig {
            domain: "t.example.com".into(),
            local_addr: "127.0.0.1:7000".into(),
            pubkey_file: Some(PathBuf::from("server.pub")),
            resolvers: vec![
                ResolverSpec::doh("https://dns.google/dns-query", 2),
                ResolverSpec::udp("8.8.8.8:53", 1),
            ],
            mtu: "1400".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_argument_order() {
        assert_eq!(
            build_client_args(&config()),
            vec![
                "-doh",
                "https://dns.google/dns-query",
                "-pubkey-file",
                "server.pub",
                "-mtu",
                "1400",
                "t.example.com",
                "127.0.0.1:7000",
            ]
        );
    }

    #[test]
    fn test_auto_mtu_is_not_passed() {
        let mut config = config();
        config.mtu = MTU_AUTO.into();
        assert!(!build_client_args(&config).contains(&"-mtu".to_string()));

        config.mtu.clear();
        assert!(!build_client_args(&config).contains(&"-mtu".to_string()));
    }

    #[test]
    fn test_inline_key_preferred() {
        let mut config = config();
        config.pubkey = Some("abcd".into());
        let args = build_client_args(&config);
        assert_eq!(&args[2..4], ["-pubkey", "abcd"]);
        assert!(!args.contains(&"-pubkey-file".to_string()));
    }

    #[test]
    fn test_rotation() {
        let mut order = vec!['A', 'B', 'C'];
        rotate_resolvers(&mut order);
        assert_eq!(order, vec!['B', 'C', 'A']);

        for n in 2..=7 {
            rotate_resolvers(&mut order);
            let mut expected = vec!['A', 'B', 'C'];
            expected.rotate_left(n % 3);
            assert_eq!(order, expected, "after {} rotations", n);
        }
    }

    #[test]
    fn test_single_resolver_rotation_is_noop() {
        let mut order = vec!['A'];
        rotate_resolvers(&mut order);
        assert_eq!(order, vec!['A']);
    }
}
