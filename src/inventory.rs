//! Maps a pool's configured IPs and the cluster's nodes onto provider objects.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::provider::{FloatingIp, FloatingIpProvider, Server};

/// Looks up the provider floating IP of every configured literal, in the
/// configured order. Fails if any literal is not an address or has no match.
pub async fn resolve_floating_ips(
    provider: &dyn FloatingIpProvider,
    literals: &[String],
) -> Result<Vec<FloatingIp>> {
    let wanted = literals
        .iter()
        .map(|literal| {
            literal
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| Error::InvalidIp(literal.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let fips = provider.list_floating_ips().await?;

    wanted
        .iter()
        .map(|ip| {
            fips.iter()
                .find(|fip| fip.ip.to_canonical() == ip.to_canonical())
                .cloned()
                .ok_or_else(|| Error::UnresolvedIp(ip.to_string()))
        })
        .collect()
}

/// Every provider server, indexed by id and by name for one pass.
#[derive(Debug, Default)]
pub struct ServerIndex {
    by_id: HashMap<i64, Server>,
    by_name: HashMap<String, Server>,
}

impl ServerIndex {
    pub fn new(servers: Vec<Server>) -> Self {
        let mut index = Self::default();
        for server in servers {
            index.by_name.insert(server.name.clone(), server.clone());
            index.by_id.insert(server.id, server);
        }
        index
    }

    pub async fn fetch(provider: &dyn FloatingIpProvider) -> Result<Self> {
        Ok(Self::new(provider.list_servers().await?))
    }

    pub fn by_id(&self, id: i64) -> Option<&Server> {
        self.by_id.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Server> {
        self.by_name.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fip, server, MockProvider};

    fn literals(ips: &[&str]) -> Vec<String> {
        ips.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn resolves_in_configured_order() {
        let provider = MockProvider::new(
            vec![
                fip(1, "10.0.0.1", None),
                fip(2, "10.0.0.2", Some(7)),
                fip(3, "10.0.0.3", None),
            ],
            vec![],
        );
        let resolved = resolve_floating_ips(&provider, &literals(&["10.0.0.3", "10.0.0.1"]))
            .await
            .unwrap();
        let ids: Vec<_> = resolved.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn compares_canonical_addresses() {
        let provider = MockProvider::new(vec![fip(1, "2001:db8::1", None)], vec![]);
        let resolved = resolve_floating_ips(&provider, &literals(&["2001:0db8:0:0::1"]))
            .await
            .unwrap();
        assert_eq!(resolved[0].id, 1);
    }

    #[tokio::test]
    async fn ipv4_mapped_literals_match_ipv4_addresses() {
        let provider = MockProvider::new(
            vec![fip(1, "10.0.0.1", None), fip(2, "::ffff:10.0.0.2", None)],
            vec![],
        );
        let resolved =
            resolve_floating_ips(&provider, &literals(&["::ffff:10.0.0.1", "10.0.0.2"]))
                .await
                .unwrap();
        let ids: Vec<_> = resolved.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn unmatched_literal_fails_the_whole_lookup() {
        let provider = MockProvider::new(vec![fip(1, "10.0.0.1", None)], vec![]);
        let err = resolve_floating_ips(&provider, &literals(&["10.0.0.1", "10.0.0.9"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvedIp(ip) if ip == "10.0.0.9"));
    }

    #[tokio::test]
    async fn unparsable_literal_fails_before_listing() {
        let provider = MockProvider::new(vec![fip(1, "10.0.0.1", None)], vec![]);
        let err = resolve_floating_ips(&provider, &literals(&["10.0.0.1", "ten"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIp(ip) if ip == "ten"));
        assert_eq!(provider.floating_ip_listings(), 0);
    }

    #[test]
    fn indexes_servers_both_ways() {
        let index = ServerIndex::new(vec![server(1, "a"), server(2, "b")]);
        assert_eq!(index.by_id(2).map(|s| s.name.as_str()), Some("b"));
        assert_eq!(index.by_name("a").map(|s| s.id), Some(1));
        assert!(index.by_id(3).is_none());
        assert!(index.by_name("c").is_none());
    }
}
