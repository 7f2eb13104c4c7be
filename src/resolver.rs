// src/resolver.rs
use crate::types::{Config, IpBinding, ResolutionMode, ResolverConfig, WpFinderError};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Maps a domain to its candidate IP addresses. An empty list means the
/// domain has no candidates, whatever the reason.
#[async_trait]
pub trait IpResolver: Send + Sync {
    fn name(&self) -> &str;
    async fn resolve(&self, domain: &str) -> Vec<String>;
}

/// Builds the resolver selected by the configuration.
pub fn create_resolver(
    config: &Config,
    bindings: Vec<IpBinding>,
) -> Result<Arc<dyn IpResolver>, WpFinderError> {
    match config.resolution {
        ResolutionMode::Dns => Ok(Arc::new(DnsResolver::new(&config.resolver)?)),
        ResolutionMode::Table => Ok(Arc::new(TableResolver::new(bindings))),
    }
}

/// Live DNS lookups.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, WpFinderError> {
        let (resolver_config, mut opts) = if config.use_system_resolver {
            trust_dns_resolver::system_conf::read_system_conf()
                .map_err(|e| WpFinderError::ResolutionError(format!("Failed to read system resolver configuration: {}", e)))?
        } else {
            let mut resolver_config = DnsResolverConfig::new();

            for ns in &config.nameservers {
                let socket_addr = SocketAddr::from_str(ns)
                    .map_err(|e| WpFinderError::ConfigError(format!("Invalid nameserver address {}: {}", ns, e)))?;
                resolver_config.add_name_server(NameServerConfig {
                    socket_addr,
                    protocol: Protocol::Udp,
                    tls_dns_name: None,
                    trust_negative_responses: false,
                    bind_addr: None,
                });
            }

            (resolver_config, ResolverOpts::default())
        };

        opts.timeout = config.timeout;
        opts.attempts = 2;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

#[async_trait]
impl IpResolver for DnsResolver {
    fn name(&self) -> &str {
        "dns"
    }

    async fn resolve(&self, domain: &str) -> Vec<String> {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => lookup.iter().map(|ip| ip.to_string()).collect(),
            Err(e) => {
                debug!("DNS lookup failed for {}: {}", domain, e);
                Vec::new()
            }
        }
    }
}

/// Lookups against the precomputed domain/IP table. Fronted bindings are
/// dropped when the table is built and can never be returned.
pub struct TableResolver {
    table: HashMap<String, Vec<String>>,
}

impl TableResolver {
    pub fn new(bindings: Vec<IpBinding>) -> Self {
        let mut table: HashMap<String, Vec<String>> = HashMap::new();
        let mut fronted = 0;

        for binding in bindings {
            if binding.fronted {
                fronted += 1;
                continue;
            }
            table.entry(binding.domain).or_default().push(binding.ip);
        }

        debug!("Resolution table holds {} domains, {} fronted bindings excluded", table.len(), fronted);
        Self { table }
    }
}

#[async_trait]
impl IpResolver for TableResolver {
    fn name(&self) -> &str {
        "table"
    }

    async fn resolve(&self, domain: &str) -> Vec<String> {
        self.table.get(domain).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn binding(domain: &str, ip: &str, fronted: bool) -> IpBinding {
        IpBinding {
            domain: domain.to_string(),
            ip: ip.to_string(),
            fronted,
        }
    }

    #[tokio::test]
    async fn test_table_excludes_fronted() {
        let resolver = TableResolver::new(vec![
            binding("a.x.com", "10.0.0.1", false),
            binding("a.x.com", "10.0.0.2", true),
        ]);

        assert_eq!(resolver.resolve("a.x.com").await, vec!["10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_table_preserves_input_order() {
        let resolver = TableResolver::new(vec![
            binding("d.com", "3.3.3.3", false),
            binding("e.com", "9.9.9.9", false),
            binding("d.com", "1.1.1.1", false),
            binding("d.com", "2.2.2.2", false),
        ]);

        assert_eq!(resolver.resolve("d.com").await, vec!["3.3.3.3", "1.1.1.1", "2.2.2.2"]);
    }

    #[tokio::test]
    async fn test_table_exact_match_only() {
        let resolver = TableResolver::new(vec![binding("a.x.com", "10.0.0.1", false)]);

        assert!(resolver.resolve("A.x.com").await.is_empty());
        assert!(resolver.resolve("x.com").await.is_empty());
    }

    #[tokio::test]
    async fn test_only_fronted_yields_nothing() {
        let resolver = TableResolver::new(vec![binding("cdn.com", "104.16.0.1", true)]);
        assert!(resolver.resolve("cdn.com").await.is_empty());
    }

    #[tokio::test]
    async fn test_dns_resolver_rejects_bad_nameserver() {
        let config = ResolverConfig {
            nameservers: vec!["nope".to_string()],
            use_system_resolver: false,
            ..ResolverConfig::default()
        };
        assert!(DnsResolver::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_dns_resolver_ip_literal() {
        let config = ResolverConfig {
            use_system_resolver: false,
            ..ResolverConfig::default()
        };
        let resolver = DnsResolver::new(&config).unwrap();
        assert_eq!(resolver.resolve("127.0.0.1").await, vec!["127.0.0.1"]);
    }

    #[tokio::test]
    async fn test_dns_failure_yields_no_candidates() {
        let config = ResolverConfig {
            timeout: Duration::from_millis(500),
            nameservers: vec!["127.0.0.1:1".to_string()],
            use_system_resolver: false,
        };
        let resolver = DnsResolver::new(&config).unwrap();

        assert!(resolver.resolve("nothing.invalid").await.is_empty());
        assert!(resolver.resolve("wp.example.com").await.is_empty());
    }
}
