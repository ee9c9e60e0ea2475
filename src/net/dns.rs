// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::IpAddr, num::NonZeroUsize, str::FromStr, sync::Mutex};

use lru::LruCache;

const CACHE_CAPACITY: usize = 1024;

/// Reverse-DNS resolver with a small LRU cache. Lookups run on the blocking
/// thread pool so the single-threaded pipeline event loop never stalls on a
/// resolver round trip (spec §4.5, §5, §9 "Async DNS").
pub struct DnsResolver {
    cache: Mutex<LruCache<String, Option<String>>>,
}

impl DnsResolver {
    pub fn new() -> Self {
        DnsResolver {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Resolves `source_ip` to a hostname. Any failure — unparseable
    /// address, host unknown, transient resolver error — yields `None`
    /// rather than propagating (spec §4.5).
    pub async fn resolve(&self, source_ip: &str) -> Option<String> {
        if let Some(hit) = self.cache_get(source_ip) {
            return hit;
        }

        let ip = source_ip.to_string();
        let resolved = tokio::task::spawn_blocking(move || reverse_lookup(&ip))
            .await
            .unwrap_or(None);

        self.cache_put(source_ip.to_string(), resolved.clone());
        resolved
    }

    fn cache_get(&self, ip: &str) -> Option<Option<String>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(ip).cloned()
    }

    fn cache_put(&self, ip: String, hostname: Option<String>) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).put(ip, hostname);
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn reverse_lookup(ip: &str) -> Option<String> {
    let addr = IpAddr::from_str(ip).ok()?;
    dns_lookup::lookup_addr(&addr).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_address_resolves_to_none() {
        let resolver = DnsResolver::new();
        assert_eq!(resolver.resolve("not-an-ip").await, None);
    }

    #[tokio::test]
    async fn cache_returns_same_result_on_second_lookup() {
        let resolver = DnsResolver::new();
        let first = resolver.resolve("127.0.0.1").await;
        let second = resolver.resolve("127.0.0.1").await;
        assert_eq!(first, second);
    }
}
