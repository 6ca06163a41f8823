use dashmap::DashMap;
use hickory_resolver::TokioAsyncResolver;
use lazy_static::lazy_static;
use std::net::IpAddr;
use tokio::sync::OnceCell;
use tracing::trace;

lazy_static! {
    // Cached per IP, including negative results: LAN hosts without PTR
    // records would otherwise be re-queried on every packet they send.
    static ref HOSTNAME_CACHE: DashMap<IpAddr, String> = DashMap::new();
}

static RESOLVER: OnceCell<Option<TokioAsyncResolver>> = OnceCell::const_new();

async fn resolver() -> &'static Option<TokioAsyncResolver> {
    RESOLVER
        .get_or_init(|| async {
            match TokioAsyncResolver::tokio_from_system_conf() {
                Ok(resolver) => Some(resolver),
                Err(err) => {
                    trace!("No system resolver available: {}", err);
                    None
                }
            }
        })
        .await
}

/// Reverse DNS for a device IP. Empty string when nothing resolves.
pub async fn reverse_hostname(ip: IpAddr) -> String {
    if let Some(hit) = HOSTNAME_CACHE.get(&ip) {
        return hit.clone();
    }

    let hostname = match resolver().await {
        Some(resolver) => match resolver.reverse_lookup(ip).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|name| name.to_utf8().trim_end_matches('.').to_string())
                .unwrap_or_default(),
            Err(err) => {
                trace!("Reverse lookup for {} failed: {}", ip, err);
                String::new()
            }
        },
        None => String::new(),
    };

    HOSTNAME_CACHE.insert(ip, hostname.clone());
    hostname
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::net::Ipv4Addr;

    #[tokio::test]
    #[serial]
    async fn test_cache_short_circuits_lookup() {
        let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 77));
        HOSTNAME_CACHE.insert(ip, "printer.lan".to_string());
        assert_eq!(reverse_hostname(ip).await, "printer.lan");
        HOSTNAME_CACHE.remove(&ip);
    }
}
