use dashmap::DashMap;
use lazy_static::lazy_static;
use macaddr::MacAddr6;
use std::time::Duration;
use tracing::trace;

pub const UNKNOWN_VENDOR: &str = "Unknown";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

lazy_static! {
    // Successful lookups only; failures stay retryable.
    static ref VENDOR_CACHE: DashMap<String, String> = DashMap::new();
}

/// Uppercase hex without separators, the form the OUI API expects.
pub fn normalize_mac(mac: &MacAddr6) -> String {
    mac.to_string().replace([':', '-'], "").to_uppercase()
}

/// Best effort MAC OUI lookup (cached). Any network failure or non-2xx
/// answer resolves to "Unknown".
pub async fn vendor_for_mac(
    client: &reqwest::Client,
    lookup_url: &str,
    mac: &MacAddr6,
) -> String {
    let key = normalize_mac(mac);
    if let Some(hit) = VENDOR_CACHE.get(&key) {
        return hit.clone();
    }

    let url = format!("{}{}", lookup_url, key);
    let response = match client.get(&url).timeout(LOOKUP_TIMEOUT).send().await {
        Ok(response) => response,
        Err(err) => {
            trace!("OUI lookup for {} failed: {}", key, err);
            return UNKNOWN_VENDOR.to_string();
        }
    };
    if !response.status().is_success() {
        trace!("OUI lookup for {} returned {}", key, response.status());
        return UNKNOWN_VENDOR.to_string();
    }
    match response.text().await {
        Ok(text) => {
            let vendor = text.trim().to_string();
            VENDOR_CACHE.insert(key, vendor.clone());
            vendor
        }
        Err(err) => {
            trace!("OUI lookup for {} body read failed: {}", key, err);
            UNKNOWN_VENDOR.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn test_mac() -> MacAddr6 {
        MacAddr6::new(0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E)
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac(&test_mac()), "001A2B3C4D5E");
    }

    #[tokio::test]
    #[serial]
    async fn test_cache_hit_skips_network() {
        let mac = test_mac();
        VENDOR_CACHE.insert(normalize_mac(&mac), "Acme Corp".to_string());

        // Unroutable lookup URL: a cache miss would fail over to "Unknown"
        let client = reqwest::Client::new();
        let vendor = vendor_for_mac(&client, "http://127.0.0.1:1/", &mac).await;
        assert_eq!(vendor, "Acme Corp");

        VENDOR_CACHE.remove(&normalize_mac(&mac));
    }

    #[tokio::test]
    #[serial]
    async fn test_unreachable_lookup_is_unknown() {
        let mac = MacAddr6::new(0xde, 0xad, 0xbe, 0xef, 0x00, 0x01);
        let client = reqwest::Client::new();
        let vendor = vendor_for_mac(&client, "http://127.0.0.1:1/", &mac).await;
        assert_eq!(vendor, UNKNOWN_VENDOR);
    }
}
