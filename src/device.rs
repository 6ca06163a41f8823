use crate::oui;
use crate::packet::PacketMeta;
use crate::resolver;
use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// One discovered LAN device, keyed by MAC. Field layout mirrors the
/// `devices` table and the JSON served by `/api/devices`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    pub vendor: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub os_guess: String,
}

/// Coarse OS fingerprint from the observed IP TTL.
pub fn os_guess_from_ttl(ttl: u8) -> &'static str {
    if ttl >= 128 {
        "Windows"
    } else if ttl >= 64 {
        "Linux/Unix"
    } else {
        "Unknown"
    }
}

pub struct DeviceInventory {
    devices: HashMap<MacAddr6, DeviceInfo>,
    oui_lookup_url: String,
    http: reqwest::Client,
}

impl DeviceInventory {
    pub fn new(oui_lookup_url: &str) -> Self {
        Self {
            devices: HashMap::new(),
            oui_lookup_url: oui_lookup_url.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Learn from one packet: ARP supplies the sender pair, otherwise the
    /// Ethernet source MAC plus the IPv4 source. Packets carrying neither
    /// teach us nothing.
    pub async fn learn(&mut self, meta: &PacketMeta, now: i64) -> Option<DeviceInfo> {
        let (mac, ip) = if let Some(arp) = &meta.arp {
            (arp.sender_mac, IpAddr::V4(arp.sender_ip))
        } else if let (Some(mac), Some(ipv4)) = (meta.src_mac, &meta.ipv4) {
            (mac, IpAddr::V4(ipv4.src))
        } else {
            return None;
        };

        let vendor = oui::vendor_for_mac(&self.http, &self.oui_lookup_url, &mac).await;
        let hostname = resolver::reverse_hostname(ip).await;
        let os_guess = meta
            .ipv4
            .as_ref()
            .map(|ipv4| os_guess_from_ttl(ipv4.ttl).to_string())
            .unwrap_or_default();

        Some(self.observe(mac, ip.to_string(), vendor, hostname, os_guess, now))
    }

    /// Merge one observation into the inventory. New non-empty fields win,
    /// empty ones keep what was known; `first_seen` is never rewritten.
    pub fn observe(
        &mut self,
        mac: MacAddr6,
        ip: String,
        vendor: String,
        hostname: String,
        os_guess: String,
        now: i64,
    ) -> DeviceInfo {
        let existing = self.devices.get(&mac);
        let profile = DeviceInfo {
            mac: mac.to_string().to_lowercase(),
            ip,
            hostname: pick(hostname, existing.map(|d| d.hostname.clone())),
            vendor: pick(vendor, existing.map(|d| d.vendor.clone())),
            first_seen: existing.map(|d| d.first_seen).unwrap_or(now),
            last_seen: now,
            os_guess: pick(os_guess, existing.map(|d| d.os_guess.clone())),
        };
        self.devices.insert(mac, profile.clone());
        profile
    }

    /// Everything seen so far, in stable MAC order.
    pub fn active_devices(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<DeviceInfo> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.mac.cmp(&b.mac));
        devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn pick(new: String, existing: Option<String>) -> String {
    if new.is_empty() {
        existing.unwrap_or_default()
    } else {
        new
    }
}
