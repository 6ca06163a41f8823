use crate::packet::{PacketMeta, DHCP_OFFER};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::Ipv4Addr;

pub const BURST_DEDUP_SECS: i64 = 10;
pub const ARP_SPOOF_DEDUP_SECS: i64 = 180;
pub const MAC_CLONE_DEDUP_SECS: i64 = 300;
pub const ROGUE_DHCP_DEDUP_SECS: i64 = 300;

// A MAC legitimately holds a handful of addresses (v4 + link local);
// beyond this many distinct IPv4 sources it looks cloned.
pub const MAC_CLONE_IP_LIMIT: usize = 3;

/// One detected anomaly. `id` is assigned by the database and absent on
/// live push alerts; the serialized field names are the wire contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnomalyRecord {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub desc: String,
}

impl AnomalyRecord {
    pub fn new(ts: i64, kind: &str, desc: String) -> Self {
        Self {
            id: None,
            ts,
            kind: kind.to_string(),
            desc,
        }
    }
}

/// Stateful detectors over the packet stream. At most one anomaly is
/// reported per packet, in fixed priority order: burst, ARP spoof,
/// MAC clone, rogue DHCP.
pub struct AnomalyEngine {
    burst_threshold: usize,
    trusted_dhcp_servers: HashSet<String>,
    burst_window: Vec<i64>,
    arp_watcher: HashMap<Ipv4Addr, BTreeSet<String>>,
    mac_ips: HashMap<String, BTreeSet<Ipv4Addr>>,
    last_alerts: HashMap<String, i64>,
}

impl AnomalyEngine {
    pub fn new(burst_threshold: usize, trusted_dhcp_servers: &[String]) -> Self {
        Self {
            burst_threshold,
            trusted_dhcp_servers: trusted_dhcp_servers
                .iter()
                .map(|mac| mac.to_lowercase())
                .collect(),
            burst_window: Vec::new(),
            arp_watcher: HashMap::new(),
            mac_ips: HashMap::new(),
            last_alerts: HashMap::new(),
        }
    }

    pub fn check_packet(&mut self, meta: &PacketMeta, ts: i64) -> Option<AnomalyRecord> {
        if let Some(alert) = self.check_burst(ts) {
            return Some(alert);
        }
        if let Some(alert) = self.check_arp_spoof(meta, ts) {
            return Some(alert);
        }
        if let Some(alert) = self.check_mac_clone(meta, ts) {
            return Some(alert);
        }
        self.check_rogue_dhcp(meta, ts)
    }

    fn check_burst(&mut self, ts: i64) -> Option<AnomalyRecord> {
        self.burst_window.push(ts);
        self.burst_window.retain(|t| ts - t < 1);
        if self.burst_window.len() <= self.burst_threshold {
            return None;
        }
        if self.recently_alerted("burst", BURST_DEDUP_SECS, ts) {
            return None;
        }
        self.last_alerts.insert("burst".to_string(), ts);
        Some(AnomalyRecord::new(
            ts,
            "burst",
            format!("Traffic burst: {} pkts/sec", self.burst_window.len()),
        ))
    }

    fn check_arp_spoof(&mut self, meta: &PacketMeta, ts: i64) -> Option<AnomalyRecord> {
        let arp = meta.arp.as_ref()?;
        let mac = arp.sender_mac.to_string().to_lowercase();
        let claimants = self.arp_watcher.entry(arp.sender_ip).or_default();
        claimants.insert(mac);
        if claimants.len() <= 1 {
            return None;
        }
        let key = format!("arp_{}", arp.sender_ip);
        if self.recently_alerted(&key, ARP_SPOOF_DEDUP_SECS, ts) {
            return None;
        }
        let macs = self.arp_watcher[&arp.sender_ip]
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        self.last_alerts.insert(key, ts);
        Some(AnomalyRecord::new(
            ts,
            "arp_spoof",
            format!("Multiple MACs ({}) detected for IP {}", macs, arp.sender_ip),
        ))
    }

    fn check_mac_clone(&mut self, meta: &PacketMeta, ts: i64) -> Option<AnomalyRecord> {
        let ipv4 = meta.ipv4.as_ref()?;
        let mac = meta.src_mac?.to_string().to_lowercase();
        let ips = self.mac_ips.entry(mac.clone()).or_default();
        ips.insert(ipv4.src);
        if ips.len() <= MAC_CLONE_IP_LIMIT {
            return None;
        }
        let key = format!("mac_{}", mac);
        if self.recently_alerted(&key, MAC_CLONE_DEDUP_SECS, ts) {
            return None;
        }
        let ips = self.mac_ips[&mac]
            .iter()
            .map(|ip| ip.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.last_alerts.insert(key, ts);
        Some(AnomalyRecord::new(
            ts,
            "mac_clone",
            format!("MAC {} used by multiple IPs: {}", mac, ips),
        ))
    }

    fn check_rogue_dhcp(&mut self, meta: &PacketMeta, ts: i64) -> Option<AnomalyRecord> {
        if meta.dhcp_message_type != Some(DHCP_OFFER) {
            return None;
        }
        let mac = meta.src_mac?.to_string().to_lowercase();
        if self.trusted_dhcp_servers.contains(&mac) {
            return None;
        }
        let key = format!("rogue_{}", mac);
        if self.recently_alerted(&key, ROGUE_DHCP_DEDUP_SECS, ts) {
            return None;
        }
        self.last_alerts.insert(key, ts);
        Some(AnomalyRecord::new(
            ts,
            "rogue_dhcp",
            format!("Rogue DHCP OFFER from MAC {}", mac),
        ))
    }

    fn recently_alerted(&self, key: &str, interval: i64, now: i64) -> bool {
        match self.last_alerts.get(key) {
            Some(last) => now - last < interval,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ArpMeta, Ipv4Meta};
    use macaddr::MacAddr6;

    fn mac(last: u8) -> MacAddr6 {
        MacAddr6::new(0xaa, 0xbb, 0xcc, 0x00, 0x11, last)
    }

    fn arp_packet(sender: MacAddr6, ip: Ipv4Addr) -> PacketMeta {
        PacketMeta {
            src_mac: Some(sender),
            arp: Some(ArpMeta {
                sender_mac: sender,
                sender_ip: ip,
            }),
            ipv4: None,
            dhcp_message_type: None,
        }
    }

    fn ipv4_packet(src_mac: MacAddr6, src: Ipv4Addr) -> PacketMeta {
        PacketMeta {
            src_mac: Some(src_mac),
            arp: None,
            ipv4: Some(Ipv4Meta { src, ttl: 64 }),
            dhcp_message_type: None,
        }
    }

    fn dhcp_offer_packet(src_mac: MacAddr6) -> PacketMeta {
        PacketMeta {
            src_mac: Some(src_mac),
            arp: None,
            ipv4: Some(Ipv4Meta {
                src: Ipv4Addr::new(192, 168, 1, 1),
                ttl: 64,
            }),
            dhcp_message_type: Some(DHCP_OFFER),
        }
    }

    fn bare_packet() -> PacketMeta {
        PacketMeta {
            src_mac: Some(mac(0)),
            arp: None,
            ipv4: None,
            dhcp_message_type: None,
        }
    }

    #[test]
    fn test_burst_fires_above_threshold_only() {
        let mut engine = AnomalyEngine::new(3, &[]);
        let ts = 1000;
        assert!(engine.check_packet(&bare_packet(), ts).is_none());
        assert!(engine.check_packet(&bare_packet(), ts).is_none());
        assert!(engine.check_packet(&bare_packet(), ts).is_none());
        // 4th packet within the same second crosses threshold 3
        let alert = engine.check_packet(&bare_packet(), ts).expect("burst expected");
        assert_eq!(alert.kind, "burst");
        assert_eq!(alert.desc, "Traffic burst: 4 pkts/sec");
    }

    #[test]
    fn test_burst_window_slides() {
        let mut engine = AnomalyEngine::new(2, &[]);
        for _ in 0..3 {
            engine.check_packet(&bare_packet(), 1000);
        }
        // Two seconds later the window is empty again
        assert!(engine.check_packet(&bare_packet(), 1002).is_none());
    }

    #[test]
    fn test_burst_dedup_window() {
        let mut engine = AnomalyEngine::new(2, &[]);
        for _ in 0..2 {
            engine.check_packet(&bare_packet(), 1000);
        }
        assert!(engine.check_packet(&bare_packet(), 1000).is_some());
        // Still bursting 5s later: suppressed
        for _ in 0..3 {
            assert!(engine.check_packet(&bare_packet(), 1005).is_none());
        }
        // 10s after the first alert the suppression lapses
        for _ in 0..2 {
            engine.check_packet(&bare_packet(), 1010);
        }
        assert!(engine.check_packet(&bare_packet(), 1010).is_some());
    }

    #[test]
    fn test_arp_spoof_on_second_mac_for_ip() {
        let mut engine = AnomalyEngine::new(1000, &[]);
        let ip = Ipv4Addr::new(192, 168, 1, 10);
        assert!(engine.check_packet(&arp_packet(mac(1), ip), 1000).is_none());
        let alert = engine
            .check_packet(&arp_packet(mac(2), ip), 1001)
            .expect("spoof expected");
        assert_eq!(alert.kind, "arp_spoof");
        assert!(alert.desc.contains("192.168.1.10"));
        assert!(alert.desc.contains("aa:bb:cc:00:11:01"));
        assert!(alert.desc.contains("aa:bb:cc:00:11:02"));
    }

    #[test]
    fn test_arp_spoof_dedup_per_ip() {
        let mut engine = AnomalyEngine::new(1000, &[]);
        let ip_a = Ipv4Addr::new(192, 168, 1, 10);
        let ip_b = Ipv4Addr::new(192, 168, 1, 11);
        engine.check_packet(&arp_packet(mac(1), ip_a), 1000);
        assert!(engine.check_packet(&arp_packet(mac(2), ip_a), 1000).is_some());
        // Same IP re-alerts only after 180s
        assert!(engine.check_packet(&arp_packet(mac(3), ip_a), 1100).is_none());
        assert!(engine.check_packet(&arp_packet(mac(3), ip_a), 1180).is_some());
        // A different IP is tracked independently
        engine.check_packet(&arp_packet(mac(1), ip_b), 1200);
        assert!(engine.check_packet(&arp_packet(mac(2), ip_b), 1200).is_some());
    }

    #[test]
    fn test_mac_clone_needs_more_than_three_ips() {
        let mut engine = AnomalyEngine::new(1000, &[]);
        let cloned = mac(9);
        for i in 1..=3 {
            let packet = ipv4_packet(cloned, Ipv4Addr::new(10, 0, 0, i));
            assert!(engine.check_packet(&packet, 1000).is_none());
        }
        let alert = engine
            .check_packet(&ipv4_packet(cloned, Ipv4Addr::new(10, 0, 0, 4)), 1000)
            .expect("clone expected");
        assert_eq!(alert.kind, "mac_clone");
        assert!(alert.desc.contains("aa:bb:cc:00:11:09"));
        assert!(alert.desc.contains("10.0.0.4"));
    }

    #[test]
    fn test_rogue_dhcp_ignores_trusted_server() {
        let trusted = vec!["AA:BB:CC:00:11:05".to_string()];
        let mut engine = AnomalyEngine::new(1000, &trusted);
        assert!(engine.check_packet(&dhcp_offer_packet(mac(5)), 1000).is_none());
        let alert = engine
            .check_packet(&dhcp_offer_packet(mac(6)), 1000)
            .expect("rogue expected");
        assert_eq!(alert.kind, "rogue_dhcp");
        assert_eq!(alert.desc, "Rogue DHCP OFFER from MAC aa:bb:cc:00:11:06");
    }

    #[test]
    fn test_rogue_dhcp_dedup_per_mac() {
        let mut engine = AnomalyEngine::new(1000, &[]);
        assert!(engine.check_packet(&dhcp_offer_packet(mac(7)), 1000).is_some());
        assert!(engine.check_packet(&dhcp_offer_packet(mac(7)), 1100).is_none());
        assert!(engine.check_packet(&dhcp_offer_packet(mac(7)), 1300).is_some());
    }

    #[test]
    fn test_non_offer_dhcp_is_ignored() {
        let mut engine = AnomalyEngine::new(1000, &[]);
        let mut packet = dhcp_offer_packet(mac(8));
        packet.dhcp_message_type = Some(1); // DISCOVER
        assert!(engine.check_packet(&packet, 1000).is_none());
    }

    #[test]
    fn test_alert_serialization_uses_type_field() {
        let alert = AnomalyRecord::new(1234, "burst", "Traffic burst: 7 pkts/sec".to_string());
        let json = serde_json::to_value(&alert).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({"ts": 1234, "type": "burst", "desc": "Traffic burst: 7 pkts/sec"})
        );
    }
}
