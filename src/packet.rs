use macaddr::MacAddr6;
use pnet_packet::arp::ArpPacket;
use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::udp::UdpPacket;
use pnet_packet::Packet as PnetPacket;
use std::net::Ipv4Addr;

pub const DHCP_OFFER: u8 = 2;

const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const BOOTP_OPTIONS_OFFSET: usize = 236;
const DHCP_OPT_PAD: u8 = 0;
const DHCP_OPT_END: u8 = 255;
const DHCP_OPT_MESSAGE_TYPE: u8 = 53;

/// What the detectors need from one captured frame. Parsing stops at this
/// level: full session tracking is out of scope for a passive inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketMeta {
    pub src_mac: Option<MacAddr6>,
    pub arp: Option<ArpMeta>,
    pub ipv4: Option<Ipv4Meta>,
    pub dhcp_message_type: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArpMeta {
    pub sender_mac: MacAddr6,
    pub sender_ip: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Meta {
    pub src: Ipv4Addr,
    pub ttl: u8,
}

impl PacketMeta {
    pub fn empty() -> Self {
        Self {
            src_mac: None,
            arp: None,
            ipv4: None,
            dhcp_message_type: None,
        }
    }
}

fn mac6(mac: pnet_base::MacAddr) -> MacAddr6 {
    MacAddr6::new(mac.0, mac.1, mac.2, mac.3, mac.4, mac.5)
}

/// Dissect one Ethernet frame into [`PacketMeta`]. Frames that are too
/// short to carry an Ethernet header yield `None`; unknown ethertypes
/// still yield the source MAC (they count towards burst detection).
pub fn parse_frame(frame: &[u8]) -> Option<PacketMeta> {
    let eth = EthernetPacket::new(frame)?;
    let src_mac = Some(mac6(eth.get_source()));

    match eth.get_ethertype() {
        EtherTypes::Arp => {
            let arp = ArpPacket::new(eth.payload())?;
            Some(PacketMeta {
                src_mac,
                arp: Some(ArpMeta {
                    sender_mac: mac6(arp.get_sender_hw_addr()),
                    sender_ip: arp.get_sender_proto_addr(),
                }),
                ipv4: None,
                dhcp_message_type: None,
            })
        }
        EtherTypes::Ipv4 => {
            let ip = Ipv4Packet::new(eth.payload())?;
            let mut meta = PacketMeta {
                src_mac,
                arp: None,
                ipv4: Some(Ipv4Meta {
                    src: ip.get_source(),
                    ttl: ip.get_ttl(),
                }),
                dhcp_message_type: None,
            };
            if ip.get_next_level_protocol() == IpNextHeaderProtocols::Udp {
                if let Some(udp) = UdpPacket::new(ip.payload()) {
                    let ports = [udp.get_source(), udp.get_destination()];
                    if ports.contains(&67) || ports.contains(&68) {
                        meta.dhcp_message_type = dhcp_message_type(udp.payload());
                    }
                }
            }
            Some(meta)
        }
        _ => Some(PacketMeta {
            src_mac,
            arp: None,
            ipv4: None,
            dhcp_message_type: None,
        }),
    }
}

/// Scan a BOOTP payload for DHCP option 53 (message type).
pub fn dhcp_message_type(bootp: &[u8]) -> Option<u8> {
    if bootp.len() < BOOTP_OPTIONS_OFFSET + 4 {
        return None;
    }
    if bootp[BOOTP_OPTIONS_OFFSET..BOOTP_OPTIONS_OFFSET + 4] != DHCP_MAGIC_COOKIE {
        return None;
    }
    let mut idx = BOOTP_OPTIONS_OFFSET + 4;
    while idx < bootp.len() {
        match bootp[idx] {
            DHCP_OPT_PAD => idx += 1,
            DHCP_OPT_END => return None,
            opt => {
                let len = *bootp.get(idx + 1)? as usize;
                if opt == DHCP_OPT_MESSAGE_TYPE {
                    return if len >= 1 { bootp.get(idx + 2).copied() } else { None };
                }
                idx += 2 + len;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet_base::MacAddr;
    use pnet_packet::arp::{ArpHardwareTypes, ArpOperations, MutableArpPacket};
    use pnet_packet::ethernet::MutableEthernetPacket;
    use pnet_packet::ipv4::MutableIpv4Packet;
    use pnet_packet::udp::MutableUdpPacket;
    use pnet_packet::MutablePacket;

    const SRC_MAC: MacAddr = MacAddr(0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22);

    fn arp_frame(sender_ip: Ipv4Addr) -> Vec<u8> {
        let mut buf = vec![0u8; 14 + 28];
        let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
        eth.set_source(SRC_MAC);
        eth.set_destination(MacAddr::broadcast());
        eth.set_ethertype(EtherTypes::Arp);
        let mut arp = MutableArpPacket::new(eth.payload_mut()).unwrap();
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Request);
        arp.set_sender_hw_addr(SRC_MAC);
        arp.set_sender_proto_addr(sender_ip);
        arp.set_target_proto_addr(Ipv4Addr::new(192, 168, 1, 1));
        buf
    }

    fn ipv4_frame(src: Ipv4Addr, ttl: u8) -> Vec<u8> {
        let mut buf = vec![0u8; 14 + 20];
        let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
        eth.set_source(SRC_MAC);
        eth.set_ethertype(EtherTypes::Ipv4);
        let mut ip = MutableIpv4Packet::new(eth.payload_mut()).unwrap();
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_total_length(20);
        ip.set_ttl(ttl);
        ip.set_source(src);
        ip.set_destination(Ipv4Addr::new(192, 168, 1, 1));
        buf
    }

    fn dhcp_frame(message_type: u8) -> Vec<u8> {
        let mut bootp = vec![0u8; BOOTP_OPTIONS_OFFSET];
        bootp.extend_from_slice(&DHCP_MAGIC_COOKIE);
        bootp.extend_from_slice(&[DHCP_OPT_MESSAGE_TYPE, 1, message_type, DHCP_OPT_END]);

        let udp_len = 8 + bootp.len();
        let ip_len = 20 + udp_len;
        let mut buf = vec![0u8; 14 + ip_len];
        {
            let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
            eth.set_source(SRC_MAC);
            eth.set_destination(MacAddr::broadcast());
            eth.set_ethertype(EtherTypes::Ipv4);
        }
        {
            let mut ip = MutableIpv4Packet::new(&mut buf[14..]).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length(ip_len as u16);
            ip.set_ttl(64);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
            ip.set_source(Ipv4Addr::new(192, 168, 1, 10));
            ip.set_destination(Ipv4Addr::new(255, 255, 255, 255));
        }
        {
            let mut udp = MutableUdpPacket::new(&mut buf[34..]).unwrap();
            udp.set_source(67);
            udp.set_destination(68);
            udp.set_length(udp_len as u16);
            udp.set_payload(&bootp);
        }
        buf
    }

    #[test]
    fn test_parse_arp_frame() {
        let frame = arp_frame(Ipv4Addr::new(192, 168, 1, 42));
        let meta = parse_frame(&frame).expect("frame should parse");
        let arp = meta.arp.expect("ARP metadata expected");
        assert_eq!(arp.sender_ip, Ipv4Addr::new(192, 168, 1, 42));
        assert_eq!(arp.sender_mac.to_string(), "AA:BB:CC:00:11:22");
        assert!(meta.ipv4.is_none());
        assert!(meta.dhcp_message_type.is_none());
    }

    #[test]
    fn test_parse_ipv4_frame_carries_src_and_ttl() {
        let frame = ipv4_frame(Ipv4Addr::new(10, 0, 0, 7), 128);
        let meta = parse_frame(&frame).expect("frame should parse");
        let ipv4 = meta.ipv4.expect("IPv4 metadata expected");
        assert_eq!(ipv4.src, Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(ipv4.ttl, 128);
        assert!(meta.arp.is_none());
        assert_eq!(
            meta.src_mac.map(|m| m.to_string()),
            Some("AA:BB:CC:00:11:22".to_string())
        );
    }

    #[test]
    fn test_parse_dhcp_offer() {
        let frame = dhcp_frame(DHCP_OFFER);
        let meta = parse_frame(&frame).expect("frame should parse");
        assert_eq!(meta.dhcp_message_type, Some(DHCP_OFFER));
    }

    #[test]
    fn test_parse_dhcp_discover_is_not_offer() {
        let frame = dhcp_frame(1);
        let meta = parse_frame(&frame).expect("frame should parse");
        assert_eq!(meta.dhcp_message_type, Some(1));
    }

    #[test]
    fn test_truncated_frame_yields_none() {
        assert!(parse_frame(&[0u8; 6]).is_none());
    }

    #[test]
    fn test_dhcp_parser_rejects_missing_cookie() {
        let mut bootp = vec![0u8; BOOTP_OPTIONS_OFFSET + 8];
        bootp[BOOTP_OPTIONS_OFFSET..BOOTP_OPTIONS_OFFSET + 4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(dhcp_message_type(&bootp), None);
    }

    #[test]
    fn test_dhcp_parser_skips_unrelated_options() {
        let mut bootp = vec![0u8; BOOTP_OPTIONS_OFFSET];
        bootp.extend_from_slice(&DHCP_MAGIC_COOKIE);
        // subnet mask, then pad, then message type
        bootp.extend_from_slice(&[1, 4, 255, 255, 255, 0, DHCP_OPT_PAD, 53, 1, 5, 255]);
        assert_eq!(dhcp_message_type(&bootp), Some(5));
    }

    #[test]
    fn test_dhcp_parser_handles_truncated_options() {
        let mut bootp = vec![0u8; BOOTP_OPTIONS_OFFSET];
        bootp.extend_from_slice(&DHCP_MAGIC_COOKIE);
        bootp.push(53); // option id with no length byte
        assert_eq!(dhcp_message_type(&bootp), None);
    }
}
