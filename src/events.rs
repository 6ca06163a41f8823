use crate::anomaly::AnomalyRecord;
use crate::device::DeviceInfo;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the push fan-out; slow subscribers lag and drop.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub type EventSender = broadcast::Sender<PushEvent>;

pub fn channel() -> EventSender {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Envelope sent as one JSON text frame per event on the push channel:
/// `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    NetworkEvent(NetworkEventData),
    Alert(AnomalyRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkEventData {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub devs: Option<Vec<DeviceInfo>>,
}

impl PushEvent {
    /// Emitted after every processed packet with the refreshed inventory.
    pub fn packet_seen(devs: Vec<DeviceInfo>) -> Self {
        PushEvent::NetworkEvent(NetworkEventData {
            kind: "pkt".to_string(),
            devs: Some(devs),
        })
    }

    pub fn alert(anomaly: AnomalyRecord) -> Self {
        PushEvent::Alert(anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_envelope_shape() {
        let event = PushEvent::alert(AnomalyRecord::new(
            1234,
            "burst",
            "Traffic burst: 130 pkts/sec".to_string(),
        ));
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "event": "alert",
                "data": {"ts": 1234, "type": "burst", "desc": "Traffic burst: 130 pkts/sec"}
            })
        );
    }

    #[test]
    fn test_network_event_envelope_shape() {
        let event = PushEvent::packet_seen(vec![]);
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(
            json,
            serde_json::json!({
                "event": "network_event",
                "data": {"type": "pkt", "devs": []}
            })
        );
    }

    #[test]
    fn test_network_event_without_devs_decodes() {
        let event: PushEvent =
            serde_json::from_str(r#"{"event":"network_event","data":{"type":"pkt"}}"#)
                .expect("decodes");
        match event {
            PushEvent::NetworkEvent(data) => {
                assert_eq!(data.kind, "pkt");
                assert!(data.devs.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
