use crate::anomaly::AnomalyEngine;
use crate::config::Config;
use crate::db::Db;
use crate::device::DeviceInventory;
use crate::events::{EventSender, PushEvent};
use crate::packet::PacketMeta;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Depth of the capture -> pipeline queue.
pub const PACKET_QUEUE_DEPTH: usize = 1024;

/// Drives the device inventory and the anomaly engine off the packet
/// stream, persisting as it goes and publishing push events.
pub struct Pipeline {
    db: Arc<Db>,
    inventory: DeviceInventory,
    engine: AnomalyEngine,
    events: EventSender,
}

impl Pipeline {
    pub fn new(db: Arc<Db>, config: &Config, events: EventSender) -> Self {
        Self {
            db,
            inventory: DeviceInventory::new(&config.oui_lookup_url),
            engine: AnomalyEngine::new(
                config.traffic_burst_threshold,
                &config.trusted_dhcp_servers,
            ),
            events,
        }
    }

    pub fn spawn(mut self, mut rx: mpsc::Receiver<PacketMeta>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(meta) = rx.recv().await {
                self.handle(meta).await;
            }
            info!("Packet pipeline stopped");
        })
    }

    /// Process one packet: learn the device, run the detectors, publish.
    /// A database hiccup is logged and skipped so the stream keeps flowing.
    pub async fn handle(&mut self, meta: PacketMeta) {
        let now = Utc::now().timestamp();

        if let Some(device) = self.inventory.learn(&meta, now).await {
            if let Err(err) = self.db.upsert_device(&device) {
                warn!("Failed to persist device {}: {}", device.mac, err);
            }
        }

        if let Some(alert) = self.engine.check_packet(&meta, now) {
            info!("Anomaly detected: {} - {}", alert.kind, alert.desc);
            if let Err(err) = self.db.add_anomaly(&alert) {
                warn!("Failed to persist anomaly: {}", err);
            }
            let _ = self.events.send(PushEvent::alert(alert));
        }

        let _ = self
            .events
            .send(PushEvent::packet_seen(self.inventory.active_devices()));
    }
}
