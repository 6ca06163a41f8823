use crate::anomaly::AnomalyRecord;
use crate::config::DashboardConfig;
use crate::device::DeviceInfo;
use std::collections::VecDeque;

/// Chart history depth: one sample per poll tick.
pub const BURST_HISTORY_CAPACITY: usize = 100;

pub const DEVICE_COLUMNS: [&str; 7] = [
    "mac",
    "ip",
    "vendor",
    "hostname",
    "first_seen",
    "last_seen",
    "os_guess",
];

/// Everything the network tasks can tell the render loop.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Full device list replacement (snapshot or push).
    Devices(Vec<DeviceInfo>),
    /// Initial anomaly history, in API order (newest first).
    AlertsSnapshot(Vec<AnomalyRecord>),
    /// One live alert from the push channel.
    Alert(AnomalyRecord),
    Score(i64),
    /// Burst count from one poll of `/api/anomalies`.
    BurstSample(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertLine {
    pub kind: String,
    pub desc: String,
}

/// Last-N integers, oldest evicted first.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    capacity: usize,
    values: VecDeque<u64>,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: u64) {
        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn samples(&self) -> Vec<u64> {
        self.values.iter().copied().collect()
    }
}

/// The whole dashboard model. One instance, owned by the render loop;
/// handlers never touch the terminal directly.
pub struct DashboardState {
    devices: Vec<DeviceInfo>,
    alerts: VecDeque<AlertLine>,
    alert_capacity: usize,
    score: Option<i64>,
    burst_history: RollingBuffer,
}

impl DashboardState {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            devices: Vec::new(),
            alerts: VecDeque::new(),
            alert_capacity: config.alert_capacity,
            score: None,
            burst_history: RollingBuffer::new(BURST_HISTORY_CAPACITY),
        }
    }

    pub fn apply(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Devices(devices) => self.devices = devices,
            ClientEvent::AlertsSnapshot(anomalies) => {
                // Same prepend routine as live alerts, applied in API
                // order: the snapshot ends up oldest-first on screen.
                for anomaly in anomalies {
                    self.push_alert(anomaly);
                }
            }
            ClientEvent::Alert(anomaly) => self.push_alert(anomaly),
            ClientEvent::Score(score) => self.score = Some(score),
            ClientEvent::BurstSample(count) => self.burst_history.push(count),
        }
    }

    fn push_alert(&mut self, anomaly: AnomalyRecord) {
        self.alerts.push_front(AlertLine {
            kind: anomaly.kind,
            desc: anomaly.desc,
        });
        while self.alerts.len() > self.alert_capacity {
            self.alerts.pop_back();
        }
    }

    /// Table rows, one per device, columns in fixed order. Fields render
    /// verbatim; timestamps stay raw integers.
    pub fn device_rows(&self) -> Vec<[String; 7]> {
        self.devices
            .iter()
            .map(|d| {
                [
                    d.mac.clone(),
                    d.ip.clone(),
                    d.vendor.clone(),
                    d.hostname.clone(),
                    d.first_seen.to_string(),
                    d.last_seen.to_string(),
                    d.os_guess.clone(),
                ]
            })
            .collect()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &AlertLine> {
        self.alerts.iter()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    /// The displayed score: the last fetched value verbatim, blank until
    /// the first successful fetch.
    pub fn score_text(&self) -> String {
        self.score.map(|s| s.to_string()).unwrap_or_default()
    }

    pub fn burst_history(&self) -> &RollingBuffer {
        &self.burst_history
    }
}
