use crate::packet::{parse_frame, PacketMeta};
use anyhow::{anyhow, Context, Result};
use pcap::{Active, Capture};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// Wake up at least this often to notice a stop request.
const READ_TIMEOUT_MS: i32 = 1000;

/// Running capture task. Dropping the handle does not stop the capture;
/// call [`CaptureHandle::stop`].
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub async fn join(self) {
        self.stop();
        let _ = self.task.await;
    }
}

pub fn validate_interface(name: &str) -> Result<()> {
    let devices = pcap::Device::list().context("Failed to enumerate capture interfaces")?;
    if devices.iter().any(|d| d.name == name) {
        Ok(())
    } else {
        let available = devices
            .iter()
            .map(|d| d.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Err(anyhow!(
            "Interface '{}' not found. Available: {}",
            name,
            available
        ))
    }
}

/// Open `interface` promiscuously and stream parsed packet metadata into
/// `tx` until stopped. The pcap read loop is blocking, so it runs on the
/// blocking pool.
pub fn start(interface: &str, tx: mpsc::Sender<PacketMeta>) -> Result<CaptureHandle> {
    validate_interface(interface)?;

    let capture = Capture::from_device(interface)
        .with_context(|| format!("Failed to open capture device '{}'", interface))?
        .promisc(true)
        .timeout(READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()
        .with_context(|| format!("Failed to activate capture on '{}'", interface))?;

    info!("Packet capture started on {}", interface);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let task = tokio::task::spawn_blocking(move || {
        if let Err(err) = read_loop(capture, tx, stop_flag) {
            warn!("Capture loop ended with error: {}", err);
        }
    });

    Ok(CaptureHandle { stop, task })
}

fn read_loop(
    mut capture: Capture<Active>,
    tx: mpsc::Sender<PacketMeta>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    while !stop.load(Ordering::Relaxed) {
        match capture.next_packet() {
            Ok(packet) => {
                if let Some(meta) = parse_frame(packet.data) {
                    // Pipeline gone means shutdown
                    if tx.blocking_send(meta).is_err() {
                        break;
                    }
                }
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    info!("Packet capture stopped");
    Ok(())
}
