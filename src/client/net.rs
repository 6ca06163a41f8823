use crate::anomaly::AnomalyRecord;
use crate::client::state::ClientEvent;
use crate::device::DeviceInfo;
use crate::events::PushEvent;
use crate::score::Score;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push channel failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed push payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// `http(s)://host:port` -> `ws(s)://host:port/socket.io`
pub fn ws_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        format!("ws://{}", base)
    };
    format!("{}/socket.io", base)
}

/// Initial snapshot: three independent fetches, no ordering between them.
pub fn spawn_snapshot(
    client: reqwest::Client,
    base_url: String,
    tx: UnboundedSender<ClientEvent>,
) -> Vec<JoinHandle<()>> {
    let devices = {
        let (client, base_url, tx) = (client.clone(), base_url.clone(), tx.clone());
        tokio::spawn(async move {
            if let Err(err) = fetch_devices(&client, &base_url, &tx).await {
                debug!("Device snapshot failed: {}", err);
            }
        })
    };
    let anomalies = {
        let (client, base_url, tx) = (client.clone(), base_url.clone(), tx.clone());
        tokio::spawn(async move {
            if let Err(err) = fetch_anomaly_snapshot(&client, &base_url, &tx).await {
                debug!("Anomaly snapshot failed: {}", err);
            }
        })
    };
    let score = tokio::spawn(async move {
        if let Err(err) = fetch_score(&client, &base_url, &tx).await {
            debug!("Score fetch failed: {}", err);
        }
    });
    vec![devices, anomalies, score]
}

/// Live updates: forward push events to the render loop; an alert also
/// triggers a score refresh. Any error ends the task silently — the UI
/// just stops updating, it never shows a failure state.
pub fn spawn_push(
    client: reqwest::Client,
    base_url: String,
    tx: UnboundedSender<ClientEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = push_loop(&client, &base_url, &tx).await {
            debug!("Push channel closed: {}", err);
        }
    })
}

async fn push_loop(
    client: &reqwest::Client,
    base_url: &str,
    tx: &UnboundedSender<ClientEvent>,
) -> Result<(), ClientError> {
    let (stream, _) = tokio_tungstenite::connect_async(ws_url(base_url)).await?;
    let (_, mut frames) = stream.split();

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        let Message::Text(text) = frame else { continue };
        let event: PushEvent = serde_json::from_str(&text)?;
        match event {
            PushEvent::NetworkEvent(data) => {
                if let Some(devs) = data.devs {
                    if tx.send(ClientEvent::Devices(devs)).is_err() {
                        break;
                    }
                }
            }
            PushEvent::Alert(alert) => {
                if tx.send(ClientEvent::Alert(alert)).is_err() {
                    break;
                }
                let (client, base_url, tx) =
                    (client.clone(), base_url.to_string(), tx.clone());
                tokio::spawn(async move {
                    if let Err(err) = fetch_score(&client, &base_url, &tx).await {
                        debug!("Score refresh failed: {}", err);
                    }
                });
            }
        }
    }
    Ok(())
}

/// Poll `/api/anomalies`, count the burst entries, feed the chart. The
/// interval keeps ticking while a fetch is in flight; `skip_if_inflight`
/// decides whether such a tick overlaps or is skipped.
pub fn spawn_poller(
    client: reqwest::Client,
    base_url: String,
    interval: Duration,
    skip_if_inflight: bool,
    tx: UnboundedSender<ClientEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let inflight = Arc::new(AtomicBool::new(false));
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            if skip_if_inflight && inflight.load(Ordering::Relaxed) {
                continue;
            }
            inflight.store(true, Ordering::Relaxed);
            let (client, base_url, tx) = (client.clone(), base_url.clone(), tx.clone());
            let inflight = inflight.clone();
            tokio::spawn(async move {
                if let Err(err) = poll_once(&client, &base_url, &tx).await {
                    debug!("Anomaly poll failed: {}", err);
                }
                inflight.store(false, Ordering::Relaxed);
            });
        }
    })
}

async fn poll_once(
    client: &reqwest::Client,
    base_url: &str,
    tx: &UnboundedSender<ClientEvent>,
) -> Result<(), ClientError> {
    let anomalies: Vec<AnomalyRecord> = client
        .get(format!("{}/api/anomalies", base_url))
        .send()
        .await?
        .json()
        .await?;
    let bursts = anomalies.iter().filter(|a| a.kind == "burst").count() as u64;
    let _ = tx.send(ClientEvent::BurstSample(bursts));
    Ok(())
}

async fn fetch_devices(
    client: &reqwest::Client,
    base_url: &str,
    tx: &UnboundedSender<ClientEvent>,
) -> Result<(), ClientError> {
    let devices: Vec<DeviceInfo> = client
        .get(format!("{}/api/devices", base_url))
        .send()
        .await?
        .json()
        .await?;
    let _ = tx.send(ClientEvent::Devices(devices));
    Ok(())
}

async fn fetch_anomaly_snapshot(
    client: &reqwest::Client,
    base_url: &str,
    tx: &UnboundedSender<ClientEvent>,
) -> Result<(), ClientError> {
    let anomalies: Vec<AnomalyRecord> = client
        .get(format!("{}/api/anomalies", base_url))
        .send()
        .await?
        .json()
        .await?;
    let _ = tx.send(ClientEvent::AlertsSnapshot(anomalies));
    Ok(())
}

pub async fn fetch_score(
    client: &reqwest::Client,
    base_url: &str,
    tx: &UnboundedSender<ClientEvent>,
) -> Result<(), ClientError> {
    let score: Score = client
        .get(format!("{}/api/security_score", base_url))
        .send()
        .await?
        .json()
        .await?;
    let _ = tx.send(ClientEvent::Score(score.score));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_from_http() {
        assert_eq!(
            ws_url("http://127.0.0.1:8080"),
            "ws://127.0.0.1:8080/socket.io"
        );
    }

    #[test]
    fn test_ws_url_from_https_and_trailing_slash() {
        assert_eq!(ws_url("https://lan.example/"), "wss://lan.example/socket.io");
    }

    #[test]
    fn test_ws_url_bare_host() {
        assert_eq!(ws_url("127.0.0.1:8080"), "ws://127.0.0.1:8080/socket.io");
    }
}
