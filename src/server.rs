use crate::db::Db;
use crate::events::EventSender;
use crate::export;
use crate::score::{security_score, Score};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub events: EventSender,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/devices", get(api_devices))
        .route("/api/anomalies", get(api_anomalies))
        .route("/api/security_score", get(api_security_score))
        .route("/api/export", get(api_export))
        .route("/socket.io", get(ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Web interface listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    error!("Request failed: {:#}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn api_devices(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let devices = state.db.devices().map_err(internal_error)?;
    Ok(Json(devices).into_response())
}

async fn api_anomalies(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let anomalies = state.db.anomalies().map_err(internal_error)?;
    Ok(Json(anomalies).into_response())
}

async fn api_security_score(State(state): State<AppState>) -> Result<Json<Score>, StatusCode> {
    let anomalies = state.db.anomalies().map_err(internal_error)?;
    Ok(Json(security_score(&anomalies, Utc::now().timestamp())))
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

async fn api_export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, StatusCode> {
    let devices = state.db.devices().map_err(internal_error)?;
    match query.format.as_deref() {
        Some("csv") => {
            let body = export::devices_to_csv(&devices).map_err(internal_error)?;
            Ok(([(header::CONTENT_TYPE, "text/csv")], body).into_response())
        }
        _ => Ok(Json(devices).into_response()),
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| push_session(socket, state))
}

/// One connected dashboard. Forwards every broadcast event as a JSON text
/// frame until either side goes away; inbound frames are ignored.
async fn push_session(socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();
    let (mut sink, mut stream) = socket.split();
    debug!("Push subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!("Failed to encode push event: {}", err);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Push subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Push subscriber disconnected");
}
