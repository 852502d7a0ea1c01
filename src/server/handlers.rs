use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive},
    response::{Json, Sse},
};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::{debug, error};

use crate::app::{Msg, ViewSnapshot};
use crate::entry::Region;
use crate::selection::MarkerTarget;
use crate::settings::Settings;

use super::events::MapEvent;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenEntryRequest {
    pub link: String,
}

async fn forward(state: &AppState, msg: Msg) -> StatusCode {
    match state.map.send(msg).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            error!("Dropping surface event: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

// Latest view snapshot
pub async fn get_view(State(state): State<AppState>) -> Json<ViewSnapshot> {
    Json(state.map.snapshot())
}

pub async fn set_region(State(state): State<AppState>, Json(region): Json<Region>) -> StatusCode {
    forward(&state, Msg::RegionChanged(region)).await
}

pub async fn tap_marker(
    State(state): State<AppState>,
    Json(target): Json<MarkerTarget>,
) -> StatusCode {
    forward(&state, Msg::MarkerTapped(target)).await
}

pub async fn tap_map(State(state): State<AppState>) -> StatusCode {
    forward(&state, Msg::MapTapped).await
}

pub async fn open_entry(
    State(state): State<AppState>,
    Json(request): Json<OpenEntryRequest>,
) -> StatusCode {
    forward(&state, Msg::EntryTapped { link: request.link }).await
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, StatusCode> {
    let settings = state
        .settings
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(settings.clone()))
}

// SSE stream of view snapshots
pub async fn view_events_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, rx) = mpsc::channel(100);
    let mut view_receiver = state.map.subscribe();

    // Initial snapshot so a new client can draw immediately
    let initial = to_sse(&MapEvent::view(state.map.snapshot()));

    tokio::spawn(async move {
        if tx.send(Ok(initial)).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                received = view_receiver.recv() => {
                    let event = match received {
                        Ok(snapshot) => MapEvent::view(snapshot),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("SSE client lagged by {} snapshots", skipped);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    if tx.send(Ok(to_sse(&event))).await.is_err() {
                        break; // Client disconnected
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    if tx.send(Ok(to_sse(&MapEvent::heartbeat()))).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive-message"),
    )
}

fn to_sse(event: &MapEvent) -> SseEvent {
    SseEvent::default()
        .event(event.event_type.clone())
        .json_data(event)
        .unwrap_or_else(|_| SseEvent::default().data("Error serializing event"))
}
