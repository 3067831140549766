//! WebSocket push of tick snapshots and scenario notifications.

use crate::api::ApiState;
use crate::api::responses::{CONNECTED_MESSAGE, ConnectedPayload, StreamEvent, TrafficResponse};
use crate::control;
use crate::error::AppError;
use crate::scenario::Notification;
use crate::state::IntersectionState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};

pub async fn subscribe(State(api): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    match open_receivers(&api) {
        Ok((updates, notifications)) => {
            ws.on_upgrade(move |socket| forward_events(socket, updates, notifications))
        }
        Err(err) => {
            error!(error = %err, "Failed to subscribe WebSocket client");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn open_receivers(
    api: &ApiState,
) -> Result<
    (
        broadcast::Receiver<IntersectionState>,
        broadcast::Receiver<Notification>,
    ),
    AppError,
> {
    let updates = control::subscribe_to_updates(&api.shared)?;
    let notifications = control::subscribe_notifications(&api.shared)?;
    Ok((updates, notifications))
}

async fn forward_events(
    mut socket: WebSocket,
    mut updates: broadcast::Receiver<IntersectionState>,
    mut notifications: broadcast::Receiver<Notification>,
) {
    debug!("WebSocket client connected");
    let greeting = StreamEvent::Connected(ConnectedPayload {
        data: CONNECTED_MESSAGE.to_string(),
    });
    if !send_event(&mut socket, &greeting).await {
        debug!("WebSocket client left before greeting");
        return;
    }

    loop {
        let event = tokio::select! {
            update = updates.recv() => match update {
                Ok(snapshot) => match TrafficResponse::from_state(&snapshot) {
                    Ok(body) => StreamEvent::TrafficUpdate(body),
                    Err(err) => {
                        warn!(error = %err, "Dropping update with unformattable timestamp");
                        continue;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, updates dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            notification = notifications.recv() => match notification {
                Ok(notification) => StreamEvent::Notification(notification),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, notifications dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };

        if !send_event(&mut socket, &event).await {
            break;
        }
    }
    debug!("WebSocket client disconnected");
}

/// Returns false once the socket can no longer be written to.
async fn send_event(socket: &mut WebSocket, event: &StreamEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "Failed to serialize stream event");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}
