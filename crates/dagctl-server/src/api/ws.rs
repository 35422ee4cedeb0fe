//! `GET /workflows/:id/events`: a real WebSocket upgrade streaming
//! [`ExecutionEvent`]s as JSON text frames, named after
//! `orchestrator::api::ws::handler::ws_handler` but carried to
//! completion — that handler was a stub returning a 200 pending
//! `tokio-tungstenite` wiring; axum 0.7 ships WS support directly so
//! there is no reason to leave it unfinished here.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::api::state::AppState;

pub async fn workflow_events(
    Path(workflow_id): Path<String>,
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, app_state, workflow_id))
}

async fn stream_events(mut socket: WebSocket, app_state: AppState, workflow_id: String) {
    let Some(running) = app_state.running.get(&workflow_id) else {
        let _ = socket
            .send(Message::Text(serde_json::json!({"error": "workflow not found"}).to_string()))
            .await;
        return;
    };
    let mut receiver = running.events.subscribe();
    drop(running);

    loop {
        tokio::select! {
            event = receiver.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(text) = serde_json::to_string(&event) else { continue };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
