use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::error::AppError;
use crate::models::TtsRequest;
use crate::voice::{ClientMessage, ServerMessage, VoiceSession};

/// `POST /api/voice/tts`: returns the synthesized WAV as an attachment.
pub async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TtsRequest>,
) -> Result<Response, AppError> {
    let audio = state.tts.synthesize(&req.text).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "attachment; filename=speech.wav"),
        ],
        audio,
    )
        .into_response())
}

/// `GET /api/voice/stream`: one recording session per connection.
pub async fn stream(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let session = state.voice.session();
    ws.on_upgrade(move |socket| handle_socket(socket, session))
}

async fn handle_socket(mut socket: WebSocket, mut session: VoiceSession) {
    info!("voice websocket connected");

    while let Some(frame) = socket.recv().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                debug!(error = %err, "voice websocket receive failed");
                break;
            }
        };

        let message = match ClientMessage::from_frame(&text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "closing voice websocket after unparseable frame");
                let _ = send(&mut socket, &ServerMessage::error(err.to_string())).await;
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        };

        // Replies are sent before the next frame is read.
        for reply in session.handle(message).await {
            if let Err(err) = send(&mut socket, &reply).await {
                debug!(error = %err, "voice websocket send failed");
                return;
            }
        }
    }

    info!("voice websocket disconnected");
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    socket.send(Message::Text(text)).await
}
