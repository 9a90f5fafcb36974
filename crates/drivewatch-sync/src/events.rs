//! Server-Sent Events stream of [`DriveChangeMessage`]s
//!
//! `GET /events` on the webhook server subscribes to the [`BroadcastSink`]
//! and streams every message as
//!
//! ```text
//! event: driveChange
//! data: {"event":"driveChange","cliente":"ClienteX",...}
//! ```
//!
//! A forwarding task moves messages from the broadcast receiver into an
//! mpsc channel that backs the response body. The stream ends when the
//! client disconnects or the server shuts down.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::body::{Body, Bytes, Frame};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sinks::{BroadcastSink, DriveChangeMessage};

/// Frames buffered per client before the forwarder waits
const CLIENT_BUFFER: usize = 16;

/// First frame of every stream, so the client sees the headers at once
const OPENING_COMMENT: &str = ": connected\n\n";

/// Response body fed by [`forward_events`]
pub struct EventStream {
    rx: mpsc::Receiver<Bytes>,
}

impl Body for EventStream {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes))))
    }
}

/// Subscribes to `sink` and returns the body streaming its messages
pub fn subscribe(sink: &BroadcastSink, shutdown: CancellationToken) -> EventStream {
    let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
    let messages = sink.subscribe();
    tokio::spawn(forward_events(messages, tx, shutdown));
    EventStream { rx }
}

/// Encodes one message as an SSE frame
pub fn sse_frame(message: &DriveChangeMessage) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(message)?;
    Ok(Bytes::from(format!(
        "event: {}\ndata: {data}\n\n",
        DriveChangeMessage::EVENT_NAME
    )))
}

async fn forward_events(
    mut messages: broadcast::Receiver<DriveChangeMessage>,
    tx: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
) {
    if tx.send(Bytes::from_static(OPENING_COMMENT.as_bytes())).await.is_err() {
        return;
    }

    loop {
        let received = tokio::select! {
            received = messages.recv() => received,
            _ = tx.closed() => break,
            _ = shutdown.cancelled() => break,
        };

        let message = match received {
            Ok(message) => message,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream client fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let frame = match sse_frame(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode event");
                continue;
            }
        };
        if tx.send(frame).await.is_err() {
            break;
        }
    }

    debug!("Event stream closed");
}
