//! Event stream handler
//!
//! Server-Sent Events endpoint backed by the broker. A new subscriber
//! is fed a `project/list` bootstrap event before live events; when the
//! client disconnects the sink is unregistered from the coordinator.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

use crate::engine::broker::{BrokerHandle, Sink};
use crate::state::AppState;

/// Unregisters the subscriber when the stream is dropped
struct Unsubscribe {
    broker: BrokerHandle,
    sink: Sink,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        let broker = self.broker.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            broker.unsubscribe(sink).await;
        });
    }
}

/// GET /events
pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (sink, events) = state.broker.subscribe().await;
    let guard = Unsubscribe {
        broker: state.broker.clone(),
        sink,
    };
    let stream = ReceiverStream::new(events).map(move |event| {
        let _ = &guard;
        Ok(match SseEvent::default().json_data(&event) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!("Failed to serialize event: {}", err);
                SseEvent::default()
            }
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
