//! Server-sent event framing for streamed chat completions.
//!
//! A producer task reads the model's snapshot stream, converts it to deltas
//! and pushes framed `data: <json>\n\n` events into a bounded channel whose
//! receiving end is the HTTP body. When the client goes away the body is
//! dropped and the channel closes; the producer notices that even while the
//! model is silent and drops the model stream, which stops generation.

use std::convert::Infallible;
use std::pin::pin;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures_util::StreamExt;
use localgate_core::{SnapshotStream, into_deltas};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};

use crate::models::{ChatCompletionChunk, StreamMeta};

/// Literal event closing every stream.
pub const DONE_EVENT: &str = "data: [DONE]\n\n";

/// At most one framed event waits for the client at any time.
const EVENT_BUFFER: usize = 1;

/// Build the SSE response for a chat completion and start its producer.
pub fn stream_chat_completion(snapshots: SnapshotStream, meta: StreamMeta) -> Response {
    let (tx, rx) = mpsc::channel::<Bytes>(EVENT_BUFFER);
    tokio::spawn(produce_chat_events(snapshots, meta, tx));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("x-accel-buffering", "no") // Disable nginx buffering
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Frame a value as one SSE event.
pub fn frame_event<T: Serialize>(value: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

/// Drive one streamed completion to the channel.
///
/// Emits one event per non-empty delta, then exactly one terminal chunk and
/// one `[DONE]` event, also after a generation failure. Returns early, and
/// drops the model stream, as soon as the receiver is gone, even while
/// waiting for the model.
pub async fn produce_chat_events(
    snapshots: SnapshotStream,
    meta: StreamMeta,
    tx: mpsc::Sender<Bytes>,
) {
    let mut deltas = pin!(into_deltas(snapshots));
    let mut first = true;
    let mut forwarded = 0usize;

    loop {
        // A stalled model must not outlive the client.
        let next = tokio::select! {
            biased;
            () = tx.closed() => {
                debug!(id = %meta.id, "Client disconnected before next chunk, cancelling generation");
                return;
            }
            next = deltas.next() => next,
        };
        let Some(item) = next else {
            break;
        };

        match item {
            Ok(delta) => {
                let chunk = ChatCompletionChunk::delta(&meta, delta, first);
                match frame_event(&chunk) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            debug!(id = %meta.id, "Client disconnected, cancelling generation");
                            return;
                        }
                        first = false;
                        forwarded += 1;
                    }
                    Err(e) => warn!(id = %meta.id, "Failed to encode stream chunk: {e}"),
                }
            }
            Err(e) => {
                error!(id = %meta.id, "Streaming response error: {e}");
                break;
            }
        }
    }

    match frame_event(&ChatCompletionChunk::finish(&meta)) {
        Ok(event) => {
            if tx.send(event).await.is_err() {
                return;
            }
        }
        Err(e) => warn!(id = %meta.id, "Failed to encode final stream chunk: {e}"),
    }
    let _ = tx.send(Bytes::from_static(DONE_EVENT.as_bytes())).await;

    debug!(id = %meta.id, chunks = forwarded, "Stream finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use localgate_core::ModelError;

    async fn run(items: Vec<Result<String, ModelError>>) -> Vec<String> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let producer = tokio::spawn(produce_chat_events(
            stream::iter(items).boxed(),
            StreamMeta::new("test-model"),
            tx,
        ));
        let mut events = Vec::new();
        while let Some(bytes) = rx.recv().await {
            events.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
        producer.await.unwrap();
        events
    }

    fn payload(event: &str) -> serde_json::Value {
        let json = event
            .strip_prefix("data: ")
            .and_then(|s| s.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_successful_stream_framing() {
        let events = run(vec![
            Ok("Hi".into()),
            Ok("Hi there".into()),
            Ok("Hi there!".into()),
            Ok("Hi there!".into()),
        ])
        .await;

        assert_eq!(events.len(), 5);
        let first = payload(&events[0]);
        assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(first["choices"][0]["delta"]["content"], "Hi");
        assert_eq!(payload(&events[1])["choices"][0]["delta"]["content"], " there");
        assert!(payload(&events[1])["choices"][0]["delta"].get("role").is_none());
        assert_eq!(payload(&events[2])["choices"][0]["delta"]["content"], "!");
        assert_eq!(payload(&events[3])["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[4], DONE_EVENT);
    }

    #[tokio::test]
    async fn test_failure_still_terminates_stream() {
        let events = run(vec![
            Ok("partial".into()),
            Err(ModelError::Generation("backend died".into())),
            Ok("partial and more".into()),
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert_eq!(payload(&events[0])["choices"][0]["delta"]["content"], "partial");
        assert_eq!(payload(&events[1])["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[2], DONE_EVENT);
        assert_eq!(events.iter().filter(|e| *e == DONE_EVENT).count(), 1);
    }

    #[tokio::test]
    async fn test_failure_before_first_delta() {
        let events = run(vec![Err(ModelError::OutputProcessing)]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(payload(&events[0])["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[1], DONE_EVENT);
    }

    #[tokio::test]
    async fn test_disconnect_while_model_is_silent() {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let producer = tokio::spawn(produce_chat_events(
            stream::pending().boxed(),
            StreamMeta::new("m"),
            tx,
        ));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        drop(rx);

        let finished = tokio::time::timeout(std::time::Duration::from_secs(2), producer).await;
        assert!(finished.is_ok(), "producer must stop once the client is gone");
    }

    #[tokio::test]
    async fn test_empty_generation() {
        let events = run(vec![]).await;
        assert_eq!(events.len(), 2);
        assert_eq!(payload(&events[0])["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[1], DONE_EVENT);
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_producer() {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        drop(rx);
        let endless = stream::iter((1..).map(|n| Ok("x".repeat(n)))).boxed();
        // Returns instead of looping forever once the first send fails.
        produce_chat_events(endless, StreamMeta::new("m"), tx).await;
    }
}
