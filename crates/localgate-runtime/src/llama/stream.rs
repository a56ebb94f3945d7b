//! llama-server `/completion` SSE parsing.
//!
//! llama-server streams `data: {"content":"...","stop":false}` lines with
//! one fragment each. The session expects cumulative snapshots, so the
//! fragments are accumulated and every non-empty fragment yields the text
//! so far. A body that ends before `stop` or `[DONE]` is a truncated
//! response and fails the stream.

use std::fmt;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use localgate_core::ModelError;

/// Failure reported when the body ends without a terminal event.
pub(crate) const STREAM_ENDED_EARLY: &str = "stream ended early";

/// One decoded SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    /// A text fragment; `stop` marks the last event of the response.
    Content { text: String, stop: bool },
    /// Explicit end of stream.
    Done,
    /// The server reported an error mid-stream.
    Error(String),
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Find the end of the next complete line (including the newline).
fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

/// Decode one SSE line. Returns `None` for blank lines, comments and
/// payloads that are not completion chunks.
pub(crate) fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed.strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let chunk: CompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("Skipping unparseable SSE payload: {e}");
            return None;
        }
    };

    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Some(SseEvent::Error(message));
    }

    Some(SseEvent::Content {
        text: chunk.content,
        stop: chunk.stop,
    })
}

/// Turn a llama-server SSE byte stream into cumulative text snapshots.
pub(crate) fn cumulative_snapshots<S, E>(
    bytes: S,
) -> impl Stream<Item = Result<String, ModelError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    async_stream::try_stream! {
        let mut bytes = bytes.boxed();
        let mut buf = BytesMut::new();
        let mut text = String::new();
        let mut finished = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| ModelError::Generation(e.to_string()))?;
            buf.extend_from_slice(&chunk);

            while let Some(line_end) = find_newline(&buf) {
                let line = buf.split_to(line_end);
                let line = String::from_utf8_lossy(&line);

                match parse_sse_line(&line) {
                    Some(SseEvent::Content { text: fragment, stop }) => {
                        if !fragment.is_empty() {
                            text.push_str(&fragment);
                            yield text.clone();
                        }
                        if stop {
                            finished = true;
                            break 'read;
                        }
                    }
                    Some(SseEvent::Done) => {
                        finished = true;
                        break 'read;
                    }
                    Some(SseEvent::Error(message)) => {
                        Err::<(), _>(ModelError::Generation(message))?;
                    }
                    None => {}
                }
            }
        }

        if !finished {
            Err::<(), _>(ModelError::Generation(STREAM_ENDED_EARLY.to_string()))?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    async fn snapshots_of(chunks: &[&str]) -> Vec<Result<String, ModelError>> {
        let items: Vec<Result<Bytes, std::io::Error>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from((*c).to_string())))
            .collect();
        cumulative_snapshots(stream::iter(items)).collect().await
    }

    #[test]
    fn test_parse_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(
            parse_sse_line("data: {\"content\":\"Hi\",\"stop\":false}"),
            Some(SseEvent::Content {
                text: "Hi".into(),
                stop: false
            })
        );
        assert_eq!(
            parse_sse_line("data:{\"content\":\"\",\"stop\":true}"),
            Some(SseEvent::Content {
                text: String::new(),
                stop: true
            })
        );
        assert_eq!(
            parse_sse_line("data: {\"error\":{\"message\":\"context full\"}}"),
            Some(SseEvent::Error("context full".into()))
        );
    }

    #[tokio::test]
    async fn test_fragments_accumulate() {
        let out = snapshots_of(&[
            "data: {\"content\":\"Hi\"}\n\n",
            "data: {\"content\":\" there\"}\n\ndata: {\"content\":\"!\"}\n\n",
            "data: {\"content\":\"\",\"stop\":true}\n\n",
        ])
        .await;
        let out: Vec<String> = out.into_iter().map(Result::unwrap).collect();
        assert_eq!(out, vec!["Hi", "Hi there", "Hi there!"]);
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let out = snapshots_of(&["data: {\"con", "tent\":\"안녕\"}\n", "\ndata: [DONE]\n"]).await;
        assert_eq!(out, vec![Ok("안녕".to_string())]);
    }

    #[tokio::test]
    async fn test_stop_ends_stream() {
        let out = snapshots_of(&[
            "data: {\"content\":\"a\",\"stop\":true}\n\n",
            "data: {\"content\":\"ignored\"}\n\n",
        ])
        .await;
        assert_eq!(out, vec![Ok("a".to_string())]);
    }

    #[tokio::test]
    async fn test_body_ending_without_stop_is_truncated() {
        let out = snapshots_of(&[
            "data: {\"content\":\"Hel\"}\n\n",
            "data: {\"content\":\"lo\"}\n\n",
        ])
        .await;
        assert_eq!(
            out,
            vec![
                Ok("Hel".to_string()),
                Ok("Hello".to_string()),
                Err(ModelError::Generation(STREAM_ENDED_EARLY.into()))
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_truncated() {
        let out = snapshots_of(&[]).await;
        assert_eq!(
            out,
            vec![Err(ModelError::Generation(STREAM_ENDED_EARLY.into()))]
        );
    }

    #[tokio::test]
    async fn test_server_error_fails_stream() {
        let out = snapshots_of(&[
            "data: {\"content\":\"a\"}\n\n",
            "data: {\"error\":{\"message\":\"slot unavailable\"}}\n\n",
        ])
        .await;
        assert_eq!(
            out,
            vec![
                Ok("a".to_string()),
                Err(ModelError::Generation("slot unavailable".into()))
            ]
        );
    }
}
