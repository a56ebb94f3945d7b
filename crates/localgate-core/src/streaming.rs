//! Cumulative snapshot to delta conversion.
//!
//! Model runtimes report progress as cumulative snapshots: every item is the
//! full response generated so far. Clients want only the new text. The
//! adapter remembers how much it has already forwarded and yields the
//! remainder of each snapshot, dropping snapshots that add nothing.
//!
//! Each snapshot is assumed to extend the previous one. A snapshot that is
//! shorter than what was already forwarded (or does not split on a
//! character boundary at that point) yields nothing.

use futures_util::{Stream, StreamExt, future};

/// Tracks how much of the cumulative response has been forwarded.
#[derive(Debug, Clone, Default)]
pub struct DeltaTracker {
    last_len: usize,
}

impl DeltaTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { last_len: 0 }
    }

    /// Return the part of `snapshot` not forwarded yet, if any.
    pub fn advance(&mut self, snapshot: &str) -> Option<String> {
        let delta = snapshot.get(self.last_len..)?;
        if delta.is_empty() {
            return None;
        }
        self.last_len = snapshot.len();
        Some(delta.to_string())
    }

    /// Bytes of the response forwarded so far.
    #[must_use]
    pub const fn forwarded_len(&self) -> usize {
        self.last_len
    }
}

/// Convert a stream of cumulative snapshots into a stream of non-empty deltas.
///
/// Errors are passed through unchanged and in order.
pub fn into_deltas<S, E>(snapshots: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<String, E>>,
{
    let mut tracker = DeltaTracker::new();
    snapshots.filter_map(move |item| {
        let out = match item {
            Ok(snapshot) => tracker.advance(&snapshot).map(Ok),
            Err(e) => Some(Err(e)),
        };
        future::ready(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    async fn deltas_of(snapshots: &[&str]) -> Vec<String> {
        let input = stream::iter(
            snapshots
                .iter()
                .map(|s| Ok::<_, ()>((*s).to_string()))
                .collect::<Vec<_>>(),
        );
        into_deltas(input)
            .map(|d| d.unwrap())
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_cumulative_snapshots_become_deltas() {
        let deltas = deltas_of(&["Hi", "Hi there", "Hi there!"]).await;
        assert_eq!(deltas, vec!["Hi", " there", "!"]);
    }

    #[tokio::test]
    async fn test_repeated_snapshot_yields_nothing() {
        let deltas = deltas_of(&["Hi", "Hi there", "Hi there!", "Hi there!"]).await;
        assert_eq!(deltas, vec!["Hi", " there", "!"]);
    }

    #[tokio::test]
    async fn test_empty_snapshots_are_filtered() {
        let deltas = deltas_of(&["", "", "a", "ab"]).await;
        assert_eq!(deltas, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_multibyte_text() {
        let deltas = deltas_of(&["안", "안녕", "안녕하세요"]).await;
        assert_eq!(deltas, vec!["안", "녕", "하세요"]);
        assert_eq!(deltas.concat(), "안녕하세요");
    }

    #[tokio::test]
    async fn test_shrinking_snapshot_is_skipped() {
        let deltas = deltas_of(&["Hello", "He", "Hello world"]).await;
        assert_eq!(deltas, vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_errors_pass_through_in_order() {
        let input = stream::iter(vec![
            Ok("a".to_string()),
            Ok("ab".to_string()),
            Err("boom"),
            Ok("abc".to_string()),
        ]);
        let items: Vec<_> = into_deltas(input).collect().await;
        assert_eq!(
            items,
            vec![
                Ok("a".to_string()),
                Ok("b".to_string()),
                Err("boom"),
                Ok("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_tracker_counts_forwarded_bytes() {
        let mut tracker = DeltaTracker::new();
        assert_eq!(tracker.advance("abc").as_deref(), Some("abc"));
        assert_eq!(tracker.forwarded_len(), 3);
        assert_eq!(tracker.advance("abc"), None);
        assert_eq!(tracker.forwarded_len(), 3);
    }
}
