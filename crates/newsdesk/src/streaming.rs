//! Buffer-and-flush aggregation of streamed model output.
//!
//! Deltas are appended to a running buffer. Whenever the buffer ends on a
//! paragraph break the whole buffer is emitted, and the final buffer is always
//! emitted once the stream ends. Consumers replace what they displayed with
//! each emitted value rather than appending it.

use async_stream::try_stream;
use futures::{Stream, StreamExt};

pub const FLUSH_BOUNDARY: &str = "\n\n";

/// Append `delta` to `buffer`, returning the text to emit (if the new buffer
/// ends on a flush boundary) and the new buffer.
///
/// Empty deltas never emit, so a buffer already flushed is not flushed twice.
pub fn push_delta(mut buffer: String, delta: &str) -> (Option<String>, String) {
    if delta.is_empty() {
        return (None, buffer);
    }
    buffer.push_str(delta);
    let emit = buffer.ends_with(FLUSH_BOUNDARY).then(|| buffer.clone());
    (emit, buffer)
}

/// Turn a stream of text deltas into a stream of cumulative strings.
///
/// An error from the underlying stream is yielded and ends the output.
pub fn flush_on_paragraphs<S, E>(deltas: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<String, E>>,
{
    try_stream! {
        futures::pin_mut!(deltas);
        let mut buffer = String::new();
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            let (emit, next) = push_delta(buffer, &delta);
            buffer = next;
            if let Some(text) = emit {
                yield text;
            }
        }
        if !buffer.is_empty() {
            yield buffer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_push_delta_emits_on_paragraph_break() {
        let (emit, buffer) = push_delta(String::new(), "# Top headlines\n");
        assert_eq!(emit, None);
        let (emit, buffer) = push_delta(buffer, "\n");
        assert_eq!(emit.as_deref(), Some("# Top headlines\n\n"));
        let (emit, buffer) = push_delta(buffer, "Markets rallied.");
        assert_eq!(emit, None);
        assert_eq!(buffer, "# Top headlines\n\nMarkets rallied.");
    }

    #[test]
    fn test_push_delta_ignores_empty_delta() {
        let (emit, buffer) = push_delta("done\n\n".to_string(), "");
        assert_eq!(emit, None);
        assert_eq!(buffer, "done\n\n");
    }

    #[test]
    fn test_push_delta_single_newline_is_not_a_boundary() {
        let (emit, _) = push_delta("line one".to_string(), "\nline two\n");
        assert_eq!(emit, None);
    }

    async fn collect(deltas: Vec<&str>) -> Vec<String> {
        let input = stream::iter(
            deltas
                .into_iter()
                .map(|d| Ok::<_, std::io::Error>(d.to_string())),
        );
        flush_on_paragraphs(input)
            .map(|item| item.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_flush_yields_cumulative_prefixes() {
        let emitted = collect(vec!["Para one.", "\n\n", "Para two", ".\n\n", "Tail"]).await;
        assert_eq!(
            emitted,
            vec![
                "Para one.\n\n",
                "Para one.\n\nPara two.\n\n",
                "Para one.\n\nPara two.\n\nTail",
            ]
        );
        for pair in emitted.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
    }

    #[tokio::test]
    async fn test_break_inside_a_delta_does_not_flush() {
        let emitted = collect(vec!["Para one.\n\nPara two", " continues."]).await;
        assert_eq!(emitted, vec!["Para one.\n\nPara two continues."]);
    }

    #[tokio::test]
    async fn test_final_buffer_always_emitted() {
        let emitted = collect(vec!["All in one paragraph.\n\n"]).await;
        assert_eq!(
            emitted,
            vec!["All in one paragraph.\n\n", "All in one paragraph.\n\n"]
        );

        let emitted = collect(vec!["No", " break"]).await;
        assert_eq!(emitted, vec!["No break"]);
    }

    #[tokio::test]
    async fn test_empty_stream_emits_nothing() {
        assert!(collect(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let input = stream::iter(vec![
            Ok("first\n\n".to_string()),
            Err("backend went away"),
            Ok("never".to_string()),
        ]);
        let items: Vec<Result<String, &str>> = flush_on_paragraphs(input).collect().await;
        assert_eq!(items, vec![Ok("first\n\n".to_string()), Err("backend went away")]);
    }
}
