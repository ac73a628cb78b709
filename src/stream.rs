//! Reduces a status-streaming (SSE) execute response to a single [`RunReply`].
//!
//! The platform's streaming mode pushes status events, not live content:
//! events carry `sessionInfo` updates and occasionally an `output` array, and
//! the final answer frequently has to be fetched from the run status endpoint
//! once the stream ends. The collector is a single forward pass with two
//! early exits (a `[DONE]` sentinel line and an `isLastEvent` flag) and one
//! post-loop fallback branch.
//!
//! Parsing and accumulation are synchronous and pure; the async driver owns
//! the byte stream and the fallback lookup, which is injected behind
//! [`StatusFetcher`] so the whole path runs against mocks in tests.

use async_trait::async_trait;
use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::api::SessionIdentityItem;
use crate::error::ApiError;
use crate::types::{ContentItem, RawEvent, RunReply, SessionInfo, StatusReply};

/// Literal payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One classified line of an event stream.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// `event: <name>`: control marker, no state change.
    Event(&'a str),
    /// `data: <payload>`: JSON event or the termination sentinel.
    Data(&'a str),
    /// Anything else (comments, noise).
    Other(&'a str),
}

pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    if let Some(name) = line.strip_prefix("event: ") {
        SseLine::Event(name.trim())
    } else if let Some(payload) = line.strip_prefix("data: ") {
        SseLine::Data(payload)
    } else {
        SseLine::Other(line)
    }
}

/// Issues the fallback run-status lookup. Implemented by the API client;
/// mocked in tests.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch_status(
        &self,
        run_id: &str,
        session_identity: Option<Vec<SessionIdentityItem>>,
    ) -> Result<StatusReply, ApiError>;
}

/// Accumulator for one pass over the stream. Append-only and
/// order-preserving; feed lines in arrival order.
#[derive(Debug, Default)]
pub struct StreamCollector {
    collected: Vec<String>,
    run_id: Option<String>,
    session_info: Option<SessionInfo>,
    lines_seen: usize,
    finished: bool,
}

/// What a drained stream left behind.
#[derive(Debug)]
pub struct CollectedStream {
    pub content: String,
    pub run_id: Option<String>,
    pub session_info: Option<SessionInfo>,
}

impl StreamCollector {
    /// Feed one line. Returns `true` once the stream signalled completion;
    /// no further lines should be read.
    pub fn push_line(&mut self, line: &str) -> bool {
        self.lines_seen += 1;
        if line.is_empty() {
            return false;
        }
        match parse_sse_line(line) {
            SseLine::Event(name) => {
                debug!(event = name, "sse event marker");
            }
            SseLine::Data(payload) => {
                let payload = payload.trim();
                if payload == DONE_SENTINEL {
                    debug!(lines = self.lines_seen, "received [DONE] sentinel");
                    self.finished = true;
                } else {
                    match serde_json::from_str::<RawEvent>(payload) {
                        Ok(event) => self.apply(event),
                        Err(e) => {
                            warn!(error = %e, "skipping undecodable sse payload");
                        }
                    }
                }
            }
            SseLine::Other(text) => {
                debug!(line = text, "ignoring non-sse line");
            }
        }
        self.finished
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn apply(&mut self, event: RawEvent) {
        if let Some(info) = event.session_info {
            if let Some(run_id) = &info.run_id {
                debug!(run_id = %run_id, "captured run id");
                self.run_id = Some(run_id.clone());
            }
            self.session_info = Some(info);
        }
        if let Some(items) = event.output {
            for item in items {
                if item.is_text() && !item.content.is_empty() {
                    self.collected.push(item.content);
                }
            }
        }
        if event.is_last_event {
            debug!(lines = self.lines_seen, "received isLastEvent");
            self.finished = true;
        }
    }

    pub fn finish(self) -> CollectedStream {
        debug!(
            lines = self.lines_seen,
            items = self.collected.len(),
            "stream drained"
        );
        CollectedStream {
            content: self.collected.concat(),
            run_id: self.run_id,
            session_info: self.session_info,
        }
    }
}

/// Consume a streaming execute response and reduce it to one [`RunReply`].
///
/// The byte stream is split into lines internally, so the outcome does not
/// depend on how the transport chunked the body. Transport errors, whether
/// while reading the stream or during the fallback status call, abort the
/// whole collection; already-accumulated content is discarded.
pub async fn collect_streaming_reply<S, B, E>(
    byte_stream: S,
    fetcher: &dyn StatusFetcher,
) -> Result<RunReply, ApiError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    pin_mut!(byte_stream);
    let mut collector = StreamCollector::default();
    let mut buf = String::new();

    'read: while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(|e| ApiError::StreamProcessing(e.to_string()))?;
        buf.push_str(&String::from_utf8_lossy(chunk.as_ref()));
        while let Some(pos) = buf.find('\n') {
            let line: String = buf.drain(..=pos).collect();
            if collector.push_line(line.trim_end_matches(['\n', '\r'])) {
                break 'read;
            }
        }
    }
    // A final line may arrive without a terminating newline.
    if !collector.is_finished() && !buf.is_empty() {
        collector.push_line(buf.trim_end_matches('\r'));
    }

    resolve(collector.finish(), fetcher).await
}

async fn resolve(
    collected: CollectedStream,
    fetcher: &dyn StatusFetcher,
) -> Result<RunReply, ApiError> {
    if collected.content.is_empty() {
        if let (Some(run_id), Some(info)) = (&collected.run_id, &collected.session_info) {
            info!(run_id = %run_id, "stream carried no content, fetching run output");
            let identity = info
                .session_reference
                .as_deref()
                .map(|r| vec![SessionIdentityItem::session_reference(r)]);
            let status = fetcher
                .fetch_status(run_id, identity)
                .await
                .map_err(|e| ApiError::StreamProcessing(e.to_string()))?;
            if let Some(output) = status.run_output() {
                if !output.is_empty() {
                    return Ok(RunReply {
                        output: output.to_vec(),
                        session_info: Some(info.clone()),
                        streaming: true,
                        ..Default::default()
                    });
                }
            }
            warn!(run_id = %run_id, "status reply carried no run output");
        }
        warn!("no content collected from stream or status endpoint");
        return Ok(RunReply {
            streaming: true,
            ..Default::default()
        });
    }

    Ok(RunReply {
        output: vec![ContentItem::text(collected.content)],
        streaming: true,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::convert::Infallible;
    use tokio::sync::Mutex;

    // --- Mock status fetcher ---

    struct MockFetcher {
        calls: Mutex<Vec<(String, Option<Vec<SessionIdentityItem>>)>>,
        replies: Mutex<VecDeque<Result<StatusReply, ApiError>>>,
    }

    impl MockFetcher {
        fn new(replies: Vec<Result<StatusReply, ApiError>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into_iter().collect()),
            }
        }

        fn unused() -> Self {
            Self::new(vec![])
        }

        async fn calls(&self) -> Vec<(String, Option<Vec<SessionIdentityItem>>)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl StatusFetcher for MockFetcher {
        async fn fetch_status(
            &self,
            run_id: &str,
            session_identity: Option<Vec<SessionIdentityItem>>,
        ) -> Result<StatusReply, ApiError> {
            self.calls
                .lock()
                .await
                .push((run_id.to_string(), session_identity));
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(ApiError::Request("no more mock replies".into())))
        }
    }

    // --- Helpers ---

    fn joined(lines: &[&str]) -> String {
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    fn one_chunk(lines: &[&str]) -> impl Stream<Item = Result<String, Infallible>> {
        futures::stream::iter(vec![Ok(joined(lines))])
    }

    fn chunked(text: &str, size: usize) -> impl Stream<Item = Result<String, Infallible>> {
        let chunks: Vec<Result<String, Infallible>> = text
            .as_bytes()
            .chunks(size)
            .map(|c| Ok(String::from_utf8_lossy(c).into_owned()))
            .collect();
        futures::stream::iter(chunks)
    }

    fn late_status_reply() -> StatusReply {
        serde_json::from_value(json!({
            "run": {"kwargs": {"output": [{"type": "text", "content": "late"}]}},
        }))
        .unwrap()
    }

    // --- Line parser ---

    #[test]
    fn parse_classifies_lines() {
        assert_eq!(parse_sse_line("event: message"), SseLine::Event("message"));
        assert_eq!(parse_sse_line("data: {}"), SseLine::Data("{}"));
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Data("[DONE]"));
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Other(": keep-alive"));
    }

    // --- Pure collector ---

    #[test]
    fn collector_accumulates_text_in_order() {
        let mut collector = StreamCollector::default();
        assert!(!collector.push_line(r#"data: {"output":[{"type":"text","content":"Hel"}]}"#));
        assert!(!collector.push_line(""));
        assert!(!collector.push_line(r#"data: {"output":[{"type":"text","content":"lo"}]}"#));
        assert_eq!(collector.finish().content, "Hello");
    }

    #[test]
    fn collector_skips_empty_and_non_text_items() {
        let mut collector = StreamCollector::default();
        collector.push_line(
            r#"data: {"output":[{"type":"text","content":""},{"type":"image","content":"x"},{"type":"text","content":"ok"}]}"#,
        );
        assert_eq!(collector.finish().content, "ok");
    }

    #[test]
    fn collector_keeps_last_session_info_and_earlier_run_id() {
        let mut collector = StreamCollector::default();
        collector.push_line(r#"data: {"sessionInfo":{"runId":"r1","sessionReference":"s1"}}"#);
        collector.push_line(r#"data: {"sessionInfo":{"sessionReference":"s2"}}"#);
        let collected = collector.finish();
        assert_eq!(collected.run_id.as_deref(), Some("r1"));
        assert_eq!(
            collected.session_info.unwrap().session_reference.as_deref(),
            Some("s2")
        );
    }

    #[test]
    fn collector_stops_on_done_sentinel() {
        let mut collector = StreamCollector::default();
        assert!(collector.push_line("data: [DONE]"));
        assert!(collector.is_finished());
    }

    #[test]
    fn collector_stops_on_last_event_flag() {
        let mut collector = StreamCollector::default();
        assert!(collector.push_line(r#"data: {"isLastEvent":true}"#));
    }

    // --- Async driver ---

    #[tokio::test]
    async fn content_concatenated_across_events() {
        let lines = [
            r#"data: {"output":[{"type":"text","content":"Hel"}]}"#,
            r#"data: {"output":[{"type":"text","content":"lo"}]}"#,
            "data: [DONE]",
        ];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "output": [{"type": "text", "content": "Hello"}],
                "streaming": true,
            })
        );
        assert!(fetcher.calls().await.is_empty());
    }

    #[tokio::test]
    async fn content_independent_of_chunk_boundaries() {
        let lines = [
            "event: message",
            "",
            r#"data: {"output":[{"type":"text","content":"Hel"}]}"#,
            "",
            r#"data: {"output":[{"type":"text","content":"lo"}]}"#,
            "data: [DONE]",
        ];
        let text = joined(&lines);
        for size in [1, 3, 7, text.len()] {
            let fetcher = MockFetcher::unused();
            let reply = collect_streaming_reply(chunked(&text, size), &fetcher)
                .await
                .unwrap();
            assert_eq!(reply.text(), "Hello", "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn done_sentinel_stops_consumption() {
        let lines = [
            r#"data: {"output":[{"type":"text","content":"kept"}]}"#,
            "data: [DONE]",
            r#"data: {"output":[{"type":"text","content":"never"}]}"#,
        ];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "kept");
    }

    #[tokio::test]
    async fn last_event_flag_halts_even_with_more_lines() {
        let lines = [
            r#"data: {"output":[{"type":"text","content":"first"}],"isLastEvent":true}"#,
            r#"data: {"output":[{"type":"text","content":"second"}]}"#,
        ];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "first");
    }

    #[tokio::test]
    async fn empty_stream_falls_back_to_status_endpoint() {
        let lines = [
            r#"data: {"sessionInfo":{"runId":"r1","sessionReference":"s1"}}"#,
            r#"data: {"isLastEvent":true}"#,
        ];
        let fetcher = MockFetcher::new(vec![Ok(late_status_reply())]);
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "late");
        assert!(reply.streaming);
        let info = reply.session_info.unwrap();
        assert_eq!(info.run_id.as_deref(), Some("r1"));

        let calls = fetcher.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "r1");
        assert_eq!(
            calls[0].1,
            Some(vec![SessionIdentityItem::session_reference("s1")])
        );
    }

    #[tokio::test]
    async fn fallback_without_session_reference_sends_no_identity() {
        let lines = [r#"data: {"sessionInfo":{"runId":"r1"},"isLastEvent":true}"#];
        let fetcher = MockFetcher::new(vec![Ok(late_status_reply())]);
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "late");
        assert_eq!(fetcher.calls().await[0].1, None);
    }

    #[tokio::test]
    async fn fallback_without_output_yields_empty_result() {
        let lines = [r#"data: {"sessionInfo":{"runId":"r1","sessionReference":"s1"},"isLastEvent":true}"#];
        let empty: StatusReply =
            serde_json::from_value(json!({"run": {"kwargs": {"output": []}}})).unwrap();
        let fetcher = MockFetcher::new(vec![Ok(empty)]);
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert!(reply.output.is_empty());
        assert!(reply.streaming);
        assert_eq!(fetcher.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn no_run_id_skips_fallback() {
        let lines = [r#"data: {"isLastEvent":true}"#];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert!(reply.output.is_empty());
        assert!(fetcher.calls().await.is_empty());
    }

    #[tokio::test]
    async fn stream_content_suppresses_fallback() {
        let lines = [
            r#"data: {"sessionInfo":{"runId":"r1","sessionReference":"s1"}}"#,
            r#"data: {"output":[{"type":"text","content":"inline"}],"isLastEvent":true}"#,
        ];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "inline");
        assert!(fetcher.calls().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_does_not_abort_stream() {
        let lines = [
            "data: {not json",
            r#"data: {"output":"wrong shape"}"#,
            r#"data: {"output":[{"type":"text","content":"still here"}]}"#,
            "data: [DONE]",
        ];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "still here");
    }

    #[tokio::test]
    async fn fallback_error_surfaces_as_stream_processing() {
        let lines = [r#"data: {"sessionInfo":{"runId":"r1","sessionReference":"s1"},"isLastEvent":true}"#];
        let fetcher = MockFetcher::new(vec![Err(ApiError::RunNotFound("r1".into()))]);
        let err = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::StreamProcessing(_)));
        assert!(err.to_string().contains("r1"));
    }

    #[tokio::test]
    async fn transport_error_aborts_collection() {
        let chunks: Vec<Result<String, String>> = vec![
            Ok(joined(&[r#"data: {"output":[{"type":"text","content":"partial"}]}"#])),
            Err("connection reset".into()),
        ];
        let fetcher = MockFetcher::unused();
        let err = collect_streaming_reply(futures::stream::iter(chunks), &fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::StreamProcessing(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn crlf_lines_are_handled() {
        let text = "data: {\"output\":[{\"type\":\"text\",\"content\":\"ok\"}]}\r\ndata: [DONE]\r\n";
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(chunked(text, 5), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "ok");
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_processed() {
        let text = r#"data: {"output":[{"type":"text","content":"tail"}]}"#;
        let fetcher = MockFetcher::unused();
        let reply =
            collect_streaming_reply(futures::stream::iter(vec![Ok::<_, Infallible>(text.to_string())]), &fetcher)
                .await
                .unwrap();
        assert_eq!(reply.text(), "tail");
    }

    #[tokio::test]
    async fn natural_stream_close_without_terminator() {
        let lines = [
            r#"data: {"output":[{"type":"text","content":"open"}]}"#,
            r#"data: {"output":[{"type":"text","content":" ended"}]}"#,
        ];
        let fetcher = MockFetcher::unused();
        let reply = collect_streaming_reply(one_chunk(&lines), &fetcher)
            .await
            .unwrap();
        assert_eq!(reply.text(), "open ended");
    }
}
