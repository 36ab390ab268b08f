//! Streaming relay — turns the token-by-token model stream into a
//! server-sent-event stream while accumulating the full text.
//!
//! On upstream completion the accumulated text is persisted as exactly one
//! history record. On a mid-stream error a single error event is emitted and
//! nothing is persisted. Endpoints that promise a terminal sentinel get a
//! trailing `[DONE]` event in every case.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::llm_client::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Generation,
    Chat,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Generation => "generation",
            HistoryKind::Chat => "ai_chat",
        }
    }
}

/// Metadata captured before the stream opens; combined with the accumulated
/// text into one history record when the stream completes.
#[derive(Debug, Clone)]
pub struct HistoryDraft {
    pub username: String,
    pub kind: HistoryKind,
    pub requirements: Option<String>,
    pub context: Option<String>,
    pub message: Option<String>,
    pub test_cases: Option<String>,
    pub project_id: Option<Uuid>,
    pub requirement_id: Option<Uuid>,
    pub requirement_title: Option<String>,
}

impl HistoryDraft {
    pub fn new(username: String, kind: HistoryKind) -> Self {
        HistoryDraft {
            username,
            kind,
            requirements: None,
            context: None,
            message: None,
            test_cases: None,
            project_id: None,
            requirement_id: None,
            requirement_title: None,
        }
    }
}

/// Where completed streams are persisted. Passed into the relay explicitly so
/// the relay never reaches for a global handle — and so tests can observe
/// persistence without a database.
#[async_trait]
pub trait HistorySink: Send + Sync + 'static {
    async fn record(&self, draft: &HistoryDraft, full_text: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl HistorySink for PgPool {
    async fn record(&self, draft: &HistoryDraft, full_text: &str) -> anyhow::Result<()> {
        // Generation runs store the output as test_cases; chat turns keep the
        // test cases under discussion and store the output as response.
        let (test_cases, response) = match draft.kind {
            HistoryKind::Generation => (Some(full_text.to_string()), None),
            HistoryKind::Chat => (draft.test_cases.clone(), Some(full_text.to_string())),
        };

        sqlx::query(
            r#"
            INSERT INTO history
                (username, kind, test_cases, response, requirements, context,
                 message, project_id, requirement_id, requirement_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&draft.username)
        .bind(draft.kind.as_str())
        .bind(test_cases)
        .bind(response)
        .bind(&draft.requirements)
        .bind(&draft.context)
        .bind(&draft.message)
        .bind(draft.project_id)
        .bind(draft.requirement_id)
        .bind(&draft.requirement_title)
        .execute(self)
        .await?;

        Ok(())
    }
}

/// One frame of the relayed stream, before SSE encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Chunk(String),
    Error(String),
    Done,
}

impl RelayFrame {
    fn into_event(self) -> Event {
        match self {
            RelayFrame::Chunk(text) => {
                Event::default().data(json!({ "chunk": text }).to_string())
            }
            RelayFrame::Error(message) => {
                Event::default().data(json!({ "error": message }).to_string())
            }
            RelayFrame::Done => Event::default().data("[DONE]"),
        }
    }
}

/// Core relay loop. Re-emits each upstream fragment immediately; no buffering
/// beyond the accumulation needed for final persistence.
pub fn relay_frames<S: HistorySink>(
    sink: S,
    mut upstream: mpsc::Receiver<Result<String, LlmError>>,
    draft: HistoryDraft,
    emit_done: bool,
) -> impl Stream<Item = RelayFrame> {
    async_stream::stream! {
        let mut accumulated = String::new();
        let mut failed = false;

        while let Some(item) = upstream.recv().await {
            match item {
                Ok(chunk) => {
                    accumulated.push_str(&chunk);
                    yield RelayFrame::Chunk(chunk);
                }
                Err(e) => {
                    tracing::error!("LLM stream error: {e}");
                    failed = true;
                    yield RelayFrame::Error(e.to_string());
                    break;
                }
            }
        }

        if !failed {
            if let Err(e) = sink.record(&draft, &accumulated).await {
                // The client already has the text; losing the record is
                // logged, not surfaced.
                tracing::error!("Failed to persist history record: {e:?}");
            }
        }

        if emit_done {
            yield RelayFrame::Done;
        }
    }
}

/// SSE response wrapping `relay_frames`.
pub fn sse_response<S: HistorySink>(
    sink: S,
    upstream: mpsc::Receiver<Result<String, LlmError>>,
    draft: HistoryDraft,
    emit_done: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = relay_frames(sink, upstream, draft, emit_done);
    Sse::new(frames.map(|frame| Ok(frame.into_event()))).keep_alive(KeepAlive::new())
}

/// SSE response for failures occurring before the upstream stream opened
/// (key resolution, request rejection). Mirrors the mid-stream error shape.
pub fn sse_error(
    message: String,
    emit_done: bool,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(RelayFrame::Error(message).into_event());
        if emit_done {
            yield Ok(RelayFrame::Done.into_event());
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemorySink {
        records: Arc<Mutex<Vec<(HistoryDraft, String)>>>,
    }

    impl MemorySink {
        fn recorded(&self) -> Vec<(HistoryDraft, String)> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistorySink for MemorySink {
        async fn record(&self, draft: &HistoryDraft, full_text: &str) -> anyhow::Result<()> {
            self.records
                .lock()
                .unwrap()
                .push((draft.clone(), full_text.to_string()));
            Ok(())
        }
    }

    fn draft() -> HistoryDraft {
        HistoryDraft::new("alice".to_string(), HistoryKind::Generation)
    }

    #[tokio::test]
    async fn test_chunks_forwarded_in_order_and_recorded_once() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok("Hello".to_string())).await.unwrap();
        tx.send(Ok(" world".to_string())).await.unwrap();
        drop(tx);

        let sink = MemorySink::default();
        let frames: Vec<RelayFrame> =
            relay_frames(sink.clone(), rx, draft(), false).collect().await;

        assert_eq!(
            frames,
            vec![
                RelayFrame::Chunk("Hello".to_string()),
                RelayFrame::Chunk(" world".to_string()),
            ]
        );

        let records = sink.recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, "Hello world");
        assert_eq!(records[0].0.username, "alice");
    }

    #[tokio::test]
    async fn test_mid_stream_error_emits_one_error_and_no_record() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok("partial".to_string())).await.unwrap();
        tx.send(Err(LlmError::Api {
            status: 529,
            message: "overloaded".to_string(),
        }))
        .await
        .unwrap();
        drop(tx);

        let sink = MemorySink::default();
        let frames: Vec<RelayFrame> =
            relay_frames(sink.clone(), rx, draft(), false).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], RelayFrame::Chunk("partial".to_string()));
        assert!(matches!(&frames[1], RelayFrame::Error(msg) if msg.contains("overloaded")));

        assert!(sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_done_sentinel_always_terminates_when_requested() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Ok("hi".to_string())).await.unwrap();
        drop(tx);

        let sink = MemorySink::default();
        let frames: Vec<RelayFrame> =
            relay_frames(sink.clone(), rx, draft(), true).collect().await;
        assert_eq!(frames.last(), Some(&RelayFrame::Done));

        // Sentinel is emitted after an error too.
        let (tx, rx) = mpsc::channel(8);
        tx.send(Err(LlmError::MissingKey)).await.unwrap();
        drop(tx);

        let frames: Vec<RelayFrame> =
            relay_frames(sink.clone(), rx, draft(), true).collect().await;
        assert!(matches!(frames[0], RelayFrame::Error(_)));
        assert_eq!(frames.last(), Some(&RelayFrame::Done));
        assert!(sink.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_empty_upstream_records_empty_text() {
        let (tx, rx) = mpsc::channel::<Result<String, LlmError>>(1);
        drop(tx);

        let sink = MemorySink::default();
        let frames: Vec<RelayFrame> =
            relay_frames(sink.clone(), rx, draft(), false).collect().await;

        assert!(frames.is_empty());
        assert_eq!(sink.recorded().len(), 1);
        assert_eq!(sink.recorded()[0].1, "");
    }
}
