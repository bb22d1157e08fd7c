use crate::error::{Error, Result, TransportKind};
use crate::retry::Retry;
use crate::upload::{upload, ChunkStatus, ResumableUpload};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays scripted chunk outcomes and counts how often it was asked.
struct ScriptedSession {
    steps: Mutex<VecDeque<Result<ChunkStatus>>>,
    calls: Mutex<usize>,
}

impl ScriptedSession {
    fn new(steps: Vec<Result<ChunkStatus>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ResumableUpload for ScriptedSession {
    async fn next_chunk(&self) -> Result<ChunkStatus> {
        *self.calls.lock().unwrap() += 1;
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Protocol("script exhausted".into())))
    }
}

fn progress(uploaded: u64) -> Result<ChunkStatus> {
    Ok(ChunkStatus::Progress {
        total: 300,
        uploaded,
    })
}

fn reset() -> Result<ChunkStatus> {
    Err(Error::Transport {
        kind: TransportKind::Socket,
        message: "connection reset by peer".into(),
    })
}

#[tokio::test]
async fn test_progress_then_id() {
    let session = ScriptedSession::new(vec![
        progress(100),
        progress(200),
        progress(300),
        Ok(ChunkStatus::Complete(json!({"id": "abc123", "kind": "youtube#video"}))),
    ]);

    let mut seen = Vec::new();
    let id = upload(&session, &Retry::new(Some(10)), Some(|total, done| seen.push((total, done))))
        .await
        .unwrap();

    assert_eq!(id, "abc123");
    assert_eq!(seen, vec![(300, 100), (300, 200), (300, 300)]);
    assert!(seen.windows(2).all(|pair| pair[0].1 <= pair[1].1));
}

#[tokio::test]
async fn test_without_progress_callback() {
    let session = ScriptedSession::new(vec![
        progress(150),
        Ok(ChunkStatus::Complete(json!({"id": "xyz"}))),
    ]);
    let id = upload(&session, &Retry::new(Some(10)), None::<fn(u64, u64)>)
        .await
        .unwrap();
    assert_eq!(id, "xyz");
}

#[tokio::test]
async fn test_terminal_document_without_id_is_protocol_violation() {
    let session = ScriptedSession::new(vec![
        progress(300),
        Ok(ChunkStatus::Complete(json!({"kind": "youtube#video"}))),
    ]);
    let err = upload(&session, &Retry::new(Some(10)), None::<fn(u64, u64)>)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
    assert_eq!(session.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_resumes_same_session() {
    let session = ScriptedSession::new(vec![
        progress(100),
        reset(),
        Err(Error::Http {
            status: 503,
            body: "backend error".into(),
        }),
        progress(200),
        progress(300),
        Ok(ChunkStatus::Complete(json!({"id": "abc123"}))),
    ]);

    let mut seen = Vec::new();
    let id = upload(&session, &Retry::new(Some(10)), Some(|_, done| seen.push(done)))
        .await
        .unwrap();

    assert_eq!(id, "abc123");
    assert_eq!(seen, vec![100, 200, 300]);
    assert_eq!(session.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_last_error() {
    let session = ScriptedSession::new(vec![progress(100), reset(), reset(), reset()]);
    let err = upload(&session, &Retry::new(Some(2)), None::<fn(u64, u64)>)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Transport {
            kind: TransportKind::Socket,
            ..
        }
    ));
    assert_eq!(session.calls(), 4);
}

#[tokio::test]
async fn test_client_error_mid_upload_is_not_retried() {
    let session = ScriptedSession::new(vec![
        progress(100),
        Err(Error::Http {
            status: 401,
            body: "Invalid Credentials".into(),
        }),
        progress(200),
    ]);
    let err = upload(&session, &Retry::new(Some(10)), None::<fn(u64, u64)>)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http { status: 401, .. }));
    assert_eq!(session.calls(), 2);
}
