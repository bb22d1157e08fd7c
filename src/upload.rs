use crate::error::{Error, Result};
use crate::retry::Retry;
use async_trait::async_trait;
use serde_json::Value;

/// Default chunk size: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default bound on retries of a single chunk step.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkStatus {
    /// The server acknowledged `uploaded` of `total` bytes.
    Progress { total: u64, uploaded: u64 },
    /// The server returned its final resource document.
    Complete(Value),
}

/// A server-tracked upload transaction that advances one chunk per call.
#[async_trait]
pub trait ResumableUpload: Send + Sync {
    async fn next_chunk(&self) -> Result<ChunkStatus>;
}

/// Drives `session` to completion and returns the created resource id.
///
/// Every step runs under `retry`, so a transient failure resumes the same session.
pub async fn upload<S, P>(session: &S, retry: &Retry, mut progress: Option<P>) -> Result<String>
where
    S: ResumableUpload + ?Sized,
    P: FnMut(u64, u64),
{
    loop {
        let status = retry
            .execute(move || session.next_chunk(), Error::is_retriable)
            .await?;
        match status {
            ChunkStatus::Progress { total, uploaded } => {
                if let Some(callback) = progress.as_mut() {
                    callback(total, uploaded);
                }
            }
            ChunkStatus::Complete(response) => return resource_id(&response),
        }
    }
}

fn resource_id(response: &Value) -> Result<String> {
    response
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Protocol("Expected field 'id' not found in response".into()))
}
