use crate::auth::TokenSource;
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::metadata::Descriptor;
use crate::playlist::{PlaylistApi, PlaylistPage, PlaylistSummary};
use crate::retry::Retry;
use crate::upload::{self, ChunkStatus, ResumableUpload};
use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::debug;

pub const WATCH_VIDEO_URL: &str = "https://www.youtube.com/watch?v=";

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_VIDEO_URL, video_id)
}

/// Base URLs of the data API and the media upload API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/youtube/v3".to_string(),
        }
    }
}

impl Endpoints {
    /// Both APIs served under one host, the way a local mock lays them out.
    pub fn with_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            api_base: format!("{}/youtube/v3", host),
            upload_base: format!("{}/upload/youtube/v3", host),
        }
    }
}

/// Authenticated handle on the YouTube APIs.
pub struct YouTubeClient {
    client: Client,
    endpoints: Endpoints,
    tokens: Arc<TokenSource>,
}

impl YouTubeClient {
    /// Client whose token is never renewed.
    pub fn new(endpoints: Endpoints, credential: &Credential) -> Result<Self> {
        Self::with_tokens(endpoints, Arc::new(TokenSource::fixed(credential.clone())))
    }

    pub fn with_tokens(endpoints: Endpoints, tokens: Arc<TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            endpoints,
            tokens,
        })
    }

    /// Opens a resumable session for `path`. Nothing is sent until the first chunk step.
    pub async fn resumable_session(
        &self,
        path: &Path,
        descriptor: &Descriptor,
        chunk_size: u64,
    ) -> Result<HttpResumableUpload> {
        let file = File::open(path).await?;
        let total = file.metadata().await?.len();
        Ok(HttpResumableUpload {
            client: self.client.clone(),
            tokens: Arc::clone(&self.tokens),
            init_url: format!("{}/videos", self.endpoints.upload_base),
            parts: descriptor.parts(),
            body: Value::Object(descriptor.body().clone()),
            media_type: media_type(path).to_string(),
            chunk_size: chunk_size.max(1),
            state: Mutex::new(SessionState {
                file,
                total,
                offset: 0,
                session_uri: None,
                resync: false,
                finished: false,
            }),
        })
    }

    pub async fn upload_video<P>(
        &self,
        path: &Path,
        descriptor: &Descriptor,
        chunk_size: u64,
        retry: &Retry,
        progress: P,
    ) -> Result<String>
    where
        P: FnMut(u64, u64),
    {
        let session = self.resumable_session(path, descriptor, chunk_size).await?;
        upload::upload(&session, retry, Some(progress)).await
    }

    pub async fn set_thumbnail(&self, video_id: &str, image: &Path) -> Result<()> {
        let bytes = tokio::fs::read(image).await?;
        let url = format!("{}/thumbnails/set", self.endpoints.upload_base);
        let response = send_authorized(&self.client, &self.tokens, |client| {
            client
                .post(&url)
                .query(&[("videoId", video_id)])
                .header(CONTENT_TYPE, media_type(image))
                .body(bytes.clone())
        })
        .await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn get_json(&self, url: String, query: &[(&str, &str)]) -> Result<Value> {
        let response = send_authorized(&self.client, &self.tokens, |client| {
            client.get(&url).query(query)
        })
        .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn post_json(&self, url: String, part: &str, body: &Value) -> Result<Value> {
        let response = send_authorized(&self.client, &self.tokens, |client| {
            client.post(&url).query(&[("part", part)]).json(body)
        })
        .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    id: String,
    #[serde(default)]
    snippet: PlaylistSnippet,
}

#[derive(Deserialize, Default)]
struct PlaylistSnippet {
    #[serde(default)]
    title: String,
}

#[async_trait]
impl PlaylistApi for YouTubeClient {
    async fn list_playlists(&self, page_token: Option<&str>) -> Result<PlaylistPage> {
        let mut query = vec![("mine", "true"), ("part", "id,snippet"), ("maxResults", "50")];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let value = self
            .get_json(format!("{}/playlists", self.endpoints.api_base), &query)
            .await?;
        let page: PlaylistListResponse = serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("unexpected playlist listing: {}", e)))?;
        Ok(PlaylistPage {
            items: page
                .items
                .into_iter()
                .map(|item| PlaylistSummary {
                    id: item.id,
                    title: item.snippet.title,
                })
                .collect(),
            next_page_token: page.next_page_token,
        })
    }

    async fn insert_playlist(&self, title: &str, privacy: &str) -> Result<Option<String>> {
        let body = json!({
            "snippet": { "title": title },
            "status": { "privacyStatus": privacy },
        });
        let response = self
            .post_json(
                format!("{}/playlists", self.endpoints.api_base),
                "snippet,status",
                &body,
            )
            .await?;
        Ok(response.get("id").and_then(Value::as_str).map(str::to_string))
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            }
        });
        self.post_json(
            format!("{}/playlistItems", self.endpoints.api_base),
            "snippet",
            &body,
        )
        .await?;
        Ok(())
    }
}

struct SessionState {
    file: File,
    total: u64,
    offset: u64,
    session_uri: Option<String>,
    /// Set while a step is in flight; a step that failed leaves it set.
    resync: bool,
    finished: bool,
}

/// Resumable upload over the HTTP protocol: one POST to open, one PUT per chunk.
pub struct HttpResumableUpload {
    client: Client,
    tokens: Arc<TokenSource>,
    init_url: String,
    parts: String,
    body: Value,
    media_type: String,
    chunk_size: u64,
    state: Mutex<SessionState>,
}

impl HttpResumableUpload {
    async fn initiate(&self, total: u64) -> Result<String> {
        let response = send_authorized(&self.client, &self.tokens, |client| {
            client
                .post(&self.init_url)
                .query(&[("uploadType", "resumable"), ("part", self.parts.as_str())])
                .header("X-Upload-Content-Length", total.to_string())
                .header("X-Upload-Content-Type", self.media_type.as_str())
                .json(&self.body)
        })
        .await?;
        let response = ensure_success(response).await?;
        let uri = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Protocol("Resumable session response has no Location header".into())
            })?;
        debug!(%uri, "opened resumable session");
        Ok(uri)
    }

    /// Asks the server how much of the file it holds.
    async fn query_status(&self, uri: &str, state: &mut SessionState) -> Result<ChunkStatus> {
        let range = format!("bytes */{}", state.total);
        let response = send_authorized(&self.client, &self.tokens, |client| {
            client
                .put(uri)
                .header(CONTENT_RANGE, range.as_str())
                .body(Vec::new())
        })
        .await?;
        interpret(response, state).await
    }

    async fn send_chunk(&self, uri: &str, state: &mut SessionState) -> Result<ChunkStatus> {
        let len = self.chunk_size.min(state.total.saturating_sub(state.offset));
        let mut chunk = vec![0u8; len as usize];
        state.file.seek(SeekFrom::Start(state.offset)).await?;
        state.file.read_exact(&mut chunk).await?;

        let range = if len == 0 {
            format!("bytes */{}", state.total)
        } else {
            format!(
                "bytes {}-{}/{}",
                state.offset,
                state.offset + len - 1,
                state.total
            )
        };
        debug!(%range, "sending chunk");
        let response = send_authorized(&self.client, &self.tokens, |client| {
            client
                .put(uri)
                .header(CONTENT_RANGE, range.as_str())
                .header(CONTENT_TYPE, self.media_type.as_str())
                .body(chunk.clone())
        })
        .await?;
        interpret(response, state).await
    }
}

#[async_trait]
impl ResumableUpload for HttpResumableUpload {
    async fn next_chunk(&self) -> Result<ChunkStatus> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.finished {
            return Err(Error::Protocol(
                "Upload session already returned its result".into(),
            ));
        }

        let uri = match &state.session_uri {
            Some(uri) => uri.clone(),
            None => {
                let uri = self.initiate(state.total).await?;
                state.session_uri = Some(uri.clone());
                uri
            }
        };

        if state.resync {
            debug!("resuming session after a failed step");
            if let status @ ChunkStatus::Complete(_) = self.query_status(&uri, state).await? {
                state.resync = false;
                return Ok(status);
            }
        }

        state.resync = true;
        let status = self.send_chunk(&uri, state).await?;
        state.resync = false;
        Ok(status)
    }
}

/// Sends with the current bearer token. A 401 renews the token and resends once.
async fn send_authorized<B>(client: &Client, tokens: &TokenSource, build: B) -> Result<Response>
where
    B: Fn(&Client) -> RequestBuilder,
{
    let token = tokens.bearer().await?;
    let response = build(client).bearer_auth(&token).send().await?;
    if response.status() != StatusCode::UNAUTHORIZED || !tokens.refresh_rejected(&token).await? {
        return Ok(response);
    }
    let token = tokens.bearer().await?;
    debug!("resending with renewed access token");
    Ok(build(client).bearer_auth(&token).send().await?)
}

async fn interpret(response: Response, state: &mut SessionState) -> Result<ChunkStatus> {
    let status = response.status();
    if status == StatusCode::PERMANENT_REDIRECT {
        let acknowledged = acknowledged_bytes(&response);
        state.offset = acknowledged;
        return Ok(ChunkStatus::Progress {
            total: state.total,
            uploaded: acknowledged,
        });
    }
    if status.is_success() {
        let text = response.text().await?;
        let document = serde_json::from_str(&text)
            .map_err(|e| Error::Protocol(format!("Unreadable upload response: {}", e)))?;
        state.finished = true;
        return Ok(ChunkStatus::Complete(document));
    }
    Err(Error::from_response(response).await)
}

/// Bytes the server holds, from a `Range: bytes=0-N` header.
fn acknowledged_bytes(response: &Response) -> u64 {
    response
        .headers()
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(_, last)| last.trim().parse::<u64>().ok())
        .map_or(0, |last| last + 1)
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(Error::from_response(response).await)
    }
}

fn media_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        Some("mpg") | Some("mpeg") => "video/mpeg",
        Some("3gp") => "video/3gpp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}
