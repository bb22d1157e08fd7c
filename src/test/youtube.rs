use crate::auth::{Authorizer, ClientSecrets, TokenSource};
use crate::credentials::{Credential, CredentialStore};
use crate::error::Error;
use crate::metadata::Descriptor;
use crate::playlist::attach;
use crate::retry::Retry;
use crate::upload::{ChunkStatus, ResumableUpload};
use crate::youtube::{watch_url, Endpoints, YouTubeClient};
use mockito::{Matcher, Server};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const CONTENT: &[u8] = b"0123456789abcdefghijABCDEFGHIJ";

fn client(server: &Server) -> YouTubeClient {
    let credential = Credential {
        access_token: "ya29.token".into(),
        refresh_token: None,
        expires_at: None,
        scopes: Vec::new(),
    };
    YouTubeClient::new(Endpoints::with_host(&server.url()), &credential).unwrap()
}

fn descriptor() -> Descriptor {
    let body = json!({
        "snippet": {"title": "T", "categoryId": "10"},
        "status": {"privacyStatus": "public"},
    });
    match body {
        serde_json::Value::Object(map) => Descriptor::new(map),
        _ => unreachable!(),
    }
}

fn video() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    std::fs::write(&path, CONTENT).unwrap();
    (dir, path)
}

async fn open_session(server: &mut Server) -> mockito::Mock {
    let location = format!("{}/upload/session/s1", server.url());
    server
        .mock("POST", "/upload/youtube/v3/videos")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("uploadType".into(), "resumable".into()),
            Matcher::UrlEncoded("part".into(), "snippet,status".into()),
        ]))
        .match_header("authorization", "Bearer ya29.token")
        .match_header("x-upload-content-length", "30")
        .match_header("x-upload-content-type", "video/mp4")
        .match_body(Matcher::Json(json!({
            "snippet": {"title": "T", "categoryId": "10"},
            "status": {"privacyStatus": "public"},
        })))
        .with_status(200)
        .with_header("location", &location)
        .expect(1)
        .create_async()
        .await
}

async fn chunk(server: &mut Server, range: &str, body: &str, status: usize, ack: Option<&str>) -> mockito::Mock {
    let mut mock = server
        .mock("PUT", "/upload/session/s1")
        .match_header("content-range", range)
        .match_body(body)
        .with_status(status);
    if let Some(ack) = ack {
        mock = mock.with_header("range", ack);
    }
    if status == 201 {
        mock = mock
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "abc123", "kind": "youtube#video"}"#);
    }
    mock.expect(1).create_async().await
}

#[test]
fn test_watch_url() {
    assert_eq!(watch_url("pxzZ-fYjeYs"), "https://www.youtube.com/watch?v=pxzZ-fYjeYs");
}

#[tokio::test]
async fn test_uploads_file_in_chunks() {
    let mut server = Server::new_async().await;
    let open = open_session(&mut server).await;
    let first = chunk(&mut server, "bytes 0-9/30", "0123456789", 308, Some("bytes=0-9")).await;
    let second = chunk(&mut server, "bytes 10-19/30", "abcdefghij", 308, Some("bytes=0-19")).await;
    let last = chunk(&mut server, "bytes 20-29/30", "ABCDEFGHIJ", 201, None).await;

    let (_dir, path) = video();
    let mut seen = Vec::new();
    let id = client(&server)
        .upload_video(&path, &descriptor(), 10, &Retry::new(Some(3)), |total, done| {
            seen.push((total, done))
        })
        .await
        .unwrap();

    assert_eq!(id, "abc123");
    assert_eq!(seen, vec![(30, 10), (30, 20)]);
    for mock in [open, first, second, last] {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_failed_chunk_resumes_from_acknowledged_offset() {
    let mut server = Server::new_async().await;
    let open = open_session(&mut server).await;
    let first = chunk(&mut server, "bytes 0-9/30", "0123456789", 308, Some("bytes=0-9")).await;
    let failed = chunk(&mut server, "bytes 10-19/30", "abcdefghij", 503, None).await;
    let status = server
        .mock("PUT", "/upload/session/s1")
        .match_header("content-range", "bytes */30")
        .with_status(308)
        .with_header("range", "bytes=0-19")
        .expect(1)
        .create_async()
        .await;
    let last = chunk(&mut server, "bytes 20-29/30", "ABCDEFGHIJ", 201, None).await;

    let (_dir, path) = video();
    let mut seen = Vec::new();
    let id = client(&server)
        .upload_video(&path, &descriptor(), 10, &Retry::new(Some(3)), |_, done| seen.push(done))
        .await
        .unwrap();

    assert_eq!(id, "abc123");
    assert_eq!(seen, vec![10]);
    for mock in [open, first, failed, status, last] {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_client_error_is_reported_with_body() {
    let mut server = Server::new_async().await;
    let open = server
        .mock("POST", "/upload/youtube/v3/videos")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error": {"errors": [{"reason": "quotaExceeded"}]}}"#)
        .expect(1)
        .create_async()
        .await;

    let (_dir, path) = video();
    let err = client(&server)
        .upload_video(&path, &descriptor(), 10, &Retry::new(Some(3)), |_, _| {})
        .await
        .unwrap_err();

    open.assert_async().await;
    match err {
        Error::Http { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("quotaExceeded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_session_without_location_is_protocol_violation() {
    let mut server = Server::new_async().await;
    let _open = server
        .mock("POST", "/upload/youtube/v3/videos")
        .match_query(Matcher::Any)
        .with_status(200)
        .create_async()
        .await;

    let (_dir, path) = video();
    let err = client(&server)
        .upload_video(&path, &descriptor(), 10, &Retry::new(Some(3)), |_, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(_)));
}

#[tokio::test]
async fn test_finished_session_is_not_reused() {
    let mut server = Server::new_async().await;
    let _open = open_session(&mut server).await;
    let _done = chunk(&mut server, "bytes 0-29/30", CONTENT_STR, 201, None).await;

    let (_dir, path) = video();
    let youtube = client(&server);
    let session = youtube.resumable_session(&path, &descriptor(), 64).await.unwrap();

    assert!(matches!(session.next_chunk().await.unwrap(), ChunkStatus::Complete(_)));
    assert!(matches!(session.next_chunk().await, Err(Error::Protocol(_))));
}

const CONTENT_STR: &str = "0123456789abcdefghijABCDEFGHIJ";

#[tokio::test]
async fn test_playlist_attach_over_http() {
    let mut server = Server::new_async().await;
    let first_page = server
        .mock("GET", "/youtube/v3/playlists")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("mine".into(), "true".into()),
            Matcher::UrlEncoded("part".into(), "id,snippet".into()),
            Matcher::Regex("maxResults=50$".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items": [{"id": "PL1", "snippet": {"title": "Holidays"}}], "nextPageToken": "p2"}"#)
        .expect(1)
        .create_async()
        .await;
    let second_page = server
        .mock("GET", "/youtube/v3/playlists")
        .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"items": [{"id": "PL2", "snippet": {"title": "Other"}}]}"#)
        .expect(1)
        .create_async()
        .await;
    let create = server
        .mock("POST", "/youtube/v3/playlists")
        .match_query(Matcher::UrlEncoded("part".into(), "snippet,status".into()))
        .match_body(Matcher::Json(json!({
            "snippet": {"title": "My Videos"},
            "status": {"privacyStatus": "public"},
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "PLnew"}"#)
        .expect(1)
        .create_async()
        .await;
    let link = server
        .mock("POST", "/youtube/v3/playlistItems")
        .match_query(Matcher::UrlEncoded("part".into(), "snippet".into()))
        .match_body(Matcher::PartialJson(json!({
            "snippet": {
                "playlistId": "PLnew",
                "resourceId": {"kind": "youtube#video", "videoId": "abc123"},
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "item1"}"#)
        .expect(1)
        .create_async()
        .await;

    let youtube = client(&server);
    let playlist = attach(&youtube, "abc123", "My Videos", "public").await.unwrap();

    assert_eq!(playlist, "PLnew");
    for mock in [first_page, second_page, create, link] {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_rejected_token_is_renewed_and_chunk_resent() {
    let mut server = Server::new_async().await;
    let open = open_session(&mut server).await;
    let rejected = server
        .mock("PUT", "/upload/session/s1")
        .match_header("authorization", "Bearer ya29.token")
        .with_status(401)
        .with_body(r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#)
        .expect(1)
        .create_async()
        .await;
    let token = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("grant_type=refresh_token".into()),
            Matcher::Regex("refresh_token=refresh-1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "ya29.renewed", "token_type": "Bearer", "expires_in": 3599}"#)
        .expect(1)
        .create_async()
        .await;
    let resent = server
        .mock("PUT", "/upload/session/s1")
        .match_header("authorization", "Bearer ya29.renewed")
        .match_header("content-range", "bytes 0-29/30")
        .match_body(CONTENT_STR)
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "abc123"}"#)
        .expect(1)
        .create_async()
        .await;

    let (dir, path) = video();
    let secrets = ClientSecrets::parse(&format!(
        r#"{{"installed": {{"client_id": "c", "client_secret": "s", "token_uri": "{}/token"}}}}"#,
        server.url()
    ))
    .unwrap();
    let store_path = dir.path().join("credentials.json");
    let authorizer = Authorizer::new(secrets, CredentialStore::new(&store_path));
    let credential = Credential {
        access_token: "ya29.token".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        scopes: Vec::new(),
    };
    let tokens = Arc::new(TokenSource::refreshing(credential, authorizer));
    let youtube = YouTubeClient::with_tokens(Endpoints::with_host(&server.url()), tokens).unwrap();

    let id = youtube
        .upload_video(&path, &descriptor(), 64, &Retry::new(Some(0)), |_, _| {})
        .await
        .unwrap();

    assert_eq!(id, "abc123");
    for mock in [open, rejected, token, resent] {
        mock.assert_async().await;
    }
    let saved = CredentialStore::new(&store_path).load().unwrap();
    assert_eq!(saved.access_token, "ya29.renewed");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_rejected_token_without_refresh_is_request_error() {
    let mut server = Server::new_async().await;
    let _open = open_session(&mut server).await;
    let _rejected = server
        .mock("PUT", "/upload/session/s1")
        .with_status(401)
        .with_body("Invalid Credentials")
        .expect(1)
        .create_async()
        .await;

    let (_dir, path) = video();
    let err = client(&server)
        .upload_video(&path, &descriptor(), 64, &Retry::new(Some(3)), |_, _| {})
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Http { status: 401, .. }));
}
