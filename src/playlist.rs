use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistSummary>,
    pub next_page_token: Option<String>,
}

/// The playlist endpoints the attacher needs.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    async fn list_playlists(&self, page_token: Option<&str>) -> Result<PlaylistPage>;

    /// Returns the new playlist's id, if the server reported one.
    async fn insert_playlist(&self, title: &str, privacy: &str) -> Result<Option<String>>;

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()>;
}

/// Id of the first of the caller's playlists titled exactly `title`, in server order.
pub async fn find_playlist<A: PlaylistApi + ?Sized>(api: &A, title: &str) -> Result<Option<String>> {
    let mut page_token: Option<String> = None;
    let mut seen = HashSet::new();
    loop {
        let page = api.list_playlists(page_token.as_deref()).await?;
        if let Some(found) = page.items.into_iter().find(|item| item.title == title) {
            return Ok(Some(found.id));
        }
        match page.next_page_token {
            Some(token) if !token.is_empty() => {
                if !seen.insert(token.clone()) {
                    return Err(Error::Playlist(format!(
                        "Playlist listing repeated page token '{}'",
                        token
                    )));
                }
                page_token = Some(token);
            }
            _ => return Ok(None),
        }
    }
}

/// Links `video_id` to the playlist titled `title`, creating the playlist if needed.
///
/// Returns the playlist id the video was linked to.
pub async fn attach<A: PlaylistApi + ?Sized>(
    api: &A,
    video_id: &str,
    title: &str,
    privacy: &str,
) -> Result<String> {
    let playlist_id = match find_playlist(api, title).await? {
        Some(id) => id,
        None => {
            info!(title, privacy, "Creating playlist");
            api.insert_playlist(title, privacy).await?.ok_or_else(|| {
                Error::Playlist(format!("Playlist '{}' was created without an id", title))
            })?
        }
    };
    api.insert_playlist_item(&playlist_id, video_id).await?;
    info!(playlist = %playlist_id, video = video_id, "Added video to playlist");
    Ok(playlist_id)
}
