use crate::auth::{Authorizer, ClientSecrets, CodeAcquirer, TokenSource};
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::metadata::{self, Descriptor};
use crate::options::Options;
use crate::playlist;
use crate::progress::UploadProgress;
use crate::retry::Retry;
use crate::youtube::{watch_url, Endpoints, YouTubeClient};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Uploads every video named in `options`, writing one video id per line to `output`.
pub async fn run(
    options: &Options,
    endpoints: &Endpoints,
    acquirer: &dyn CodeAcquirer,
    output: &mut (dyn Write + Send),
) -> Result<()> {
    options.validate()?;
    let description = options.description()?;
    let total = options.videos.len();
    let descriptors = (0..total)
        .map(|index| metadata::build(options, description.as_deref(), index, total))
        .collect::<Result<Vec<Descriptor>>>()?;

    let client_secrets = options.client_secrets_path();
    let credentials = options.credentials_path();
    info!("Using client secrets: {}", client_secrets);
    info!("Using credentials file: {}", credentials);

    let secrets = ClientSecrets::load(&client_secrets)?;
    let authorizer = Authorizer::new(secrets, CredentialStore::new(credentials));
    let credential = authorizer
        .credential(acquirer)
        .await?
        .ok_or_else(|| Error::Authentication("Cannot get youtube resource".into()))?;

    let tokens = Arc::new(TokenSource::refreshing(credential, authorizer));
    let youtube = YouTubeClient::with_tokens(endpoints.clone(), tokens)?;
    let retry = Retry::new(Some(options.max_retries));

    for (video_path, descriptor) in options.videos.iter().zip(&descriptors) {
        info!("Start upload: {}", video_path.display());
        let progress = UploadProgress::new();
        let uploaded = youtube
            .upload_video(
                video_path,
                descriptor,
                options.chunksize,
                &retry,
                |total, done| progress.update(total, done),
            )
            .await;
        progress.finish();
        let video_id = uploaded?;

        let video_url = watch_url(&video_id);
        info!("Video URL: {}", video_url);
        if options.open_link {
            if let Err(err) = webbrowser::open(&video_url) {
                warn!(%err, "Could not open the video in a browser");
            }
        }

        if let Some(thumbnail) = &options.thumbnail {
            youtube.set_thumbnail(&video_id, thumbnail).await?;
        }

        if let Some(title) = &options.playlist {
            if let Err(err) =
                playlist::attach(&youtube, &video_id, title, options.privacy.as_str()).await
            {
                warn!(%err, playlist = %title, "Could not add video to playlist");
            }
        }

        writeln!(output, "{}", video_id)?;
    }
    Ok(())
}
