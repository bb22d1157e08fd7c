use crate::error::{Error, Result};
use crate::expand_tilde;
use crate::upload::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES};
use clap::{ArgAction, Parser, ValueEnum};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_CLIENT_SECRETS: &str = "~/.client_secrets.json";
pub const DEFAULT_CREDENTIALS: &str = "~/.youtube-upload-credentials.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum License {
    #[value(name = "youtube")]
    Youtube,
    #[value(name = "creativeCommon")]
    CreativeCommon,
}

impl License {
    pub fn as_str(&self) -> &'static str {
        match self {
            License::Youtube => "youtube",
            License::CreativeCommon => "creativeCommon",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "youtube-upload",
          version,
          about = "Upload videos to YouTube",
          long_about = None)]
pub struct Options {
    #[arg(value_name = "VIDEO", help = "Video files to upload")]
    pub videos: Vec<PathBuf>,

    #[arg(short = 't', long, help = "Video title")]
    pub title: Option<String>,

    #[arg(short = 'c', long, help = "Name of video category")]
    pub category: Option<String>,

    #[arg(short = 'd', long, help = "Video description")]
    pub description: Option<String>,

    #[arg(long = "description-file", value_name = "FILE", help = "Video description file")]
    pub description_file: Option<PathBuf>,

    #[arg(long, help = "Video tags (separated by commas: \"tag1, tag2,...\")")]
    pub tags: Option<String>,

    #[arg(long, value_enum, default_value_t = Privacy::Public, help = "Privacy status")]
    pub privacy: Privacy,

    #[arg(
        long = "publish-at",
        value_name = "DATETIME",
        help = "Publish date (ISO 8601): YYYY-MM-DDThh:mm:ss.sZ"
    )]
    pub publish_at: Option<String>,

    #[arg(long, value_enum, default_value_t = License::Youtube, help = "License for the video")]
    pub license: License,

    #[arg(
        long,
        value_name = "latitude=VAL,longitude=VAL[,altitude=VAL]",
        help = "Video location"
    )]
    pub location: Option<String>,

    #[arg(
        long = "recording-date",
        value_name = "DATETIME",
        help = "Recording date (ISO 8601): YYYY-MM-DDThh:mm:ss.sZ"
    )]
    pub recording_date: Option<String>,

    #[arg(long = "default-language", help = "Default language (ISO 639-1: en | fr | de | ...)")]
    pub default_language: Option<String>,

    #[arg(
        long = "default-audio-language",
        help = "Default audio language (ISO 639-1: en | fr | de | ...)"
    )]
    pub default_audio_language: Option<String>,

    #[arg(long, value_name = "FILE", help = "Image file to use as video thumbnail (JPEG or PNG)")]
    pub thumbnail: Option<PathBuf>,

    #[arg(long, help = "Playlist title (if it does not exist, it will be created)")]
    pub playlist: Option<String>,

    #[arg(
        long = "title-template",
        default_value = "{title} [{n}/{total}]",
        help = "Template for multiple videos"
    )]
    pub title_template: String,

    #[arg(long, action = ArgAction::Set, default_value_t = true, help = "Video is embeddable")]
    pub embeddable: bool,

    #[arg(long = "client-secrets", value_name = "FILE", help = "Client secrets JSON file")]
    pub client_secrets: Option<String>,

    #[arg(long = "credentials-file", value_name = "FILE", help = "Credentials JSON file")]
    pub credentials_file: Option<String>,

    #[arg(
        long = "auth-browser",
        help = "Open a browser to authenticate if required",
        action = ArgAction::SetTrue
    )]
    pub auth_browser: bool,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, help = "Upload chunk size in bytes")]
    pub chunksize: u64,

    #[arg(
        long = "max-retries",
        default_value_t = DEFAULT_MAX_RETRIES,
        help = "Retries per chunk on transient errors"
    )]
    pub max_retries: u32,

    #[arg(
        long = "open-link",
        help = "Open the uploaded video in a web browser",
        action = ArgAction::SetTrue
    )]
    pub open_link: bool,
}

impl Options {
    /// Checks required inputs before anything touches the network.
    pub fn validate(&self) -> Result<()> {
        if self.title.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Options(
                "Some required option are missing: title".into(),
            ));
        }
        if self.videos.is_empty() {
            return Err(Error::Options("No video files given".into()));
        }
        if self.chunksize == 0 {
            return Err(Error::Options("--chunksize must be positive".into()));
        }
        if let Some(missing) = self.videos.iter().find(|path| !path.is_file()) {
            return Err(Error::Options(format!(
                "Video file not found: {}",
                missing.display()
            )));
        }
        Ok(())
    }

    /// The description, read from `--description-file` when that file exists.
    pub fn description(&self) -> Result<Option<String>> {
        match &self.description_file {
            Some(path) if path.exists() => Ok(Some(fs::read_to_string(path)?)),
            _ => Ok(self.description.clone()),
        }
    }

    pub fn client_secrets_path(&self) -> String {
        expand_tilde(self.client_secrets.as_deref().unwrap_or(DEFAULT_CLIENT_SECRETS))
    }

    pub fn credentials_path(&self) -> String {
        expand_tilde(self.credentials_file.as_deref().unwrap_or(DEFAULT_CREDENTIALS))
    }
}
