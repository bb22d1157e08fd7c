use crate::error::{Error, Result};
use crate::options::Options;
use serde_json::{json, Map, Number, Value};
use tracing::info;

pub const CATEGORIES: &[(&str, u32)] = &[
    ("Film & Animation", 1),
    ("Autos & Vehicles", 2),
    ("Music", 10),
    ("Pets & Animals", 15),
    ("Sports", 17),
    ("Short Movies", 18),
    ("Travel & Events", 19),
    ("Gaming", 20),
    ("Videoblogging", 21),
    ("People & Blogs", 22),
    ("Comedy", 34),
    ("Entertainment", 24),
    ("News & Politics", 25),
    ("Howto & Style", 26),
    ("Education", 27),
    ("Science & Technology", 28),
    ("Nonprofits & Activism", 29),
    ("Movies", 30),
    ("Anime/Animation", 31),
    ("Action/Adventure", 32),
    ("Classics", 33),
    ("Documentary", 35),
    ("Drama", 36),
    ("Family", 37),
    ("Foreign", 38),
    ("Horror", 39),
    ("Sci-Fi/Fantasy", 40),
    ("Thriller", 41),
    ("Shorts", 42),
    ("Shows", 43),
    ("Trailers", 44),
];

pub fn category_id(name: &str) -> Result<String> {
    CATEGORIES
        .iter()
        .find(|(category, _)| *category == name)
        .map(|(_, id)| {
            info!("Using category: {} (id={})", name, id);
            id.to_string()
        })
        .ok_or_else(|| Error::InvalidCategory(name.to_string()))
}

/// The metadata document sent with an upload. Its top-level keys are the parts to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor(Map<String, Value>);

impl Descriptor {
    pub fn new(body: Map<String, Value>) -> Self {
        Self(body)
    }

    pub fn parts(&self) -> String {
        self.0.keys().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, part: &str) -> Option<&Value> {
        self.0.get(part)
    }
}

/// Builds the descriptor for video `index` of `total` from the command-line options.
pub fn build(
    options: &Options,
    description: Option<&str>,
    index: usize,
    total: usize,
) -> Result<Descriptor> {
    let title = options
        .title
        .as_deref()
        .ok_or_else(|| Error::Options("Some required option are missing: title".into()))?;
    let title = if total > 1 {
        expand_title(&options.title_template, title, index + 1, total)
    } else {
        title.to_string()
    };

    let mut snippet = Map::new();
    snippet.insert("title".into(), json!(title));
    insert_opt(&mut snippet, "description", description);
    if let Some(category) = options.category.as_deref() {
        snippet.insert("categoryId".into(), json!(category_id(category)?));
    }
    if let Some(tags) = options.tags.as_deref() {
        snippet.insert("tags".into(), json!(split_tags(tags)));
    }
    insert_opt(&mut snippet, "defaultLanguage", options.default_language.as_deref());
    insert_opt(
        &mut snippet,
        "defaultAudioLanguage",
        options.default_audio_language.as_deref(),
    );

    let mut status = Map::new();
    status.insert("embeddable".into(), json!(options.embeddable));
    let privacy = match options.publish_at {
        Some(_) => {
            info!("Your video will remain private until specified date.");
            "private"
        }
        None => options.privacy.as_str(),
    };
    status.insert("privacyStatus".into(), json!(privacy));
    insert_opt(&mut status, "publishAt", options.publish_at.as_deref());
    status.insert("license".into(), json!(options.license.as_str()));

    let mut body = Map::new();
    body.insert("snippet".into(), Value::Object(snippet));
    body.insert("status".into(), Value::Object(status));

    let mut recording = Map::new();
    if let Some(location) = options.location.as_deref() {
        recording.insert("location".into(), Value::Object(parse_location(location)?));
    }
    insert_opt(&mut recording, "recordingDate", options.recording_date.as_deref());
    if !recording.is_empty() {
        body.insert("recordingDetails".into(), Value::Object(recording));
    }

    Ok(Descriptor(body))
}

pub fn expand_title(template: &str, title: &str, n: usize, total: usize) -> String {
    template
        .replace("{title}", title)
        .replace("{n}", &n.to_string())
        .replace("{total}", &total.to_string())
}

pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `latitude=VAL,longitude=VAL[,altitude=VAL]`.
pub fn parse_location(location: &str) -> Result<Map<String, Value>> {
    let invalid = |message: String| Error::InvalidValue {
        field: "location",
        message,
    };

    let mut fields = Map::new();
    for pair in location.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("expected key=value, got '{}'", pair)))?;
        let key = key.trim();
        if !matches!(key, "latitude" | "longitude" | "altitude") {
            return Err(invalid(format!("unknown key '{}'", key)));
        }
        let number = value
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .ok_or_else(|| invalid(format!("'{}' is not a number", value.trim())))?;
        fields.insert(key.to_string(), Value::Number(number));
    }

    if !fields.contains_key("latitude") || !fields.contains_key("longitude") {
        return Err(invalid("latitude and longitude are required".into()));
    }
    Ok(fields)
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}
