//! Cache types

use crate::error::CacheError;
use crate::handles::DisplayHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Background provider acting as the cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reddit,
    Unsplash,
    Pixabay,
    Imgur,
    Local,
    Earth,
}

impl Source {
    pub const ALL: [Source; 6] = [
        Source::Reddit,
        Source::Unsplash,
        Source::Pixabay,
        Source::Imgur,
        Source::Local,
        Source::Earth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::Unsplash => "unsplash",
            Source::Pixabay => "pixabay",
            Source::Imgur => "imgur",
            Source::Local => "local",
            Source::Earth => "earth",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| CacheError::InvalidSource(s.to_string()))
    }
}

/// Image bytes together with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageBlob {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Image data as handed over by a provider
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Already-binary image
    Blob(ImageBlob),
    /// Remote URL or `data:` URL
    Text(String),
}

impl From<ImageBlob> for ImageInput {
    fn from(blob: ImageBlob) -> Self {
        ImageInput::Blob(blob)
    }
}

impl From<String> for ImageInput {
    fn from(text: String) -> Self {
        ImageInput::Text(text)
    }
}

impl From<&str> for ImageInput {
    fn from(text: &str) -> Self {
        ImageInput::Text(text.to_string())
    }
}

/// One cached background record
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub source: Source,
    /// Provider-specific data, opaque to the store
    pub metadata: serde_json::Value,
    pub image: ImageBlob,
    /// Milliseconds since the Unix epoch when the entry was written
    pub timestamp: i64,
}

/// A cached entry together with its live display handle
#[derive(Debug, Clone)]
pub struct CachedBackground {
    pub entry: CacheEntry,
    pub handle: DisplayHandle,
}

/// User-configured cadence for replacing backgrounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    Manual,
    Hourly,
    #[default]
    Daily,
    EverySession,
}

/// How the local source picks its image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalImageMode {
    #[default]
    Single,
    Gallery,
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub live_handles: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.live_handles, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_source_parse_and_display() {
        for source in Source::ALL {
            let parsed: Source = source.as_str().parse().unwrap();
            assert_eq!(parsed, source);
            assert_eq!(source.to_string(), source.as_str());
        }
        assert!("flickr".parse::<Source>().is_err());
        assert!("Reddit".parse::<Source>().is_err());
    }

    #[test]
    fn test_schedule_policy_serialization() {
        let json = serde_json::to_string(&SchedulePolicy::EverySession).unwrap();
        assert_eq!(json, "\"every-session\"");

        let parsed: SchedulePolicy = serde_json::from_str("\"hourly\"").unwrap();
        assert_eq!(parsed, SchedulePolicy::Hourly);
        assert_eq!(SchedulePolicy::default(), SchedulePolicy::Daily);
    }

    #[test]
    fn test_local_image_mode_serialization() {
        let parsed: LocalImageMode = serde_json::from_str("\"gallery\"").unwrap();
        assert_eq!(parsed, LocalImageMode::Gallery);
        assert_eq!(LocalImageMode::default(), LocalImageMode::Single);
    }

    #[test]
    fn test_image_input_conversions() {
        let blob = ImageBlob::new(vec![1, 2, 3], "image/png");
        assert!(matches!(ImageInput::from(blob), ImageInput::Blob(b) if b.len() == 3));
        assert!(matches!(
            ImageInput::from("https://example.com/a.jpg"),
            ImageInput::Text(t) if t == "https://example.com/a.jpg"
        ));
    }
}
