//! Provider credits shown next to the background

use crate::types::Source;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Recognized metadata shapes, one per provider that reports a location or credit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Earth {
        location: String,
        map_url: Option<String>,
    },
    Unsplash {
        photographer: String,
        profile_url: Option<String>,
    },
    Reddit {
        title: String,
        permalink: Option<String>,
        subreddit: Option<String>,
    },
    Local {
        description: String,
    },
    Imgur {
        title: String,
        link: Option<String>,
    },
}

/// Text handed to the location-info display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationInfo {
    pub text: String,
    pub link_url: Option<String>,
    pub link_label: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarthMetadata {
    location: String,
    #[serde(default, alias = "mapsUrl")]
    map_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsplashMetadata {
    #[serde(alias = "author")]
    photographer: String,
    #[serde(default, alias = "authorUrl")]
    profile_url: Option<String>,
}

#[derive(Deserialize)]
struct RedditMetadata {
    title: String,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    subreddit: Option<String>,
}

#[derive(Deserialize)]
struct LocalMetadata {
    description: String,
}

#[derive(Deserialize)]
struct ImgurMetadata {
    title: String,
    #[serde(default)]
    link: Option<String>,
}

fn parse<T: DeserializeOwned>(metadata: &serde_json::Value) -> Option<T> {
    serde_json::from_value(metadata.clone()).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Attribution {
    /// Interpret `metadata` according to the shape `source` writes.
    /// Returns `None` for providers without credits or unrecognized shapes.
    pub fn from_metadata(source: Source, metadata: &serde_json::Value) -> Option<Self> {
        let attribution = match source {
            Source::Earth => parse::<EarthMetadata>(metadata).map(|m| Attribution::Earth {
                location: m.location,
                map_url: non_empty(m.map_url),
            }),
            Source::Unsplash => parse::<UnsplashMetadata>(metadata).map(|m| Attribution::Unsplash {
                photographer: m.photographer,
                profile_url: non_empty(m.profile_url),
            }),
            Source::Reddit => parse::<RedditMetadata>(metadata).map(|m| Attribution::Reddit {
                title: m.title,
                permalink: non_empty(m.permalink),
                subreddit: non_empty(m.subreddit),
            }),
            Source::Local => parse::<LocalMetadata>(metadata).map(|m| Attribution::Local {
                description: m.description,
            }),
            Source::Imgur => parse::<ImgurMetadata>(metadata).map(|m| Attribution::Imgur {
                title: m.title,
                link: non_empty(m.link),
            }),
            Source::Pixabay => None,
        }?;

        if attribution.headline().trim().is_empty() {
            return None;
        }
        Some(attribution)
    }

    fn headline(&self) -> &str {
        match self {
            Attribution::Earth { location, .. } => location,
            Attribution::Unsplash { photographer, .. } => photographer,
            Attribution::Reddit { title, .. } => title,
            Attribution::Local { description } => description,
            Attribution::Imgur { title, .. } => title,
        }
    }

    pub fn location_info(&self) -> LocationInfo {
        match self {
            Attribution::Earth { location, map_url } => LocationInfo {
                text: location.clone(),
                link_url: map_url.clone(),
                link_label: map_url.as_ref().map(|_| "View on Google Maps".to_string()),
            },
            Attribution::Unsplash {
                photographer,
                profile_url,
            } => LocationInfo {
                text: format!("Photo by {} on Unsplash", photographer),
                link_url: profile_url.clone(),
                link_label: profile_url.as_ref().map(|_| photographer.clone()),
            },
            Attribution::Reddit {
                title,
                permalink,
                subreddit,
            } => LocationInfo {
                text: title.clone(),
                link_url: permalink.clone(),
                link_label: permalink.as_ref().map(|_| match subreddit {
                    Some(sub) => format!("r/{}", sub.trim_start_matches("r/")),
                    None => "View on Reddit".to_string(),
                }),
            },
            Attribution::Local { description } => LocationInfo {
                text: description.clone(),
                link_url: None,
                link_label: None,
            },
            Attribution::Imgur { title, link } => LocationInfo {
                text: title.clone(),
                link_url: link.clone(),
                link_label: link.as_ref().map(|_| "View on Imgur".to_string()),
            },
        }
    }
}
