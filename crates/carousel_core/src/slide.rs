use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One generated image of a completed job.
///
/// Fields the service sends that are not modelled here are kept in `extra`
/// so a persisted history round-trips without loss.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Slide {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Editor text overlays, opaque to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texts: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Slide {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// `download_url` when present, else `url`.
    pub fn primary_url(&self) -> Option<&str> {
        non_empty(self.download_url.as_deref()).or_else(|| non_empty(self.url.as_deref()))
    }

    /// What a viewer should show: the local edit if there is one.
    pub fn display_url(&self) -> Option<&str> {
        non_empty(self.edited_url.as_deref()).or_else(|| self.primary_url())
    }

    /// Returns a copy carrying a locally rendered edit. Source URLs are untouched.
    pub fn with_edit(&self, data_uri: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            edited: true,
            edited_url: Some(data_uri.into()),
            edited_at: Some(at),
            ..self.clone()
        }
    }

    /// Two slides describe the same generated image when either source URL matches.
    pub fn same_source(&self, other: &Slide) -> bool {
        let download_match = matches!(
            (non_empty(self.download_url.as_deref()), non_empty(other.download_url.as_deref())),
            (Some(a), Some(b)) if a == b
        );
        let url_match = matches!(
            (non_empty(self.url.as_deref()), non_empty(other.url.as_deref())),
            (Some(a), Some(b)) if a == b
        );
        download_match || url_match
    }

    /// File name used when saving the slide at `index` (zero-based).
    pub fn download_filename(index: usize) -> String {
        format!("slide-{}.jpg", index + 1)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
