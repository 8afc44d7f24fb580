use serde::{Deserialize, Serialize};

use crate::ident::UncensoredKind;

/// One row of a search-results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub jav_id: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub detail_url: String,
}

/// Everything parsed from one detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailRecord {
    pub jav_id: String,
    pub title: String,
    pub cover_url: Option<String>,
    pub detail_url: String,
    pub release_date: Option<String>,
    pub duration_minutes: Option<u32>,
    pub director: Option<String>,
    pub maker: Option<String>,
    pub publisher: Option<String>,
    pub series: Option<String>,
    pub actors: Vec<String>,
    pub categories: Vec<String>,
    pub torrents: Vec<DownloadItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadItem {
    pub title: String,
    /// Magnet URI.
    pub locator: String,
    pub size_bytes: u64,
    pub has_subtitle: bool,
    pub has_uncensored: bool,
    pub uncensored_kind: UncensoredKind,
    pub has_hd: bool,
    /// Derived by [`crate::rank::score`]; recomputed on every ranking.
    pub weight_score: u32,
}

impl DownloadItem {
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
            size_bytes: 0,
            has_subtitle: false,
            has_uncensored: false,
            uncensored_kind: UncensoredKind::None,
            has_hd: false,
            weight_score: 0,
        }
    }
}

/// Outcome of probing the configured base URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub healthy: bool,
    pub message: String,
    pub url: String,
}
