use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::FetchError;
use crate::http::{Timeouts, get_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub season: u32,
    pub number: u32,
    /// `None` when the catalog has not announced an air date.
    pub air_date: Option<NaiveDate>,
    pub title: String,
    pub summary: String,
}

impl EpisodeInfo {
    pub fn code(&self) -> String {
        episode_code(self.season, self.number)
    }
}

pub fn episode_code(season: u32, number: u32) -> String {
    format!("S{season:02}E{number:02}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowCatalog {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub episodes: Vec<EpisodeInfo>,
}

impl ShowCatalog {
    pub fn episode_by_code(&self, code: &str) -> Option<&EpisodeInfo> {
        if code.is_empty() {
            return None;
        }
        self.episodes.iter().find(|episode| episode.code() == code)
    }

    pub fn has_ended(&self) -> bool {
        self.status.eq_ignore_ascii_case("ended")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowSummary {
    pub id: u32,
    pub name: String,
    pub status: String,
}

/// Source of show catalogs. Implementations must be shareable across the fetch pool.
pub trait CatalogFetcher: Send + Sync {
    fn fetch(&self, show_id: u32) -> Result<ShowCatalog, FetchError>;

    fn search(&self, name: &str) -> Result<ShowSummary, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ShowPayload {
    id: u32,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedPayload>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedPayload {
    episodes: Vec<EpisodePayload>,
}

#[derive(Debug, Deserialize)]
struct EpisodePayload {
    season: u32,
    number: Option<u32>,
    airdate: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

fn parse_air_date(raw: Option<&str>) -> Result<Option<NaiveDate>, FetchError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|err| FetchError::MalformedResponse(format!("bad airdate {value:?}: {err}"))),
    }
}

pub(crate) fn parse_show_catalog(raw: &str) -> Result<ShowCatalog, FetchError> {
    let payload: ShowPayload = serde_json::from_str(raw)
        .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;
    let embedded = payload.embedded.ok_or_else(|| {
        FetchError::MalformedResponse("missing _embedded.episodes".to_string())
    })?;

    let episodes = embedded
        .episodes
        .into_iter()
        .map(|episode| {
            Ok(EpisodeInfo {
                season: episode.season,
                // Specials carry a null number.
                number: episode.number.unwrap_or(0),
                air_date: parse_air_date(episode.airdate.as_deref())?,
                title: episode.name.unwrap_or_default(),
                summary: episode.summary.unwrap_or_default(),
            })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(ShowCatalog {
        id: payload.id,
        name: payload.name,
        status: payload.status.unwrap_or_default(),
        episodes,
    })
}

pub(crate) fn parse_show_summary(raw: &str) -> Result<ShowSummary, FetchError> {
    let payload: ShowPayload = serde_json::from_str(raw)
        .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;
    Ok(ShowSummary {
        id: payload.id,
        name: payload.name,
        status: payload.status.unwrap_or_default(),
    })
}

/// Blocking client for the public TVMaze API.
#[derive(Debug, Clone)]
pub struct TvMazeClient {
    api_base: String,
    timeouts: Timeouts,
}

impl TvMazeClient {
    pub(crate) fn new(api_base: &str, timeouts: Timeouts) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            timeouts,
        }
    }
}

impl CatalogFetcher for TvMazeClient {
    fn fetch(&self, show_id: u32) -> Result<ShowCatalog, FetchError> {
        let url = format!("{}/shows/{show_id}", self.api_base);
        let query = vec![("embed".to_string(), "episodes".to_string())];
        let raw = get_text(&url, &query, self.timeouts).map_err(|err| match err {
            FetchError::NotFound(_) => FetchError::NotFound(show_id.to_string()),
            other => other,
        })?;
        let catalog = parse_show_catalog(&raw)?;
        if catalog.id != show_id {
            return Err(FetchError::MalformedResponse(format!(
                "requested show {show_id}, catalog answered with show {}",
                catalog.id
            )));
        }
        Ok(catalog)
    }

    fn search(&self, name: &str) -> Result<ShowSummary, FetchError> {
        let url = format!("{}/singlesearch/shows", self.api_base);
        let query = vec![("q".to_string(), name.to_string())];
        let raw = get_text(&url, &query, self.timeouts).map_err(|err| match err {
            FetchError::NotFound(_) => FetchError::NotFound(name.to_string()),
            other => other,
        })?;
        parse_show_summary(&raw)
    }
}
