use chrono::NaiveDate;

use crate::catalog::EpisodeInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub total_episodes: usize,
    pub unseen_count: usize,
    pub unaired_count: usize,
    /// Earliest aired episode after the watched point, if any.
    pub next_episode_code: Option<String>,
    /// Index of the watched episode in the catalog; 0 when not found or nothing watched.
    pub watched_index: usize,
}

fn has_aired(air_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    matches!(air_date, Some(date) if date < today)
}

/// Compares `last_watched` against a catalog.
///
/// Walks the catalog from the newest episode backwards and stops at the watched
/// episode, so only episodes after the watched point are counted. Codes compare
/// as strings, which orders correctly only while seasons and episodes stay within
/// two zero-padded digits.
pub fn reconcile(
    last_watched: &str,
    episodes: &[EpisodeInfo],
    today: NaiveDate,
) -> ReconciliationResult {
    let mut result = ReconciliationResult {
        total_episodes: episodes.len(),
        ..ReconciliationResult::default()
    };

    for (idx, episode) in episodes.iter().enumerate().rev() {
        let code = episode.code();

        if !has_aired(episode.air_date, today) {
            result.unaired_count += 1;
        }

        if code.as_str() > last_watched && has_aired(episode.air_date, today) {
            result.unseen_count += 1;
            result.next_episode_code = Some(code.clone());
        }

        if !last_watched.is_empty() && code == last_watched {
            result.watched_index = idx;
            break;
        }
    }

    result
}
