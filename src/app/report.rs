use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::NaiveDate;
use log::warn;

use super::controller::{CycleReport, RowStatus, ShowRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortKey {
    Name,
    Unseen,
    Watched,
    Aired,
}

impl SortKey {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Some(SortKey::Name),
            "unseen" => Some(SortKey::Unseen),
            "watched" => Some(SortKey::Watched),
            "aired" => Some(SortKey::Aired),
            _ => None,
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

/// Catalog summaries are HTML fragments; drops the tags and collapses whitespace.
pub(crate) fn plain_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn row_name(row: &ShowRow) -> String {
    match &row.status {
        RowStatus::Reconciled { catalog, .. } => catalog.name.clone(),
        _ => row
            .record
            .display_name
            .clone()
            .unwrap_or_else(|| format!("#{}", row.record.show_id)),
    }
}

fn unseen(row: &ShowRow) -> Option<usize> {
    match &row.status {
        RowStatus::Reconciled { result, .. } => Some(result.unseen_count),
        _ => None,
    }
}

fn next_air_date(row: &ShowRow) -> Option<NaiveDate> {
    match &row.status {
        RowStatus::Reconciled { catalog, result } => result
            .next_episode_code
            .as_deref()
            .and_then(|code| catalog.episode_by_code(code))
            .and_then(|episode| episode.air_date),
        _ => None,
    }
}

/// Rows with unknown values sort after rows with known ones.
fn known_first<T: Ord>(left: Option<T>, right: Option<T>, descending: bool) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) if descending => r.cmp(&l),
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub(crate) fn sort_rows(rows: &mut [ShowRow], key: SortKey) {
    match key {
        SortKey::Name => rows.sort_by_key(|row| row_name(row).to_lowercase()),
        SortKey::Unseen => rows.sort_by(|a, b| known_first(unseen(a), unseen(b), true)),
        SortKey::Watched => rows.sort_by(|a, b| {
            known_first(a.record.watched_date, b.record.watched_date, true)
        }),
        SortKey::Aired => rows.sort_by(|a, b| known_first(next_air_date(a), next_air_date(b), false)),
    }
}

fn status_cell(row: &ShowRow) -> String {
    match &row.status {
        RowStatus::Done => "done".to_string(),
        RowStatus::Unavailable { .. } => "?".to_string(),
        RowStatus::Reconciled { catalog, result } => {
            let inactive =
                catalog.has_ended() && result.unseen_count == 0 && result.unaired_count == 0;
            let state = if catalog.status.is_empty() {
                "-"
            } else {
                catalog.status.as_str()
            };
            if inactive {
                format!("{state} (off)")
            } else {
                state.to_string()
            }
        }
    }
}

/// Table cells derived from a row's catalog state.
struct Cells {
    total: String,
    unseen: String,
    unaired: String,
    watched_aired: String,
    watched_title: String,
    next: String,
    next_aired: String,
    next_title: String,
}

impl Cells {
    fn placeholder(mark: &str) -> Self {
        Self {
            total: mark.to_string(),
            unseen: mark.to_string(),
            unaired: mark.to_string(),
            watched_aired: String::new(),
            watched_title: String::new(),
            next: String::new(),
            next_aired: String::new(),
            next_title: String::new(),
        }
    }
}

fn cells(row: &ShowRow) -> Cells {
    let (catalog, result) = match &row.status {
        RowStatus::Reconciled { catalog, result } => (catalog, result),
        RowStatus::Done => return Cells::placeholder("-"),
        RowStatus::Unavailable { .. } => return Cells::placeholder("?"),
    };

    let watched = Some(row.record.last_watched.as_str())
        .filter(|code| !code.is_empty())
        .and_then(|code| catalog.episode_by_code(code));
    let next = result
        .next_episode_code
        .as_deref()
        .and_then(|code| catalog.episode_by_code(code));

    Cells {
        total: result.total_episodes.to_string(),
        unseen: result.unseen_count.to_string(),
        unaired: result.unaired_count.to_string(),
        watched_aired: format_date(watched.and_then(|episode| episode.air_date)),
        watched_title: watched
            .map(|episode| episode.title.clone())
            .unwrap_or_else(|| "-".to_string()),
        next: result.next_episode_code.clone().unwrap_or_default(),
        next_aired: next
            .map(|episode| format_date(episode.air_date))
            .unwrap_or_default(),
        next_title: next
            .map(|episode| episode.title.clone())
            .unwrap_or_default(),
    }
}

pub(crate) fn render_report(report: &CycleReport) -> String {
    let mut rows = report.rows.clone();
    if let Some(raw) = report.sort.as_deref() {
        match SortKey::parse(raw) {
            Some(key) => sort_rows(&mut rows, key),
            None => warn!("ignoring unknown !SORT={raw}"),
        }
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:<28} {:<14} {:>5} {:>6} {:>7}  {:<8} {:<10} {:<10} {:<20} {:<8} {:<10} {:<24}",
        "ID",
        "SHOW",
        "STATUS",
        "EPS",
        "UNSEEN",
        "UNAIRED",
        "WATCHED",
        "ON",
        "EP AIRED",
        "EP TITLE",
        "NEXT",
        "NEXT AIRED",
        "NEXT TITLE"
    );
    for row in &rows {
        let cells = cells(row);
        let _ = writeln!(
            out,
            "{:<8} {:<28} {:<14} {:>5} {:>6} {:>7}  {:<8} {:<10} {:<10} {:<20} {:<8} {:<10} {:<24}",
            row.record.show_id,
            truncate(&row_name(row), 28),
            truncate(&status_cell(row), 14),
            cells.total,
            cells.unseen,
            cells.unaired,
            row.record.last_watched,
            format_date(row.record.watched_date),
            cells.watched_aired,
            truncate(&cells.watched_title, 20),
            cells.next,
            cells.next_aired,
            truncate(&cells.next_title, 24)
        );
    }

    for row in &rows {
        if let RowStatus::Unavailable { error } = &row.status {
            let _ = writeln!(out, "Warning: show {}: {error}", row.record.show_id);
        }
    }
    out
}
