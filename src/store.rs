use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info};

use crate::error::StoreError;

/// Sentinel episode code for shows that no longer need catalog lookups.
pub const DONE_MARKER: &str = "DONE";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowRecord {
    pub show_id: u32,
    /// `SxxEyy`, [`DONE_MARKER`], or empty when nothing has been watched.
    pub last_watched: String,
    pub watched_date: Option<NaiveDate>,
    /// Informational only; refreshed from the catalog on every rewrite.
    pub display_name: Option<String>,
}

impl ShowRecord {
    pub fn new(show_id: u32) -> Self {
        Self {
            show_id,
            last_watched: String::new(),
            watched_date: None,
            display_name: Some("Unknown".to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.last_watched == DONE_MARKER
    }

    /// Canonical `showId,episode,date` text for this record.
    fn fields(&self) -> String {
        let date = self
            .watched_date
            .map(|date| date.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        format!("{},{},{}", self.show_id, self.last_watched, date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Final line of a file without a trailing newline.
    Missing,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Missing => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFileLine {
    /// Comment, directive, or blank line; written back verbatim.
    PassThrough { text: String, ending: LineEnding },
    /// Placeholder for the record with this show ID. `fields` is the
    /// `showId,episode,date` text as read, re-emitted until the record changes.
    Record {
        show_id: u32,
        fields: String,
        ending: LineEnding,
    },
}

impl RawFileLine {
    fn ending_mut(&mut self) -> &mut LineEnding {
        match self {
            RawFileLine::PassThrough { ending, .. } | RawFileLine::Record { ending, .. } => ending,
        }
    }
}

/// Text before the display-name field: everything up to the third comma.
fn leading_fields(text: &str) -> &str {
    match text.match_indices(',').nth(2) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// In-memory image of the record file: records plus the line layout they live in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub lines: Vec<RawFileLine>,
    pub records: Vec<ShowRecord>,
}

fn is_record_line(text: &str) -> bool {
    matches!(text.as_bytes().first(), Some(b'1'..=b'9'))
}

fn split_line_ending(raw: &str) -> (&str, LineEnding) {
    if let Some(text) = raw.strip_suffix("\r\n") {
        (text, LineEnding::CrLf)
    } else if let Some(text) = raw.strip_suffix('\n') {
        (text, LineEnding::Lf)
    } else {
        (raw, LineEnding::Missing)
    }
}

fn strip_quotes(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(raw)
}

pub(crate) fn parse_record_line(text: &str, line_no: usize) -> Result<ShowRecord, StoreError> {
    let malformed = |reason: String| StoreError::MalformedRecord {
        line: line_no,
        reason,
    };

    let mut fields = text.splitn(4, ',');
    let id_raw = fields.next().unwrap_or_default().trim();
    let (Some(episode_raw), Some(date_raw)) = (fields.next(), fields.next()) else {
        return Err(malformed(
            "expected at least showId,episode,watchedDate".to_string(),
        ));
    };

    let show_id = id_raw
        .parse::<u32>()
        .map_err(|_| malformed(format!("show id {id_raw:?} is not a positive integer")))?;

    let date_raw = date_raw.trim();
    let watched_date = if date_raw.is_empty() {
        None
    } else {
        let date = NaiveDate::parse_from_str(date_raw, DATE_FORMAT)
            .map_err(|err| malformed(format!("watched date {date_raw:?}: {err}")))?;
        Some(date)
    };

    let display_name = fields
        .next()
        .map(|name| strip_quotes(name.trim()).to_string())
        .filter(|name| !name.is_empty());

    Ok(ShowRecord {
        show_id,
        last_watched: episode_raw.trim().to_string(),
        watched_date,
        display_name,
    })
}

pub fn parse_store(raw: &str) -> Result<StoreSnapshot, StoreError> {
    let mut snapshot = StoreSnapshot::default();
    for (idx, raw_line) in raw.split_inclusive('\n').enumerate() {
        let (text, ending) = split_line_ending(raw_line);
        if !is_record_line(text) {
            snapshot.lines.push(RawFileLine::PassThrough {
                text: text.to_string(),
                ending,
            });
            continue;
        }

        let record = parse_record_line(text, idx + 1)?;
        if snapshot.find(record.show_id).is_some() {
            return Err(StoreError::DuplicateShow(record.show_id));
        }
        snapshot.lines.push(RawFileLine::Record {
            show_id: record.show_id,
            fields: leading_fields(text).to_string(),
            ending,
        });
        snapshot.records.push(record);
    }
    Ok(snapshot)
}

pub fn load(path: &Path) -> Result<StoreSnapshot, StoreError> {
    let raw = fs::read_to_string(path).map_err(|err| StoreError::io("read", path, err))?;
    let snapshot = parse_store(&raw)?;
    debug!(
        "loaded {} record(s) and {} line(s) from {}",
        snapshot.records.len(),
        snapshot.lines.len(),
        path.display()
    );
    Ok(snapshot)
}

pub fn is_valid_episode_code(code: &str) -> bool {
    if code == DONE_MARKER {
        return true;
    }
    let Some(rest) = code.strip_prefix('S') else {
        return false;
    };
    let Some((season, episode)) = rest.split_once('E') else {
        return false;
    };
    let digits = |part: &str| part.len() >= 2 && part.chars().all(|ch| ch.is_ascii_digit());
    digits(season) && digits(episode)
}

impl StoreSnapshot {
    pub fn find(&self, show_id: u32) -> Option<&ShowRecord> {
        self.records.iter().find(|record| record.show_id == show_id)
    }

    fn find_mut(&mut self, show_id: u32) -> Option<&mut ShowRecord> {
        self.records
            .iter_mut()
            .find(|record| record.show_id == show_id)
    }

    /// Records `code` as the last watched episode. Derived counts are left to the next reconcile.
    pub fn apply_update(
        &mut self,
        show_id: u32,
        code: &str,
        today: NaiveDate,
    ) -> Result<&ShowRecord, StoreError> {
        let code = code.trim();
        if !is_valid_episode_code(code) {
            return Err(StoreError::InvalidEpisodeCode(code.to_string()));
        }
        let record = self
            .find_mut(show_id)
            .ok_or(StoreError::NotFound(show_id))?;
        record.last_watched = code.to_string();
        record.watched_date = Some(today);
        let canonical = record.fields();

        for line in &mut self.lines {
            if let RawFileLine::Record {
                show_id: line_id,
                fields,
                ..
            } = line
                && *line_id == show_id
            {
                *fields = canonical.clone();
            }
        }
        self.find(show_id).ok_or(StoreError::NotFound(show_id))
    }

    pub fn apply_add(&mut self, show_id: u32) -> Result<&ShowRecord, StoreError> {
        if show_id == 0 {
            return Err(StoreError::InvalidShowId(show_id));
        }
        if self.find(show_id).is_some() {
            return Err(StoreError::AlreadyTracked(show_id));
        }

        if let Some(last) = self.lines.last_mut() {
            let ending = last.ending_mut();
            if *ending == LineEnding::Missing {
                *ending = LineEnding::Lf;
            }
        }
        let record = ShowRecord::new(show_id);
        self.lines.push(RawFileLine::Record {
            show_id,
            fields: record.fields(),
            ending: LineEnding::Lf,
        });
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Deletion has no safe design yet (backup history, line layout), so it always fails.
    pub fn apply_delete(&mut self, show_id: u32) -> Result<(), StoreError> {
        if self.find(show_id).is_none() {
            return Err(StoreError::NotFound(show_id));
        }
        Err(StoreError::NotSupported("deleting a show"))
    }

    pub fn refresh_display_name(&mut self, show_id: u32, name: &str) {
        if let Some(record) = self.find_mut(show_id) {
            record.display_name = Some(name.to_string());
        }
    }

    /// `!KEY=VALUE` lines in file order. Interpretation is left to the caller.
    pub fn directives(&self) -> Vec<(String, String)> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                RawFileLine::PassThrough { text, .. } => {
                    let body = text.strip_prefix('!')?;
                    let (key, value) = body.split_once('=')?;
                    Some((key.trim().to_ascii_uppercase(), value.trim().to_string()))
                }
                RawFileLine::Record { .. } => None,
            })
            .collect()
    }

    pub fn directive(&self, key: &str) -> Option<String> {
        self.directives()
            .into_iter()
            .rev()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                RawFileLine::PassThrough { text, ending } => {
                    out.push_str(text);
                    out.push_str(ending.as_str());
                }
                RawFileLine::Record {
                    show_id,
                    fields,
                    ending,
                } => {
                    if let Some(record) = self.find(*show_id) {
                        out.push_str(fields);
                        if let Some(name) = &record.display_name {
                            out.push_str(",\"");
                            out.push_str(name);
                            out.push('"');
                        }
                        out.push_str(ending.as_str());
                    }
                }
            }
        }
        out
    }
}

fn split_file_name(path: &Path) -> (String, Option<String>) {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    (stem, ext)
}

/// `{basename}_{YYYYMMDD_HHMMSS}_UTC.{ext}`, with `-N` appended to the stamp if taken.
pub fn backup_path(path: &Path, now: DateTime<Utc>) -> PathBuf {
    let (stem, ext) = split_file_name(path);
    let stamp = now.format("%Y%m%d_%H%M%S").to_string();
    let name_for = |suffix: Option<u32>| {
        let mut name = format!("{stem}_{stamp}_UTC");
        if let Some(n) = suffix {
            name.push_str(&format!("-{n}"));
        }
        if let Some(ext) = &ext {
            name.push('.');
            name.push_str(ext);
        }
        path.with_file_name(name)
    };

    let mut candidate = name_for(None);
    let mut n = 1;
    while candidate.exists() {
        candidate = name_for(Some(n));
        n += 1;
    }
    candidate
}

pub fn temp_path(path: &Path) -> PathBuf {
    let candidate = path.with_extension("tmp");
    if candidate == path {
        path.with_extension("tmp.new")
    } else {
        candidate
    }
}

fn write_synced(path: &Path, content: &str) -> Result<(), StoreError> {
    let mut file = File::create(path).map_err(|err| StoreError::io("create", path, err))?;
    file.write_all(content.as_bytes())
        .map_err(|err| StoreError::io("write", path, err))?;
    file.sync_all()
        .map_err(|err| StoreError::io("sync", path, err))
}

/// Rewrites the store: temp file, then live → backup, then temp → live.
/// Returns the backup path holding the previous contents.
pub fn persist(
    path: &Path,
    snapshot: &StoreSnapshot,
    now: DateTime<Utc>,
) -> Result<PathBuf, StoreError> {
    let tmp = temp_path(path);
    if let Err(err) = write_synced(&tmp, &snapshot.render()) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    let backup = backup_path(path, now);
    fs::rename(path, &backup).map_err(|err| StoreError::io("back up", path, err))?;
    fs::rename(&tmp, path).map_err(|err| StoreError::io("replace", path, err))?;
    info!(
        "rewrote {} ({} record(s)); previous version kept at {}",
        path.display(),
        snapshot.records.len(),
        backup.display()
    );
    Ok(backup)
}

const STARTER_CONTENT: &str = "\
# showtrack watch list
# Lines starting with # are comments and are kept as-is on every rewrite.
# Directives: !SORT= name | unseen | watched | aired
# TVMID,EPNUM,Watched,Name
!SORT=name

";

pub fn init(path: &Path) -> Result<(), StoreError> {
    if path.exists() {
        return Err(StoreError::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| StoreError::io("create directory", parent, err))?;
    }
    write_synced(path, STARTER_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# my shows\n!SORT=unseen\n1850,S01E08,2015-12-21,\"Supergirl\"\n\n# ended\n1,S01E01,2015-12-21,\"Under the Dome\"\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn write_store(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("shows.dex");
        fs::write(&path, content).expect("write store");
        path
    }

    #[test]
    fn parse_store_separates_records_from_pass_through_lines() {
        let snapshot = parse_store(SAMPLE).expect("sample should parse");

        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.lines.len(), 6);
        assert_eq!(
            snapshot.lines[0],
            RawFileLine::PassThrough {
                text: "# my shows".to_string(),
                ending: LineEnding::Lf
            }
        );
        assert_eq!(
            snapshot.lines[2],
            RawFileLine::Record {
                show_id: 1850,
                fields: "1850,S01E08,2015-12-21".to_string(),
                ending: LineEnding::Lf
            }
        );
        let first = &snapshot.records[0];
        assert_eq!(first.show_id, 1850);
        assert_eq!(first.last_watched, "S01E08");
        assert_eq!(first.watched_date, Some(date(2015, 12, 21)));
        assert_eq!(first.display_name.as_deref(), Some("Supergirl"));
    }

    #[test]
    fn lines_starting_with_zero_or_letters_pass_through() {
        let snapshot = parse_store("0,S01E01,,\nabc\n  12,S01E01,,\n").expect("should parse");
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.lines.len(), 3);
    }

    #[test]
    fn parse_record_line_accepts_minimal_and_unquoted_fields() {
        let record = parse_record_line("999,,,Unknown", 1).expect("should parse");
        assert_eq!(record.show_id, 999);
        assert_eq!(record.last_watched, "");
        assert_eq!(record.watched_date, None);
        assert_eq!(record.display_name.as_deref(), Some("Unknown"));

        let record = parse_record_line("5,DONE,2016-01-01", 1).expect("should parse");
        assert!(record.is_done());
        assert_eq!(record.display_name, None);
    }

    #[test]
    fn parse_record_line_keeps_commas_in_display_name() {
        let record = parse_record_line("7,S02E03,2020-02-02,\"Love, Death & Robots\"", 1)
            .expect("should parse");
        assert_eq!(record.display_name.as_deref(), Some("Love, Death & Robots"));
    }

    #[test]
    fn parse_record_line_rejects_malformed_lines() {
        assert!(matches!(
            parse_record_line("12x,S01E01,2015-01-01", 3),
            Err(StoreError::MalformedRecord { line: 3, .. })
        ));
        assert!(matches!(
            parse_record_line("12,S01E01", 4),
            Err(StoreError::MalformedRecord { line: 4, .. })
        ));
        assert!(matches!(
            parse_record_line("12,S01E01,yesterday", 5),
            Err(StoreError::MalformedRecord { line: 5, .. })
        ));
    }

    #[test]
    fn parse_store_rejects_duplicate_show_ids() {
        let err = parse_store("5,S01E01,,\n5,S01E02,,\n").expect_err("duplicate should fail");
        assert!(matches!(err, StoreError::DuplicateShow(5)));
    }

    #[test]
    fn render_round_trips_byte_for_byte() {
        let content = "# header\r\n!SORT=name\r\n1850,S01E08,2015-12-21,\"Supergirl\"\r\n\r\n2,,,\"Pending\"";
        let snapshot = parse_store(content).expect("should parse");
        assert_eq!(snapshot.render(), content);
    }

    #[test]
    fn render_only_changes_display_name_fields() {
        let content = "# header\n999,,,Unknown\n5,DONE,2016-01-01\n";
        let snapshot = parse_store(content).expect("should parse");
        assert_eq!(
            snapshot.render(),
            "# header\n999,,,\"Unknown\"\n5,DONE,2016-01-01\n"
        );
    }

    #[test]
    fn render_keeps_untouched_record_fields_verbatim() {
        let content = "1850, S01E08, 2015-12-21,\"Supergirl\"\n7,S01E01,2015-1-5,\"Seven\"\n8,S01E02 ,,\n";
        let snapshot = parse_store(content).expect("should parse");

        assert_eq!(snapshot.records[0].last_watched, "S01E08");
        assert_eq!(snapshot.records[1].watched_date, Some(date(2015, 1, 5)));
        assert_eq!(
            snapshot.render(),
            "1850, S01E08, 2015-12-21,\"Supergirl\"\n7,S01E01,2015-1-5,\"Seven\"\n8,S01E02 ,\n"
        );
    }

    #[test]
    fn apply_update_rewrites_only_the_updated_record_fields() {
        let content = "1850, S01E08, 2015-12-21,\"Supergirl\"\n7,S01E01,2015-1-5,\"Seven\"\n";
        let mut snapshot = parse_store(content).expect("should parse");

        snapshot
            .apply_update(7, "S01E02", date(2016, 2, 3))
            .expect("update should succeed");

        assert_eq!(
            snapshot.render(),
            "1850, S01E08, 2015-12-21,\"Supergirl\"\n7,S01E02,2016-02-03,\"Seven\"\n"
        );
    }

    #[test]
    fn apply_update_sets_code_and_date() {
        let mut snapshot = parse_store(SAMPLE).expect("should parse");
        let record = snapshot
            .apply_update(1, "S01E02", date(2024, 3, 1))
            .expect("update should succeed");
        assert_eq!(record.last_watched, "S01E02");
        assert_eq!(record.watched_date, Some(date(2024, 3, 1)));
    }

    #[test]
    fn apply_update_twice_matches_single_update() {
        let mut once = parse_store(SAMPLE).expect("should parse");
        once.apply_update(1, "S01E05", date(2024, 3, 2))
            .expect("update should succeed");

        let mut twice = parse_store(SAMPLE).expect("should parse");
        twice
            .apply_update(1, "S01E05", date(2024, 3, 1))
            .expect("update should succeed");
        twice
            .apply_update(1, "S01E05", date(2024, 3, 2))
            .expect("update should succeed");

        assert_eq!(once, twice);
    }

    #[test]
    fn apply_update_rejects_unknown_show_and_bad_codes() {
        let mut snapshot = parse_store(SAMPLE).expect("should parse");
        assert!(matches!(
            snapshot.apply_update(42, "S01E01", date(2024, 1, 1)),
            Err(StoreError::NotFound(42))
        ));
        assert!(matches!(
            snapshot.apply_update(1, "1x02", date(2024, 1, 1)),
            Err(StoreError::InvalidEpisodeCode(_))
        ));
        assert_eq!(snapshot, parse_store(SAMPLE).expect("should parse"));
    }

    #[test]
    fn is_valid_episode_code_accepts_padded_codes_and_done() {
        assert!(is_valid_episode_code("S01E02"));
        assert!(is_valid_episode_code("S10E100"));
        assert!(is_valid_episode_code("DONE"));
        assert!(!is_valid_episode_code("S1E2"));
        assert!(!is_valid_episode_code("S01x02"));
        assert!(!is_valid_episode_code(""));
    }

    #[test]
    fn apply_add_appends_minimal_record() {
        let content = "# shows\n1,S01E01,,\n2,S01E01,,\n3,S01E01,,\n";
        let mut snapshot = parse_store(content).expect("should parse");

        snapshot.apply_add(999).expect("add should succeed");

        assert_eq!(snapshot.records.len(), 4);
        let added = snapshot.find(999).expect("new record");
        assert_eq!(added.last_watched, "");
        assert_eq!(added.watched_date, None);
        assert!(snapshot.render().ends_with("3,S01E01,\n999,,,\"Unknown\"\n"));
    }

    #[test]
    fn apply_add_terminates_unterminated_last_line() {
        let mut snapshot = parse_store("# only a comment").expect("should parse");
        snapshot.apply_add(12).expect("add should succeed");
        assert_eq!(snapshot.render(), "# only a comment\n12,,,\"Unknown\"\n");
    }

    #[test]
    fn apply_add_rejects_tracked_show_and_zero_id() {
        let mut snapshot = parse_store(SAMPLE).expect("should parse");
        assert!(matches!(
            snapshot.apply_add(1850),
            Err(StoreError::AlreadyTracked(1850))
        ));
        assert!(matches!(
            snapshot.apply_add(0),
            Err(StoreError::InvalidShowId(0))
        ));
        assert_eq!(snapshot.records.len(), 2);
    }

    #[test]
    fn apply_delete_is_not_supported() {
        let mut snapshot = parse_store(SAMPLE).expect("should parse");
        assert!(matches!(
            snapshot.apply_delete(1850),
            Err(StoreError::NotSupported(_))
        ));
        assert!(matches!(
            snapshot.apply_delete(77),
            Err(StoreError::NotFound(77))
        ));
        assert_eq!(snapshot.records.len(), 2);
    }

    #[test]
    fn directives_are_exposed_in_file_order() {
        let snapshot = parse_store("!SORT=name\n# c\n!sort = aired\n!broken\n").expect("parse");
        assert_eq!(
            snapshot.directives(),
            vec![
                ("SORT".to_string(), "name".to_string()),
                ("SORT".to_string(), "aired".to_string())
            ]
        );
        assert_eq!(snapshot.directive("sort").as_deref(), Some("aired"));
    }

    #[test]
    fn backup_path_uses_utc_stamp_and_keeps_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shows.dex");
        let backup = backup_path(&path, utc("2016-03-03T04:05:06Z"));
        assert_eq!(
            backup.file_name().and_then(|name| name.to_str()),
            Some("shows_20160303_040506_UTC.dex")
        );
    }

    #[test]
    fn backup_path_adds_suffix_when_stamp_is_taken() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shows.dex");
        fs::write(dir.path().join("shows_20160303_040506_UTC.dex"), "old").expect("write");

        let backup = backup_path(&path, utc("2016-03-03T04:05:06Z"));

        assert_eq!(
            backup.file_name().and_then(|name| name.to_str()),
            Some("shows_20160303_040506_UTC-1.dex")
        );
    }

    #[test]
    fn persist_without_changes_reproduces_file_and_keeps_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(dir.path(), SAMPLE);

        let snapshot = load(&path).expect("load");
        let backup = persist(&path, &snapshot, utc("2024-01-02T03:04:05Z")).expect("persist");

        assert_eq!(fs::read_to_string(&path).expect("read live"), SAMPLE);
        assert_eq!(fs::read_to_string(&backup).expect("read backup"), SAMPLE);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn persist_after_update_changes_only_the_target_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(dir.path(), SAMPLE);

        let mut snapshot = load(&path).expect("load");
        snapshot
            .apply_update(1850, "S01E09", date(2016, 1, 4))
            .expect("update");
        persist(&path, &snapshot, utc("2024-01-02T03:04:05Z")).expect("persist");

        let before = SAMPLE.lines().collect::<Vec<_>>();
        let rewritten = fs::read_to_string(&path).expect("read live");
        let after = rewritten.lines().collect::<Vec<_>>();
        assert_eq!(before.len(), after.len());
        for (idx, (old, new)) in before.iter().zip(&after).enumerate() {
            if idx == 2 {
                assert_eq!(*new, "1850,S01E09,2016-01-04,\"Supergirl\"");
            } else {
                assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn persist_is_last_writer_wins_without_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(dir.path(), SAMPLE);

        let mut first = load(&path).expect("load first");
        let mut second = load(&path).expect("load second");
        first
            .apply_update(1850, "S01E09", date(2016, 1, 4))
            .expect("update first");
        second
            .apply_update(1, "S01E02", date(2016, 1, 5))
            .expect("update second");

        let now = utc("2024-01-02T03:04:05Z");
        let backup_one = persist(&path, &first, now).expect("persist first");
        let backup_two = persist(&path, &second, now).expect("persist second");

        assert_ne!(backup_one, backup_two);
        let reloaded = load(&path).expect("reload");
        assert_eq!(reloaded, second);
        assert_eq!(
            reloaded.find(1850).map(|record| record.last_watched.as_str()),
            Some("S01E08")
        );
        assert_eq!(load(&backup_two).expect("load backup"), first);
    }

    #[test]
    fn persist_failure_leaves_live_file_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_store(dir.path(), SAMPLE);
        fs::create_dir(temp_path(&path)).expect("block temp path");

        let snapshot = load(&path).expect("load");
        let err = persist(&path, &snapshot, utc("2024-01-02T03:04:05Z"))
            .expect_err("temp path is a directory");

        assert!(matches!(err, StoreError::FileIo { .. }));
        assert_eq!(fs::read_to_string(&path).expect("read live"), SAMPLE);
        let entries = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn load_reports_missing_file_as_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load(&dir.path().join("missing.dex")).expect_err("missing file");
        assert!(matches!(err, StoreError::FileIo { action: "read", .. }));
    }

    #[test]
    fn init_creates_parseable_store_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("shows.dex");

        init(&path).expect("init");
        let snapshot = load(&path).expect("load");
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.directive("SORT").as_deref(), Some("name"));

        assert!(matches!(init(&path), Err(StoreError::AlreadyExists(_))));
    }
}
