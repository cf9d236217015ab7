//! File selector: finds the host's dated log files and orders them by date.
//!
//! The host writes one file per day named `<prefix>-YYYY-MM-DD.log`. Month and
//! day may appear without leading zeros, so ordering goes through the parsed
//! date and never through the raw file name.

use std::cmp::Ordering;
use std::path::Path;

use chrono::NaiveDate;
use regex::Regex;
use rptwatch_core::MonitorError;

/// A log file name together with the date embedded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub name: String,
    pub date: NaiveDate,
}

impl Ord for LogFile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for LogFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Matches `<prefix>-Y-M-D.log` case-insensitively.
fn name_pattern(prefix: &str) -> Regex {
    Regex::new(&format!(
        r"(?i)^{}-(\d{{4}})-(\d{{1,2}})-(\d{{1,2}})\.log$",
        regex::escape(prefix)
    ))
    .expect("escaped prefix always yields a valid pattern")
}

/// `None` unless `name` is a dated log file naming a real calendar day.
fn parse_with(pattern: &Regex, name: &str) -> Option<LogFile> {
    let caps = pattern.captures(name)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    Some(LogFile {
        name: name.to_string(),
        date: NaiveDate::from_ymd_opt(year, month, day)?,
    })
}

/// Keep the names that are dated log files for `prefix`, oldest first.
pub fn select_log_files<I, S>(names: I, prefix: &str) -> Vec<LogFile>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let pattern = name_pattern(prefix);
    let mut files: Vec<LogFile> = names
        .into_iter()
        .filter_map(|name| parse_with(&pattern, name.as_ref()))
        .collect();
    files.sort();
    files
}

/// List `dir` and return its dated log files for `prefix`, oldest first.
pub async fn list_log_files(dir: &Path, prefix: &str) -> Result<Vec<LogFile>, MonitorError> {
    let listing_error = |source| MonitorError::Listing {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(listing_error)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(select_log_files(names, prefix))
}
