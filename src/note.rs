use chrono::{DateTime, FixedOffset, Local, Utc};
use std::cmp::Ordering;

use crate::extract::{self, Mode};

/// Core Data counts seconds from 2001-01-01T00:00:00Z.
pub const APPLE_EPOCH_UNIX: i64 = 978_307_200;
/// Anything beyond ~63 years after the epoch is a corrupt value.
pub const MAX_TIMESTAMP_SECS: f64 = 63.0 * 365.25 * 86_400.0;
pub const DEFAULT_FOLDER: &str = "Notes";
pub const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, Default)]
pub struct Note {
    pub id: i64,
    pub title: Option<String>,
    pub identifier: String,
    pub folder: Option<String>,
    pub created: Option<f64>,
    pub modified: Option<f64>,
    pub body: Option<Vec<u8>>,
    /// Scripting id (`x-coredata://…/ICNote/p<id>`) when the store UUID is known.
    pub automation_id: Option<String>,
}

impl Note {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
    }

    pub fn folder_name(&self) -> &str {
        self.folder.as_deref().unwrap_or(DEFAULT_FOLDER)
    }

    pub fn search_text(&self) -> String {
        self.body.as_deref().map(extract::search_text).unwrap_or_default()
    }

    pub fn display_text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| extract::extract(b, Mode::Display))
            .unwrap_or_default()
    }

    /// Case-insensitive match against the title and the extracted body.
    pub fn matches(&self, query: &str, title_only: bool) -> bool {
        let q = query.to_lowercase();
        if self.display_title().to_lowercase().contains(&q) {
            return true;
        }
        !title_only && self.search_text().to_lowercase().contains(&q)
    }
}

#[derive(Debug, Clone)]
pub struct Folder {
    pub id: i64,
    pub title: String,
    pub identifier: String,
    pub account: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub name: String,
    pub kind: Option<i64>,
}

/// Convert a raw Core Data timestamp, rejecting negative, non-finite and
/// implausibly large values.
pub fn apple_timestamp(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw < 0.0 || raw > MAX_TIMESTAMP_SECS {
        return None;
    }
    let secs = raw.trunc() as i64;
    let nanos = (raw.fract() * 1e9) as u32;
    DateTime::from_timestamp(APPLE_EPOCH_UNIX + secs, nanos)
}

pub fn now_fixed() -> DateTime<FixedOffset> {
    Local::now().with_timezone(Local::now().offset())
}

/// Order raw timestamps with invalid values sorting first.
pub fn cmp_timestamps(a: Option<f64>, b: Option<f64>) -> Ordering {
    let a_dt = a.and_then(apple_timestamp);
    let b_dt = b.and_then(apple_timestamp);
    match (a_dt, b_dt) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
