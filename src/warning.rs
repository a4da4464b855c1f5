//! Warning extraction engine.
//!
//! Converts one raw [`FeedItem`] into a normalized [`Warning`] using tolerant
//! pattern extraction. The upstream feed is human-oriented text whose exact
//! shape has drifted between revisions, so every field degrades independently:
//! an unrecognized severity becomes [`WarningLevel::Unknown`], missing hazard
//! types become `["Unknown"]`, and an unparseable time window becomes the
//! "Unknown Period" sentinel. Only a missing `<title>` drops the item.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::feed::FeedItem;

/// Severity leads the title, e.g. "Yellow warning of Wind affecting ...".
static LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(yellow|amber|red)").expect("hard-coded regex"));

/// Hazard types sit between "of" and "affecting" in the title.
static TYPES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bof (.+?) affecting").expect("hard-coded regex"));

/// Titles list several hazards as "Wind and Rain" or "Snow, Ice".
static TYPE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i),|\band\b").expect("hard-coded regex"));

/// Preferred period phrase, found in the item description.
static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)valid from (.+?) to (.+)").expect("hard-coded regex"));

/// Fallback period shape embedded in some feed revisions' pubDate,
/// e.g. "Mon 06:00 - Mon 18:00".
static PUBDATE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([A-Za-z]{3}[a-z]*\s+\d{1,2}:\d{2})\s*-\s*([A-Za-z]{3}[a-z]*\s+\d{1,2}:\d{2})")
        .expect("hard-coded regex")
});

/// Compact timestamp form used by the description phrase: "HHMM day" with an
/// optional "day-of-month month" tail, e.g. "0600 Mon" or "0600 Mon 12 Aug".
static COMPACT_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<time>\d{4})\s+(?P<day>[A-Za-z]{3})(?:\s+(?P<date>\d{1,2}\s+[A-Za-z]+))?\b")
        .expect("hard-coded regex")
});

// ============================================================================
// Data Model
// ============================================================================

/// Three-tier severity scale used by the source authority.
///
/// Unrecognized text maps to `Unknown`; level extraction never fails an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningLevel {
    Yellow,
    Amber,
    Red,
    Unknown,
}

impl WarningLevel {
    /// Matches the leading token of a warning title, case-insensitively and
    /// anchored at the start. Titles consistently lead with severity, but a
    /// future format drift degrades to `Unknown` rather than rejecting the
    /// item.
    pub fn from_title(title: &str) -> Self {
        match LEVEL_RE.find(title) {
            Some(m) => match m.as_str().to_ascii_lowercase().as_str() {
                "yellow" => Self::Yellow,
                "amber" => Self::Amber,
                "red" => Self::Red,
                _ => Self::Unknown,
            },
            None => Self::Unknown,
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Yellow => "Yellow",
            Self::Amber => "Amber",
            Self::Red => "Red",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// The time window during which a warning is in effect.
///
/// The feed carries no year or timezone, so the bounds stay as display text:
/// either a normalized "day [month] HH:MM" string or the verbatim captured
/// substring when normalization is not possible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidPeriod {
    Range { start: String, end: String },
    Unknown,
}

impl fmt::Display for ValidPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { start, end } => write!(f, "{} - {}", start, end),
            Self::Unknown => f.write_str("Unknown Period"),
        }
    }
}

/// One normalized weather warning.
///
/// Immutable after construction; a fresh list is built on every refresh
/// cycle and owned by the controller's current snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: WarningLevel,
    /// Hazard categories named in the title, trimmed and title-cased.
    /// Never empty: `["Unknown"]` when none could be extracted.
    pub types: Vec<String>,
    pub valid_period: ValidPeriod,
    pub image_url: Option<String>,
    pub link: Option<String>,
}

impl fmt::Display for Warning {
    /// Renders "Wind & Rain (Mon 06:00 - Mon 18:00)".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.types.join(" & "), self.valid_period)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses one feed item into a [`Warning`].
///
/// Returns `None` only when the item has no title — an expected, non-fatal
/// outcome; the item is dropped from the cycle's result list. All other
/// extraction steps fall back field by field and this function never errors.
pub fn parse(item: &FeedItem) -> Option<Warning> {
    let title = item.title.as_deref()?;

    Some(Warning {
        level: WarningLevel::from_title(title),
        types: extract_types(title),
        valid_period: extract_period(item.description.as_deref(), item.pub_date.as_deref()),
        image_url: item.enclosure_url.clone(),
        link: item.link.clone(),
    })
}

/// Extracts hazard types from the "of ... affecting" span of the title,
/// splitting the captured list on commas and the connective "and".
fn extract_types(title: &str) -> Vec<String> {
    let types: Vec<String> = TYPES_RE
        .captures(title)
        .map(|caps| {
            TYPE_SPLIT_RE
                .split(&caps[1])
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(title_case)
                .collect()
        })
        .unwrap_or_default();

    if types.is_empty() {
        vec!["Unknown".to_string()]
    } else {
        types
    }
}

/// Locates the valid period, preferring the description's "valid from X to Y"
/// phrase and falling back to a "day hh:mm - day hh:mm" range embedded in
/// pubDate. Neither matching → the sentinel. Never errors.
fn extract_period(description: Option<&str>, pub_date: Option<&str>) -> ValidPeriod {
    if let Some(desc) = description {
        if let Some(caps) = PERIOD_RE.captures(desc) {
            return ValidPeriod::Range {
                start: normalize_timestamp(caps[1].trim()),
                end: normalize_timestamp(caps[2].trim()),
            };
        }
    }

    if let Some(pd) = pub_date {
        if let Some(caps) = PUBDATE_RANGE_RE.captures(pd) {
            return ValidPeriod::Range {
                start: caps[1].to_string(),
                end: caps[2].to_string(),
            };
        }
    }

    ValidPeriod::Unknown
}

/// Rewrites a compact "HHMM day [month]" capture as "day [month] HH:MM".
///
/// Upstream date formats are known to vary between feed revisions, so any
/// capture that does not match the compact form — or whose time token is not
/// a real time of day — passes through verbatim rather than failing the item.
fn normalize_timestamp(raw: &str) -> String {
    let Some(caps) = COMPACT_TIME_RE.captures(raw) else {
        return raw.to_string();
    };

    let time = &caps["time"];
    if chrono::NaiveTime::parse_from_str(time, "%H%M").is_err() {
        // Four digits but not a time of day, e.g. "2590"
        return raw.to_string();
    }
    let (hours, minutes) = time.split_at(2);

    match caps.name("date") {
        Some(date) => format!("{} {} {}:{}", &caps["day"], date.as_str(), hours, minutes),
        None => format!("{} {}:{}", &caps["day"], hours, minutes),
    }
}

/// First letter uppercased, rest lowered: "wind" → "Wind", "RAIN" → "Rain".
fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================
