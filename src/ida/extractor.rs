//! Extraction of events from the HTML fragments returned by the IDA search.
//!
//! The search answers with pre-rendered result markup, so events are picked out of
//! their anchors. Extraction is best-effort: unexpected markup yields fewer events,
//! never an error.

use super::model::{Event, SITE_ORIGIN};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Characters following an anchor that are searched for its date and time
pub const CONTEXT_WINDOW_CHARS: usize = 800;

lazy_static! {
    static ref ANCHOR: Regex =
        Regex::new(r#"(?is)<a[^>]+href="([^"]+)"[^>]*>(.*?)</a>"#).expect("Invalid anchor regex");
    static ref EVENT_PATH: Regex = Regex::new(r"(?i)/event/").expect("Invalid event path regex");
    static ref COURSE_LISTING_PATH: Regex =
        Regex::new(r"(?i)/arrangementer-og-kurser/arrangementer/")
            .expect("Invalid course listing path regex");
    static ref HAS_SCHEME: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("Invalid scheme regex");
    static ref TAG: Regex = Regex::new(r"<[^>]+>").expect("Invalid tag regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("Invalid whitespace regex");
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"\b([0-9]{1,2})[.\-/]([0-9]{1,2})[.\-/]([0-9]{4}|[0-9]{2})\b")
            .expect("Invalid date regex");
    static ref CLOCK_TIME: Regex =
        Regex::new(r"(?i)\bkl\.?\s*([0-9]{1,2})[:.]([0-9]{2})\b").expect("Invalid time regex");
}

/// Turns a search result fragment into events
pub trait EventExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Vec<Event>;
}

/// Pattern based extractor for the result markup of the IDA search
#[derive(Debug, Default, Clone, Copy)]
pub struct AnchorExtractor;

impl EventExtractor for AnchorExtractor {
    fn extract(&self, html: &str) -> Vec<Event> {
        extract_events(html)
    }
}

/// Returns the events in document order, keeping the first anchor of each canonical link
pub fn extract_events(html: &str) -> Vec<Event> {
    let mut seen_links = HashSet::new();
    let mut events = Vec::new();

    for anchor in ANCHOR.captures_iter(html) {
        let href = &anchor[1];

        if !is_event_link(href) {
            continue;
        }

        let link = canonical_url(&resolve_link(href));

        if !seen_links.insert(link.clone()) {
            continue;
        }

        let anchor_end = anchor.get(0).map_or(html.len(), |m| m.end());
        let context = strip_tags(context_after(html, anchor_end));

        events.push(Event::new(
            strip_tags(&anchor[2]),
            extract_date(&context),
            extract_time(&context),
            link,
        ));
    }

    events
}

/// Whether the href points at an event page or a course listing
pub fn is_event_link(href: &str) -> bool {
    EVENT_PATH.is_match(href) || COURSE_LISTING_PATH.is_match(href)
}

/// Makes the href absolute against the IDA site
pub fn resolve_link(href: &str) -> String {
    if HAS_SCHEME.is_match(href) {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{SITE_ORIGIN}{href}")
    } else {
        format!("{SITE_ORIGIN}/{href}")
    }
}

/// Drops the query and fragment.
/// Unparsable links are returned untouched.
pub fn canonical_url(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => link.to_string(),
    }
}

pub fn strip_tags(html: &str) -> String {
    let text = TAG.replace_all(html, " ");

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn context_after(html: &str, start: usize) -> &str {
    let rest = &html[start..];
    let end = rest
        .char_indices()
        .nth(CONTEXT_WINDOW_CHARS)
        .map_or(rest.len(), |(index, _)| index);

    &rest[..end]
}

/// Finds the first real `dd.mm.yyyy`-like date (`.`, `-` or `/` separated) as ISO.
/// Two digit years are in the 2000s. Time ranges such as `17.00-19.00` are skipped.
pub fn extract_date(text: &str) -> String {
    NUMERIC_DATE
        .captures_iter(text)
        .find_map(|date| {
            let day = date[1].parse().ok()?;
            let month = date[2].parse().ok()?;
            let year: i32 = date[3].parse().ok()?;
            let year = if date[3].len() == 2 { 2000 + year } else { year };

            NaiveDate::from_ymd_opt(year, month, day)
        })
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Finds a Danish `kl. 19.00`-like time as `HH:MM`
pub fn extract_time(text: &str) -> String {
    CLOCK_TIME
        .captures(text)
        .map(|time| format!("{}:{}", &time[1], &time[2]))
        .unwrap_or_default()
}
