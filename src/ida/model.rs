use std::hash::{Hash, Hasher};

/// Every event is searched for through the city facet, so this is never parsed
pub const CITY: &str = "København";
pub const SITE_ORIGIN: &str = "https://ida.dk";

/// An event listed on ida.dk.
///
/// Two events are the same when their canonical links match, regardless of title.
#[derive(Debug, Clone)]
pub struct Event {
    pub city: String,
    pub title: String,
    /// ISO date (`YYYY-MM-DD`), empty when none was found
    pub date: String,
    /// `HH:MM`, empty when none was found
    pub time: String,
    pub link: String,
}

impl Event {
    pub fn new(title: String, date: String, time: String, link: String) -> Self {
        Self {
            city: CITY.to_string(),
            title,
            date,
            time,
            link,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.link == other.link
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link.hash(state);
    }
}

/// One page of search results
#[derive(Debug, Clone)]
pub struct EventsPage {
    pub events: Vec<Event>,
    /// Total amount of documents reported by the search, across every page
    pub total: u64,
}

#[derive(strum::IntoStaticStr, Debug, Clone, Copy)]
pub enum Category {
    Arrangementer,
}

#[derive(strum::IntoStaticStr, Debug, Clone, Copy)]
pub enum Status {
    Afholdes,
    Venteliste,
}
