use super::dto::{SearchRequest, SearchResponse};
use super::extractor::{AnchorExtractor, EventExtractor};
use super::model::{Event, EventsPage, SITE_ORIGIN};
use crate::config::model::SearchConfig;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT,
};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const REFERER_URL: &str = "https://ida.dk/soeg";
const CLIENT_USER_AGENT: &str = "Mozilla/5.0 (IDA-events-watcher-email)";
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

/// Anything that yields the current events of a poll
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<Event>, FetchError>;
}

pub struct IdaSearchAPI {
    client: Client,
    endpoint: String,
    per_page: u32,
    skip_past_events: bool,
    retry: RetryPolicy,
    extractor: Arc<dyn EventExtractor>,
}

impl IdaSearchAPI {
    pub fn new(config: &SearchConfig) -> Result<Self, FetchError> {
        Self::with_request_timeout(config, REQUEST_TIMEOUT)
    }

    /// Requests without a response within `timeout` fail
    pub fn with_request_timeout(
        config: &SearchConfig,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(Self::default_headers(&config.auth_header)?)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            per_page: config.per_page.max(1),
            skip_past_events: config.skip_past_events,
            retry: RetryPolicy::exponential(),
            extractor: Arc::new(AnchorExtractor),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn EventExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    fn default_headers(auth_header: &str) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        let mut authorization =
            HeaderValue::from_str(auth_header).map_err(|_| FetchError::InvalidAuthHeader)?;

        authorization.set_sensitive(true);

        headers.insert(AUTHORIZATION, authorization);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
        headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));
        headers.insert(
            "x-requested-with",
            HeaderValue::from_static("XMLHttpRequest"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        Ok(headers)
    }

    /// Fetches a single page, retrying on any failure
    #[instrument(skip(self))]
    pub async fn get_page(&self, page: u32) -> Result<EventsPage, FetchError> {
        self.retry.run(|| self.try_get_page(page)).await
    }

    async fn try_get_page(&self, page: u32) -> Result<EventsPage, FetchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SearchRequest::new(page, self.per_page))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                body: body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect(),
            });
        }

        let parsed = serde_json::from_str::<SearchResponse>(&body)?;
        let events = self.extractor.extract(parsed.html());

        debug!("Page {} has {} events", page, events.len());

        Ok(EventsPage {
            events,
            total: parsed.total_documents,
        })
    }

    /// Returns the events of every page, in search order and without repeated links
    #[instrument(skip(self))]
    pub async fn get_all_events(&self) -> Result<Vec<Event>, FetchError> {
        let first = self.get_page(1).await?;
        let pages = page_count(first.total, self.per_page);

        info!(
            "TotalDocuments: {}, pages: {}, perPage: {}, firstPageEvents: {}",
            first.total,
            pages,
            self.per_page,
            first.events.len()
        );

        let mut links: HashSet<String> = first.events.iter().map(|e| e.link.clone()).collect();
        let mut events = first.events;

        for page in 2..=pages {
            let fetched = self.get_page(page).await?.events;
            let fetched_count = fetched.len();
            let new_on_page: Vec<Event> = fetched
                .into_iter()
                .filter(|event| links.insert(event.link.clone()))
                .collect();

            info!(
                "Page {}: fetched {}, new after dedup: {}",
                page,
                fetched_count,
                new_on_page.len()
            );

            events.extend(new_on_page);
        }

        if self.skip_past_events {
            events = drop_past_events(events, Utc::now().date_naive());
        }

        Ok(events)
    }
}

#[async_trait]
impl EventSource for IdaSearchAPI {
    async fn fetch_events(&self) -> Result<Vec<Event>, FetchError> {
        self.get_all_events().await
    }
}

/// At least one page, even when the search reports nothing
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if total == 0 {
        return 1;
    }

    u32::try_from(total.div_ceil(u64::from(per_page.max(1)))).unwrap_or(u32::MAX)
}

/// Drops events dated before today. Undated events are always kept.
pub fn drop_past_events(events: Vec<Event>, today: NaiveDate) -> Vec<Event> {
    let today = today.format("%Y-%m-%d").to_string();

    events
        .into_iter()
        .filter(|event| event.date.is_empty() || event.date >= today)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Received invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("The authorization header is not a valid header value")]
    InvalidAuthHeader,
}
