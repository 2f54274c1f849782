use super::dto::RawEventRecord;
use async_trait::async_trait;
use reqwest::{Client, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use serde_json::Value;
use tracing::{error, info, instrument};

const EVENTS_PATH: &str = "events";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("Received invalid response: {0}")]
    InvalidBody(String),

    #[error("Expected a list of events but got: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(reqwest_middleware::Error::Reqwest(err))
    }
}

/// Anything that can supply raw event records
#[async_trait]
pub trait EventSource {
    async fn fetch_events(&self) -> Result<Vec<RawEventRecord>, FetchError>;
}

pub struct EventsAPI {
    client: ClientWithMiddleware,
    events_url: Url,
    limit: Option<u32>,
}

impl EventsAPI {
    /// `max_retries` only applies to transient failures, 0 disables retrying
    pub fn new(base_url: &Url, max_retries: u32) -> Self {
        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(
                ExponentialBackoff::builder().build_with_max_retries(max_retries),
            ))
            .build();

        Self {
            client,
            events_url: events_url(base_url),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }

    fn request_url(&self) -> Url {
        let mut url = self.events_url.clone();

        if let Some(limit) = self.limit {
            url.query_pairs_mut()
                .append_pair("per_page", &limit.to_string());
        }

        url
    }
}

#[async_trait]
impl EventSource for EventsAPI {
    #[instrument(skip(self), fields(url = %self.events_url))]
    async fn fetch_events(&self) -> Result<Vec<RawEventRecord>, FetchError> {
        match self.limit {
            None => info!("Getting all events"),
            Some(amount) => info!("Getting {} events", amount),
        }

        let body = self
            .client
            .get(self.request_url())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let records = parse_events_body(&body)?;

        info!("Got {} events", records.len());

        Ok(records)
    }
}

pub fn parse_events_body(body: &str) -> Result<Vec<RawEventRecord>, FetchError> {
    let value = serde_json::from_str::<Value>(body).map_err(|e| {
        error!("Response parse failed: {:?}", e);
        FetchError::InvalidBody(e.to_string())
    })?;

    let kind = json_kind(&value);

    RawEventRecord::list_from_value(value).ok_or_else(|| {
        error!("Response is not a list (got {})", kind);
        FetchError::MalformedResponse(kind.to_string())
    })
}

fn events_url(base_url: &Url) -> Url {
    let mut url = base_url.clone();

    // Keep any path prefix, e.g. `https://host/api` -> `https://host/api/events`
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(EVENTS_PATH);
    }

    url
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
