use super::api::{EventSource, FetchError};
use super::dto::RawEventRecord;
use super::model::{CategorySet, NormalizationReport, NormalizedEvent, ALL_CATEGORIES};
use super::processor::{
    derive_categories, filter_by_category, normalize_with_diagnostics,
    partition_by_temporal_window,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Ready,
}

/// Identifies one fetch, only the latest one may update the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

/// In-memory state of one page view: the current events and category filter.
///
/// Results of fetches are applied in the order the fetches were started,
/// a response for an older fetch is dropped once a newer fetch has begun.
#[derive(Debug)]
pub struct EventFeed {
    events: Vec<NormalizedEvent>,
    report: NormalizationReport,
    selected_category: String,
    status: FeedStatus,
    generation: u64,
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeed {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            report: NormalizationReport::default(),
            selected_category: ALL_CATEGORIES.to_string(),
            status: FeedStatus::Idle,
            generation: 0,
        }
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.status = FeedStatus::Loading;

        debug!("Started fetch #{}", self.generation);

        FetchTicket(self.generation)
    }

    /// Returns false when the result was dropped because a newer fetch exists
    #[instrument(skip(self, result), fields(latest = self.generation))]
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<RawEventRecord>, FetchError>,
    ) -> bool {
        if ticket.0 != self.generation {
            info!("Discarding stale response");
            return false;
        }

        match result {
            Ok(records) => {
                let (events, report) = normalize_with_diagnostics(records);

                info!(
                    "Loaded {} events ({} defaulted fields)",
                    events.len(),
                    report.defaults.len()
                );

                self.events = events;
                self.report = report;
            }
            Err(err) => {
                warn!("Failed to fetch events (showing none). Err: {err}");

                self.events.clear();
                self.report = NormalizationReport::default();
            }
        }

        self.status = FeedStatus::Ready;

        true
    }

    pub async fn refresh<S>(&mut self, source: &S) -> bool
    where
        S: EventSource + Sync + ?Sized,
    {
        let ticket = self.begin_fetch();
        let result = source.fetch_events().await;

        self.complete_fetch(ticket, result)
    }

    /// Unknown categories are accepted and simply match nothing
    pub fn select_category(&mut self, category: &str) {
        if !self.categories().contains(category) {
            debug!("Selected category '{}' has no events", category);
        }

        self.selected_category = category.to_string();
    }

    pub fn selected_category(&self) -> &str {
        &self.selected_category
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    pub fn report(&self) -> &NormalizationReport {
        &self.report
    }

    pub fn categories(&self) -> CategorySet {
        derive_categories(&self.events)
    }

    /// Upcoming events of the selected category
    pub fn visible_events_at(&self, now: DateTime<Utc>) -> Vec<NormalizedEvent> {
        let partition = partition_by_temporal_window(&self.events, Some(now));

        filter_by_category(&partition.upcoming, &self.selected_category)
    }

    pub fn visible_events(&self) -> Vec<NormalizedEvent> {
        self.visible_events_at(Utc::now())
    }

    /// Failed fetches and empty results look the same here
    pub fn is_empty_state_at(&self, now: DateTime<Utc>) -> bool {
        self.status == FeedStatus::Ready && self.visible_events_at(now).is_empty()
    }
}
