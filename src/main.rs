use eventfeed::config::env_loader::load_config;
use eventfeed::events::api::EventsAPI;
use eventfeed::events::feed::EventFeed;
use eventfeed::events::model::DefaultedField;
use eventfeed::events::processor::partition_by_temporal_window;
use eventfeed::tracing::setup_tracing;
use std::error::Error;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let tracing_guard = setup_tracing().await;

    let config = load_config()?;
    let api = EventsAPI::new(&config.api_base_url, config.fetch_max_retries)
        .with_limit(config.debug_config.event_limit);

    let mut feed = EventFeed::new();
    feed.refresh(&api).await;
    feed.select_category(&config.category);

    info!("Categories: {}", feed.categories().as_slice().join(", "));

    let visible = feed.visible_events();

    if visible.is_empty() {
        info!("No upcoming events for '{}'", feed.selected_category());
    }

    visible.iter().for_each(|event| {
        info!(
            "Upcoming {}: {} on {}",
            event.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            event.title.as_deref().unwrap_or_default(),
            event.canonical_date().unwrap_or_default()
        )
    });

    let past = partition_by_temporal_window(feed.events(), None).past;
    info!("{} past events", past.len());

    let report = feed.report();
    for field in [
        DefaultedField::DateMissing,
        DefaultedField::DateUnparseable,
        DefaultedField::ImageUrl,
    ] {
        let count = report.count(field);
        if count > 0 {
            warn!("{} event(s) defaulted {}", count, field);
        }
    }

    tracing_guard.shutdown().await;

    Ok(())
}
