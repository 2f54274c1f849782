use lazy_static::lazy_static;
use std::{env, io};
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};
use tracing_loki::url::{ParseError, Url};
use tracing_loki::{BackgroundTask, BackgroundTaskController};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter, fmt};

const SERVICE_NAME: &str = "eventfeed";

lazy_static! {
    static ref LOKI_URL: Option<String> = env::var("LOKI_URL").ok();
}

#[derive(Debug, thiserror::Error)]
pub enum LokiError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("failed building layer: {0}")]
    Layer(#[from] tracing_loki::Error),
}

type LokiParts = (tracing_loki::Layer, BackgroundTaskController, BackgroundTask);

/// Keeps log shipping alive, call [`TracingGuard::shutdown`] before exiting to flush it
#[derive(Default)]
pub struct TracingGuard {
    loki: Option<(BackgroundTaskController, JoinHandle<()>)>,
}

impl TracingGuard {
    pub fn ships_to_loki(&self) -> bool {
        self.loki.is_some()
    }

    pub async fn shutdown(self) {
        if let Some((controller, handle)) = self.loki {
            controller.shutdown().await;

            if let Err(err) = handle.await {
                warn!("Loki task ended abnormally: {err}");
            }
        }
    }
}

fn log_filter() -> filter::Targets {
    filter::Targets::new()
        .with_target(SERVICE_NAME, Level::TRACE)
        .with_default(Level::WARN)
}

fn build_loki_layer(url: Url) -> Result<LokiParts, LokiError> {
    Ok(tracing_loki::builder()
        .label("service", SERVICE_NAME)?
        .build_controller_url(url)?)
}

async fn connect_loki(raw_url: &str) -> Result<LokiParts, LokiError> {
    let url: Url = raw_url.parse()?;

    reqwest::get(url.clone()).await?;

    build_loki_layer(url)
}

/// Logs to stdout, and to Loki too when `LOKI_URL` is set and reachable
pub async fn setup_tracing() -> TracingGuard {
    let registry = tracing_subscriber::registry()
        .with(log_filter())
        .with(fmt::layer().with_writer(io::stdout));

    let Some(raw_url) = LOKI_URL.as_deref() else {
        registry.init();
        warn!("Loki URL not provided. Continuing without it.");
        return TracingGuard::default();
    };

    match connect_loki(raw_url).await {
        Ok((layer, controller, task)) => {
            registry.with(layer).init();
            let handle = tokio::spawn(task);

            info!("Loki initialized");

            TracingGuard {
                loki: Some((controller, handle)),
            }
        }
        Err(err) => {
            registry.init();
            warn!("Loki {err}. Continuing without it.");

            TracingGuard::default()
        }
    }
}
