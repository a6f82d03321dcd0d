//! The five scraping stages and the graph that connects them.
//!
//! ```text
//! Leagues ──▶ Teams ──▶ TeamStats
//!                  └──▶ Matches
//! LiveMatches (independent, polled)
//! ```

mod leagues;
mod live_matches;
mod matches;
mod tables;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::browser::{with_page, BrowserSession, ChromeSessionProvider, SessionProvider};
use crate::config::{Config, CrawlConfig, DirectoryConfig, SinkConfig};
use crate::crawl::{Crawler, TerminationPolicy};
use crate::dedup::{EventDedupCache, EventStore, InMemoryEventStore};
use crate::directory::{HttpLeagueDirectory, LeagueDirectory, StaticLeagueDirectory};
use crate::error::ScrapeResult;
use crate::extract::Extract;
use crate::limiter::BatchResult;
use crate::models::Topic;
use crate::pipeline::{Scheduler, StageId, StageReport};
use crate::sink::{LogSink, Publisher, RecordSink};

pub use leagues::LeaguesStage;
pub use live_matches::LiveMatchesStage;
pub use matches::MatchesStage;
pub use tables::{LeagueTableStage, TableOutput};

/// Downstream stages for each stage.
pub const STAGE_GRAPH: [(StageId, &[StageId]); 5] = [
    (StageId::Leagues, &[StageId::Teams]),
    (StageId::Teams, &[StageId::TeamStats, StageId::Matches]),
    (StageId::TeamStats, &[]),
    (StageId::Matches, &[]),
    (StageId::LiveMatches, &[]),
];

/// External collaborators the stages depend on.
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<dyn SessionProvider>,
    pub directory: Arc<dyn LeagueDirectory>,
    pub sink: Arc<dyn RecordSink>,
    pub events: Arc<dyn EventStore>,
}

impl Services {
    /// Build the production collaborators described by `config`.
    pub async fn from_config(config: &Config) -> ScrapeResult<Self> {
        let sessions: Arc<dyn SessionProvider> = Arc::new(ChromeSessionProvider::new(
            config.browser.clone(),
            config.base_url(),
        ));

        let directory: Arc<dyn LeagueDirectory> = match config.directory {
            DirectoryConfig::Http {
                ref url,
                timeout_secs,
            } => Arc::new(HttpLeagueDirectory::new(
                url.clone(),
                Duration::from_secs(timeout_secs),
            )?),
            DirectoryConfig::Static { ref leagues } => {
                if leagues.is_empty() {
                    tracing::warn!("League directory is empty; per-league stages will do nothing");
                }
                Arc::new(StaticLeagueDirectory::new(leagues.clone()))
            }
        };

        let sink = sink_from_config(&config.sink).await?;
        info!(sink = sink.name(), "Result sink ready");

        Ok(Self {
            sessions,
            directory,
            sink,
            events: Arc::new(InMemoryEventStore::new()),
        })
    }
}

#[cfg(feature = "amqp-broker")]
async fn sink_from_config(config: &SinkConfig) -> ScrapeResult<Arc<dyn RecordSink>> {
    match config {
        SinkConfig::Log => Ok(Arc::new(LogSink)),
        SinkConfig::Amqp { url, exchange } => {
            Ok(Arc::new(crate::sink::AmqpSink::connect(url, exchange).await?))
        }
    }
}

#[cfg(not(feature = "amqp-broker"))]
async fn sink_from_config(config: &SinkConfig) -> ScrapeResult<Arc<dyn RecordSink>> {
    match config {
        SinkConfig::Log => Ok(Arc::new(LogSink)),
        SinkConfig::Amqp { .. } => Err(crate::error::ScrapeError::Configuration(
            "AMQP sink not compiled. Rebuild with: cargo build --features amqp-broker".to_string(),
        )),
    }
}

/// What every stage handler shares.
#[derive(Clone)]
pub struct StageContext {
    pub base_url: String,
    pub sessions: Arc<dyn SessionProvider>,
    pub directory: Arc<dyn LeagueDirectory>,
    pub publisher: Publisher,
    pub concurrency: usize,
    pub crawl: CrawlConfig,
}

impl StageContext {
    pub fn new(config: &Config, services: &Services) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            sessions: services.sessions.clone(),
            directory: services.directory.clone(),
            publisher: Publisher::new(services.sink.clone()),
            concurrency: config.concurrency,
            crawl: config.crawl.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Register the five stages with their downstream edges and configured schedules.
pub fn build_scheduler(config: &Config, services: &Services) -> ScrapeResult<Scheduler> {
    let ctx = StageContext::new(config, services);
    let cache = EventDedupCache::new(services.events.clone());

    let mut scheduler = Scheduler::new();
    for (id, downstream) in STAGE_GRAPH {
        let handler: Arc<dyn crate::pipeline::StageHandler> = match id {
            StageId::Leagues => Arc::new(LeaguesStage::new(ctx.clone())),
            StageId::Teams => Arc::new(LeagueTableStage::new(ctx.clone(), TableOutput::Teams)),
            StageId::TeamStats => {
                Arc::new(LeagueTableStage::new(ctx.clone(), TableOutput::TeamStats))
            }
            StageId::Matches => Arc::new(MatchesStage::new(ctx.clone())),
            StageId::LiveMatches => Arc::new(LiveMatchesStage::new(ctx.clone(), cache.clone())),
        };
        scheduler.register_stage(id, handler, downstream)?;
    }

    for (id, interval) in config.intervals()? {
        scheduler.schedule(id, interval)?;
    }

    Ok(scheduler)
}

/// Crawl one list page, streaming newly seen records to the sink.
///
/// Returns how many records were handed off.
pub(crate) async fn crawl_and_publish<T, E, K>(
    session: &dyn BrowserSession,
    url: &str,
    crawler: &Crawler,
    extractor: &E,
    key: K,
    policy: &mut dyn TerminationPolicy,
    publisher: &Publisher,
    topic: Topic,
) -> ScrapeResult<usize>
where
    T: Serialize + Clone + Send + Sync,
    E: Extract<T> + ?Sized,
    K: Fn(&T) -> String + Send + Sync,
{
    let sent = std::sync::atomic::AtomicUsize::new(0);
    let sent_ref = &sent;

    let crawled = with_page(session, url, |page| async move {
        crawler
            .crawl(page.as_ref(), extractor, key, policy, |fresh: Vec<T>| async move {
                let n = publisher.emit_all(topic, &fresh).await;
                sent_ref.fetch_add(n, std::sync::atomic::Ordering::SeqCst);
            })
            .await
    })
    .await?;

    tracing::debug!(
        url,
        topic = %topic,
        iterations = crawled.iterations,
        records = crawled.records.len(),
        "Crawl finished"
    );
    Ok(sent.into_inner())
}

/// Fold a batch of per-task sent counts into a stage report.
///
/// A stage-fatal task error (dead session, event store failure) fails the
/// stage run so nothing downstream is triggered.
pub(crate) fn report_from(batch: BatchResult<usize>) -> ScrapeResult<StageReport> {
    let batch = batch.check_fatal()?;
    Ok(StageReport {
        emitted: batch.succeeded.iter().map(|(_, n)| n).sum(),
        succeeded: batch.succeeded.len(),
        failed: batch.failed.len(),
    })
}
