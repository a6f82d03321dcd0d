//! Poll the live listing and notify on match events not seen before.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{report_from, StageContext};
use crate::browser::{with_page, with_session};
use crate::crawl::{Crawler, HeightPolicy};
use crate::dedup::EventDedupCache;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::{Extract, LiveMatchLinks, MatchDetail};
use crate::limiter::ConcurrencyLimiter;
use crate::models::{MatchEventNotification, Topic};
use crate::pipeline::{Job, StageHandler, StageReport};

/// Path of the live listing, relative to the base URL.
pub const LIVE_LISTING_PATH: &str = "/en/football/live/";

pub struct LiveMatchesStage {
    ctx: StageContext,
    cache: EventDedupCache,
}

impl LiveMatchesStage {
    pub fn new(ctx: StageContext, cache: EventDedupCache) -> Self {
        Self { ctx, cache }
    }
}

#[async_trait]
impl StageHandler for LiveMatchesStage {
    async fn run(&self, _job: &Job) -> ScrapeResult<StageReport> {
        let ctx = &self.ctx;
        let cache = &self.cache;
        let listing = ctx.url(LIVE_LISTING_PATH);
        let crawler = Crawler::new(ctx.crawl.options());
        let limiter = ConcurrencyLimiter::new(ctx.concurrency);

        let batch = with_session(ctx.sessions.as_ref(), |session| async move {
            let links = with_page(session.as_ref(), &listing, |page| async move {
                let mut policy = HeightPolicy::new();
                let crawled = crawler
                    .crawl(
                        page.as_ref(),
                        &LiveMatchLinks,
                        |link: &String| link.clone(),
                        &mut policy,
                        |_| async {},
                    )
                    .await?;
                Ok(crawled.records)
            })
            .await?;
            debug!(matches = links.len(), "Live matches listed");

            let tasks = links
                .iter()
                .map(|link| {
                    let url = format!("{}{}?tab=events", ctx.base_url, link);
                    let session = session.clone();
                    let task = async move {
                        let snapshot = with_page(session.as_ref(), &url, |page| async move {
                            MatchDetail.extract(page.as_ref()).await
                        })
                        .await?
                        .into_iter()
                        .next()
                        .unwrap_or_default();

                        let fresh = cache.observe(link, snapshot.events.clone()).await?;
                        let mut sent: usize = 0;
                        for event in fresh {
                            let notification = MatchEventNotification {
                                home_team_url: snapshot.home_team_url.clone(),
                                away_team_url: snapshot.away_team_url.clone(),
                                league_url: snapshot.league_url.clone(),
                                match_url: link.clone(),
                                event,
                            };
                            if ctx.publisher.emit(Topic::MatchEventNotify, &notification).await {
                                sent += 1;
                            }
                        }
                        Ok::<_, ScrapeError>(sent)
                    };
                    (link.clone(), task)
                })
                .collect();

            Ok(limiter.run(tasks).await)
        })
        .await?;

        let report = report_from(batch)?;

        // The baseline ends with the first poll that got this far, matches
        // with isolated failures included.
        if let Err(e) = cache.complete_poll().await {
            warn!("Failed to close live poll: {}", e);
        }

        let tracked = match cache.store().tracked_keys().await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("Failed to count tracked matches: {}", e);
                None
            }
        };
        info!(
            notifications = report.emitted,
            matches = report.succeeded + report.failed,
            failed = report.failed,
            tracked_matches = ?tracked,
            "Live poll complete"
        );
        Ok(report)
    }
}
