//! Fixtures and results for every league.

use async_trait::async_trait;
use tracing::info;

use super::tables::criteria_from;
use super::{crawl_and_publish, report_from, StageContext};
use crate::browser::{with_session, PageHandle};
use crate::crawl::Crawler;
use crate::error::ScrapeResult;
use crate::extract::{Extract, MatchRows};
use crate::limiter::ConcurrencyLimiter;
use crate::models::{current_year, Fixture, Topic};
use crate::pipeline::{Job, StageHandler, StageReport};

/// Match rows tagged with their league and a resolved kickoff time.
struct LeagueMatchRows {
    rows: MatchRows,
    league_id: String,
    year: i32,
}

#[async_trait]
impl Extract<Fixture> for LeagueMatchRows {
    async fn extract(&self, page: &dyn PageHandle) -> ScrapeResult<Vec<Fixture>> {
        let rows = self.rows.extract(page).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.resolve(&self.league_id, self.year))
            .collect())
    }
}

pub struct MatchesStage {
    ctx: StageContext,
}

impl MatchesStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StageHandler for MatchesStage {
    async fn run(&self, job: &Job) -> ScrapeResult<StageReport> {
        let ctx = &self.ctx;
        let leagues = ctx.directory.get_leagues(&criteria_from(job)).await?;
        if leagues.is_empty() {
            info!("No leagues to scrape matches for");
            return Ok(StageReport::default());
        }

        let crawler = Crawler::new(ctx.crawl.options());
        let crawler = &crawler;
        let limiter = ConcurrencyLimiter::new(ctx.concurrency);
        let year = current_year();

        let batch = with_session(ctx.sessions.as_ref(), |session| async move {
            let mut tasks = Vec::with_capacity(leagues.len() * 2);
            for league in &leagues {
                for (suffix, rows) in [
                    ("fixtures", MatchRows::fixtures()),
                    ("results", MatchRows::results()),
                ] {
                    let url = league.page_url(&ctx.base_url, suffix);
                    let extractor = LeagueMatchRows {
                        rows,
                        league_id: league.reference(),
                        year,
                    };
                    let session = session.clone();
                    let label = format!("{} {}", league.name, suffix);
                    tasks.push((label, async move {
                        let mut policy = ctx
                            .crawl
                            .matches_strategy
                            .policy(&ctx.crawl.index_selector, ctx.crawl.repeat_threshold);
                        crawl_and_publish(
                            session.as_ref(),
                            &url,
                            crawler,
                            &extractor,
                            |fixture: &Fixture| fixture.source_url.clone(),
                            policy.as_mut(),
                            &ctx.publisher,
                            Topic::MatchesCreated,
                        )
                        .await
                    }));
                }
            }

            Ok(limiter.run(tasks).await)
        })
        .await?;

        let report = report_from(batch)?;
        info!(
            emitted = report.emitted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Matches scraped"
        );
        Ok(report)
    }
}
