//! League table pages: one page per league feeds both the team roster and
//! the standings.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{report_from, StageContext};
use crate::browser::{with_page, with_session};
use crate::directory::LeagueCriteria;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract::{Extract, LeagueTableRows};
use crate::limiter::ConcurrencyLimiter;
use crate::models::{Team, TeamStats, Topic};
use crate::pipeline::{Job, StageHandler, StageReport};

/// Which records a table page produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOutput {
    Teams,
    TeamStats,
}

impl TableOutput {
    fn topic(&self) -> Topic {
        match self {
            Self::Teams => Topic::TeamsCreated,
            Self::TeamStats => Topic::TeamStatsUpdated,
        }
    }
}

pub struct LeagueTableStage {
    ctx: StageContext,
    output: TableOutput,
}

impl LeagueTableStage {
    pub fn new(ctx: StageContext, output: TableOutput) -> Self {
        Self { ctx, output }
    }
}

/// Read league filters from a job payload. An empty payload means every
/// league; an unreadable one is logged and also means every league.
pub(crate) fn criteria_from(job: &Job) -> LeagueCriteria {
    if job.payload.is_null() {
        return LeagueCriteria::all();
    }
    match serde_json::from_value(job.payload.clone()) {
        Ok(criteria) => criteria,
        Err(e) => {
            warn!(
                stage = %job.stage,
                payload = %job.payload,
                "Unreadable league filter, scraping all leagues: {}",
                e
            );
            LeagueCriteria::all()
        }
    }
}

#[async_trait]
impl StageHandler for LeagueTableStage {
    async fn run(&self, job: &Job) -> ScrapeResult<StageReport> {
        let ctx = &self.ctx;
        let leagues = ctx.directory.get_leagues(&criteria_from(job)).await?;
        if leagues.is_empty() {
            info!(stage = %job.stage, "No leagues to scrape");
            return Ok(StageReport::default());
        }

        let output = self.output;
        let limiter = ConcurrencyLimiter::new(ctx.concurrency);

        let batch = with_session(ctx.sessions.as_ref(), |session| async move {
            let tasks = leagues
                .iter()
                .map(|league| {
                    let url = league.page_url(&ctx.base_url, "table");
                    let session = session.clone();
                    let task = async move {
                        let rows = with_page(session.as_ref(), &url, |page| async move {
                            LeagueTableRows.extract(page.as_ref()).await
                        })
                        .await?;

                        let league_id = league.reference();
                        let rows: Vec<TeamStats> = rows
                            .into_iter()
                            .map(|mut row| {
                                row.league_id = league_id.clone();
                                row
                            })
                            .collect();
                        debug!(league = %league.name, rows = rows.len(), "Table read");

                        let sent = match output {
                            TableOutput::Teams => {
                                let teams: Vec<Team> = rows.iter().map(TeamStats::team).collect();
                                ctx.publisher.emit_all(output.topic(), &teams).await
                            }
                            TableOutput::TeamStats => {
                                ctx.publisher.emit_all(output.topic(), &rows).await
                            }
                        };
                        Ok::<_, ScrapeError>(sent)
                    };
                    (league.name.clone(), task)
                })
                .collect();

            Ok(limiter.run(tasks).await)
        })
        .await?;

        let report = report_from(batch)?;
        info!(
            stage = %job.stage,
            emitted = report.emitted,
            succeeded = report.succeeded,
            failed = report.failed,
            "League tables scraped"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageId;
    use serde_json::json;

    fn job(payload: serde_json::Value) -> Job {
        Job::new(StageId::Teams, payload, 1)
    }

    #[test]
    fn test_empty_payload_means_all_leagues() {
        assert_eq!(criteria_from(&job(serde_json::Value::Null)), LeagueCriteria::all());
    }

    #[test]
    fn test_country_payload_is_read() {
        let criteria = criteria_from(&job(json!({ "country": "england" })));
        assert_eq!(criteria.country.as_deref(), Some("england"));
    }

    #[test]
    fn test_misspelled_filter_falls_back_to_all() {
        assert_eq!(
            criteria_from(&job(json!({ "contry": "england" }))),
            LeagueCriteria::all()
        );
        assert_eq!(criteria_from(&job(json!("england"))), LeagueCriteria::all());
    }
}
