//! Crawl the home page's league navigation.

use async_trait::async_trait;
use tracing::info;

use super::{crawl_and_publish, StageContext};
use crate::browser::with_session;
use crate::crawl::{Crawler, HeightPolicy};
use crate::error::ScrapeResult;
use crate::extract::LeagueLinks;
use crate::models::{League, Topic};
use crate::pipeline::{Job, StageHandler, StageReport};

pub struct LeaguesStage {
    ctx: StageContext,
}

impl LeaguesStage {
    pub fn new(ctx: StageContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl StageHandler for LeaguesStage {
    async fn run(&self, _job: &Job) -> ScrapeResult<StageReport> {
        let ctx = &self.ctx;
        let home = ctx.url("/");
        let crawler = Crawler::new(ctx.crawl.leagues_options());

        let sent = with_session(ctx.sessions.as_ref(), |session| async move {
            let mut policy = HeightPolicy::new();
            crawl_and_publish(
                session.as_ref(),
                &home,
                &crawler,
                &LeagueLinks,
                |league: &League| league.source_url.clone(),
                &mut policy,
                &ctx.publisher,
                Topic::LeaguesCreated,
            )
            .await
        })
        .await?;

        info!(leagues = sent, "League crawl complete");
        Ok(StageReport::emitted(sent))
    }
}
