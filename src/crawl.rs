//! Pagination crawler for infinitely scrolling list pages.
//!
//! Each iteration runs extract, union, forward new records, scroll, settle,
//! then measure. What gets measured and when to stop is decided by a
//! [`TerminationPolicy`]; the two policies detect different rendering
//! behaviours and are picked per call site.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::PageHandle;
use crate::error::ScrapeResult;
use crate::extract::Extract;

/// Default scroll step in pixels.
pub const DEFAULT_SCROLL_STEP: u32 = 1000;
/// Default number of unchanged index readings tolerated before stopping.
pub const DEFAULT_REPEAT_THRESHOLD: u32 = 2;
/// Hard cap on loop iterations for a single crawl.
pub const DEFAULT_MAX_ITERATIONS: usize = 500;

/// One reading of the page after a scroll settled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observation {
    /// `scrollY + innerHeight`.
    pub extent: Option<f64>,
    /// Highest rendered item index, if the list exposes one.
    pub index: Option<u64>,
}

/// Stop condition for a crawl loop.
#[async_trait]
pub trait TerminationPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Read this policy's signal from the page.
    async fn observe(&self, page: &dyn PageHandle) -> ScrapeResult<Observation>;

    /// Whether the crawler should take a reading before the first extraction.
    fn needs_baseline(&self) -> bool {
        false
    }

    fn record_baseline(&mut self, _observation: &Observation) {}

    fn should_stop(&mut self, observation: &Observation) -> bool;
}

/// Stops once the viewport's bottom edge did not move after a scroll.
#[derive(Debug, Default)]
pub struct HeightPolicy {
    last: Option<f64>,
}

impl HeightPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TerminationPolicy for HeightPolicy {
    fn name(&self) -> &'static str {
        "height"
    }

    async fn observe(&self, page: &dyn PageHandle) -> ScrapeResult<Observation> {
        Ok(Observation {
            extent: Some(page.scroll_extent().await?),
            index: None,
        })
    }

    fn needs_baseline(&self) -> bool {
        true
    }

    fn record_baseline(&mut self, observation: &Observation) {
        self.last = observation.extent;
    }

    fn should_stop(&mut self, observation: &Observation) -> bool {
        let Some(current) = observation.extent else {
            return true;
        };
        let grew = self.last.map_or(true, |previous| current > previous);
        self.last = Some(current);
        !grew
    }
}

/// Stops once the highest rendered index has repeated more than
/// `repeat_threshold` times, provided it is non-zero.
#[derive(Debug)]
pub struct IndexPolicy {
    selector: String,
    repeat_threshold: u32,
    last: Option<u64>,
    repeats: u32,
}

impl IndexPolicy {
    pub fn new(selector: impl Into<String>, repeat_threshold: u32) -> Self {
        Self {
            selector: selector.into(),
            repeat_threshold,
            last: None,
            repeats: 0,
        }
    }
}

#[async_trait]
impl TerminationPolicy for IndexPolicy {
    fn name(&self) -> &'static str {
        "index"
    }

    async fn observe(&self, page: &dyn PageHandle) -> ScrapeResult<Observation> {
        Ok(Observation {
            extent: None,
            index: page.rendered_index(&self.selector).await?,
        })
    }

    fn should_stop(&mut self, observation: &Observation) -> bool {
        let current = observation.index.unwrap_or(0);
        if self.last == Some(current) {
            self.repeats += 1;
        } else {
            self.last = Some(current);
            self.repeats = 0;
        }
        // A list that is still sitting at index 0 has not rendered yet.
        current != 0 && self.repeats > self.repeat_threshold
    }
}

/// Policy selection as it appears in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlStrategy {
    #[default]
    Height,
    Index,
}

impl CrawlStrategy {
    pub fn policy(&self, selector: &str, repeat_threshold: u32) -> Box<dyn TerminationPolicy> {
        match self {
            Self::Height => Box::new(HeightPolicy::new()),
            Self::Index => Box::new(IndexPolicy::new(selector, repeat_threshold)),
        }
    }
}

/// Loop tuning shared by every crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub scroll_step: u32,
    pub settle_delay: Duration,
    pub max_iterations: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            scroll_step: DEFAULT_SCROLL_STEP,
            settle_delay: Duration::from_millis(1000),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Records collected by one crawl, in first-seen order.
#[derive(Debug, Clone)]
pub struct Crawled<T> {
    pub records: Vec<T>,
    pub iterations: usize,
}

/// Drives the scroll loop over one loaded page.
#[derive(Debug, Clone, Default)]
pub struct Crawler {
    options: CrawlOptions,
}

impl Crawler {
    pub fn new(options: CrawlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawl `page` until `policy` fires or the iteration cap is reached.
    ///
    /// Records are deduplicated by `key`. Each iteration's newly seen
    /// records are handed to `on_new` before scrolling, so consumers see
    /// them while the crawl is still running. At least one extraction
    /// always happens.
    pub async fn crawl<T, E, K, F, Fut>(
        &self,
        page: &dyn PageHandle,
        extractor: &E,
        key: K,
        policy: &mut dyn TerminationPolicy,
        mut on_new: F,
    ) -> ScrapeResult<Crawled<T>>
    where
        T: Clone + Send,
        E: Extract<T> + ?Sized,
        K: Fn(&T) -> String,
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        if policy.needs_baseline() {
            let baseline = policy.observe(page).await?;
            policy.record_baseline(&baseline);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut records: Vec<T> = Vec::new();
        let mut iterations = 0;

        loop {
            iterations += 1;

            let batch = extractor.extract(page).await?;
            let fresh: Vec<T> = batch
                .into_iter()
                .filter(|record| seen.insert(key(record)))
                .collect();

            debug!(
                policy = policy.name(),
                iteration = iterations,
                new = fresh.len(),
                total = seen.len(),
                "Crawl iteration"
            );

            if !fresh.is_empty() {
                records.extend(fresh.iter().cloned());
                on_new(fresh).await;
            }

            page.scroll_by(self.options.scroll_step).await?;
            if !self.options.settle_delay.is_zero() {
                tokio::time::sleep(self.options.settle_delay).await;
            }

            let observation = policy.observe(page).await?;
            if policy.should_stop(&observation) {
                break;
            }

            if iterations >= self.options.max_iterations {
                warn!(
                    policy = policy.name(),
                    iterations, "Crawl hit iteration cap, stopping"
                );
                break;
            }
        }

        Ok(Crawled {
            records,
            iterations,
        })
    }
}
