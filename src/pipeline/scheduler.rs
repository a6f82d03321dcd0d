//! Stage scheduler.
//!
//! Each stage has one pending-job slot and its own worker(s). A trigger
//! fills the slot (or replaces the job already waiting in it), so a stage
//! never builds a backlog: however many triggers land while a run is in
//! flight, exactly one more run follows it. On success the stage's
//! downstream stages are triggered with an empty payload; on failure
//! nothing is triggered and the next scheduled tick is the only retry.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::events::{DropReason, SchedulerEvent, StageState, StageStats, TriggerCause};
use super::stage::{Job, StageHandler, StageId};
use crate::error::{ScrapeError, ScrapeResult};

struct StageSpec {
    handler: Arc<dyn StageHandler>,
    downstream: Vec<StageId>,
    concurrency: usize,
    interval: Option<Duration>,
}

/// Static description of a registered stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub id: StageId,
    pub downstream: Vec<StageId>,
    pub concurrency: usize,
    #[serde(with = "interval_secs")]
    pub interval: Option<Duration>,
}

mod interval_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }
}

/// Configuration phase: register stages, bind schedules, then [`start`](Self::start).
#[derive(Default)]
pub struct Scheduler {
    stages: BTreeMap<StageId, StageSpec>,
    events: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a stage and the stages its success triggers.
    pub fn register_stage(
        &mut self,
        id: StageId,
        handler: Arc<dyn StageHandler>,
        downstream: &[StageId],
    ) -> ScrapeResult<()> {
        if self.stages.contains_key(&id) {
            return Err(ScrapeError::Configuration(format!(
                "stage {} registered twice",
                id
            )));
        }

        let mut deduped: Vec<StageId> = Vec::with_capacity(downstream.len());
        for d in downstream {
            if !deduped.contains(d) {
                deduped.push(*d);
            }
        }

        self.stages.insert(
            id,
            StageSpec {
                handler,
                downstream: deduped,
                concurrency: 1,
                interval: None,
            },
        );
        Ok(())
    }

    /// Trigger `id` every `interval`, in addition to upstream triggering.
    pub fn schedule(&mut self, id: StageId, interval: Duration) -> ScrapeResult<()> {
        if interval.is_zero() {
            return Err(ScrapeError::Configuration(format!(
                "stage {} scheduled with a zero interval",
                id
            )));
        }
        self.spec_mut(id)?.interval = Some(interval);
        Ok(())
    }

    /// Allow up to `workers` simultaneous runs of one stage (default 1).
    pub fn set_concurrency(&mut self, id: StageId, workers: usize) -> ScrapeResult<()> {
        if workers == 0 {
            return Err(ScrapeError::Configuration(format!(
                "stage {} needs at least one worker",
                id
            )));
        }
        self.spec_mut(id)?.concurrency = workers;
        Ok(())
    }

    /// Send [`SchedulerEvent`]s to `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn summary(&self) -> Vec<StageSummary> {
        self.stages
            .iter()
            .map(|(id, spec)| StageSummary {
                id: *id,
                downstream: spec.downstream.clone(),
                concurrency: spec.concurrency,
                interval: spec.interval,
            })
            .collect()
    }

    fn spec_mut(&mut self, id: StageId) -> ScrapeResult<&mut StageSpec> {
        self.stages
            .get_mut(&id)
            .ok_or_else(|| ScrapeError::Configuration(format!("stage {} is not registered", id)))
    }

    /// Check that every downstream stage exists and the graph has no cycle.
    pub fn validate(&self) -> ScrapeResult<()> {
        for (id, spec) in &self.stages {
            for d in &spec.downstream {
                if !self.stages.contains_key(d) {
                    return Err(ScrapeError::Configuration(format!(
                        "stage {} triggers unregistered stage {}",
                        id, d
                    )));
                }
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            id: StageId,
            stages: &BTreeMap<StageId, StageSpec>,
            marks: &mut HashMap<StageId, Mark>,
        ) -> ScrapeResult<()> {
            match marks.get(&id) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(ScrapeError::Configuration(format!(
                        "stage graph has a cycle through {}",
                        id
                    )))
                }
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(spec) = stages.get(&id) {
                for d in &spec.downstream {
                    visit(*d, stages, marks)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for id in self.stages.keys() {
            visit(*id, &self.stages, &mut marks)?;
        }
        Ok(())
    }

    /// Validate the graph, spawn workers and tickers, and hand back control.
    ///
    /// Every slot starts empty; nothing runs until a tick or a trigger.
    pub fn start(self) -> ScrapeResult<SchedulerHandle> {
        self.validate()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (active_tx, _) = watch::channel(0usize);

        let mut runtimes = HashMap::new();
        let mut schedules = Vec::new();
        let mut workers = Vec::new();
        for (id, spec) in self.stages {
            if let Some(interval) = spec.interval {
                schedules.push((id, interval));
            }
            workers.push((id, spec.concurrency));
            runtimes.insert(
                id,
                Arc::new(StageRuntime {
                    id,
                    handler: spec.handler,
                    downstream: spec.downstream,
                    pending: Mutex::new(None),
                    notify: Notify::new(),
                    running: AtomicUsize::new(0),
                    stats: Mutex::new(StageStats::default()),
                }),
            );
        }

        let inner = Arc::new(Inner {
            stages: runtimes,
            seq: AtomicU64::new(0),
            events: self.events,
            shutdown: shutdown_tx,
            active: active_tx,
        });

        let mut tasks = Vec::new();
        for (id, count) in workers {
            for worker in 0..count {
                let inner = inner.clone();
                let shutdown = shutdown_rx.clone();
                tasks.push(tokio::spawn(async move {
                    inner.worker_loop(id, worker, shutdown).await;
                }));
            }
        }
        for (id, interval) in schedules {
            info!(stage = %id, interval_secs = interval.as_secs(), "Scheduling stage");
            let inner = inner.clone();
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                inner.ticker_loop(id, interval, shutdown).await;
            }));
        }

        Ok(SchedulerHandle {
            inner,
            tasks: Mutex::new(tasks),
        })
    }
}

struct StageRuntime {
    id: StageId,
    handler: Arc<dyn StageHandler>,
    downstream: Vec<StageId>,
    pending: Mutex<Option<Job>>,
    notify: Notify,
    running: AtomicUsize,
    stats: Mutex<StageStats>,
}

struct Inner {
    stages: HashMap<StageId, Arc<StageRuntime>>,
    seq: AtomicU64,
    events: Option<mpsc::UnboundedSender<SchedulerEvent>>,
    shutdown: watch::Sender<bool>,
    /// Pending plus running jobs across all stages.
    active: watch::Sender<usize>,
}

impl Inner {
    fn emit(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn stage(&self, id: StageId) -> ScrapeResult<&Arc<StageRuntime>> {
        self.stages
            .get(&id)
            .ok_or_else(|| ScrapeError::Configuration(format!("stage {} is not registered", id)))
    }

    /// Fill the stage's pending slot, replacing any job already waiting.
    async fn trigger(
        &self,
        id: StageId,
        payload: serde_json::Value,
        cause: TriggerCause,
        cascade: bool,
    ) -> ScrapeResult<u64> {
        let stage = self.stage(id)?;
        if self.is_shutting_down() {
            debug!(stage = %id, ?cause, "Ignoring trigger during shutdown");
            return Err(ScrapeError::Configuration(
                "scheduler is shutting down".to_string(),
            ));
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut job = Job::new(id, payload, seq);
        job.cascade = cascade;

        let replaced = stage.pending.lock().await.replace(job);
        match replaced {
            Some(old) => {
                stage.stats.lock().await.coalesced += 1;
                debug!(stage = %id, job = seq, replaced = old.seq, ?cause, "Coalesced trigger");
                self.emit(SchedulerEvent::Coalesced {
                    stage: id,
                    replaced: old.seq,
                    seq,
                });
            }
            None => {
                self.active.send_modify(|n| *n += 1);
                debug!(stage = %id, job = seq, ?cause, "Queued job");
                self.emit(SchedulerEvent::Queued {
                    stage: id,
                    seq,
                    cause,
                });
            }
        }

        stage.notify.notify_one();
        Ok(seq)
    }

    /// Discard the pending job of `id`, if any.
    async fn drop_pending(&self, id: StageId, reason: DropReason) {
        let Some(stage) = self.stages.get(&id) else {
            return;
        };
        let dropped = stage.pending.lock().await.take();
        if let Some(job) = dropped {
            stage.stats.lock().await.dropped += 1;
            self.active.send_modify(|n| *n = n.saturating_sub(1));
            debug!(stage = %id, job = job.seq, ?reason, "Dropped pending job");
            self.emit(SchedulerEvent::Dropped {
                stage: id,
                seq: job.seq,
                reason,
            });
        }
    }

    /// Clear stale work for a stage and its immediate dependents.
    async fn quiesce(&self, stage: &StageRuntime) {
        let reason = DropReason::Quiesced(stage.id);
        self.drop_pending(stage.id, reason).await;
        for d in &stage.downstream {
            self.drop_pending(*d, reason).await;
        }
    }

    async fn worker_loop(self: Arc<Self>, id: StageId, worker: usize, mut shutdown: watch::Receiver<bool>) {
        let Some(stage) = self.stages.get(&id).cloned() else {
            return;
        };
        debug!(stage = %id, worker, "Stage worker started");

        loop {
            tokio::select! {
                _ = stage.notify.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            loop {
                if self.is_shutting_down() {
                    break;
                }
                let next = stage.pending.lock().await.take();
                let Some(job) = next else {
                    break;
                };
                self.execute(&stage, job).await;
            }

            if self.is_shutting_down() {
                break;
            }
        }

        debug!(stage = %id, worker, "Stage worker stopped");
    }

    async fn execute(&self, stage: &StageRuntime, job: Job) {
        if stage.id.quiesces() {
            self.quiesce(stage).await;
        }

        stage.running.fetch_add(1, Ordering::SeqCst);
        {
            let mut stats = stage.stats.lock().await;
            stats.state = StageState::Running;
            stats.started += 1;
        }
        info!(
            stage = %stage.id,
            job = job.seq,
            payload = %job.payload,
            queued_at = %job.queued_at,
            "Job started"
        );
        self.emit(SchedulerEvent::Started {
            stage: stage.id,
            seq: job.seq,
        });

        let started = Instant::now();
        let outcome = stage.handler.run(&job).await;
        let elapsed = started.elapsed();

        let still_running = stage.running.fetch_sub(1, Ordering::SeqCst) - 1;
        {
            let mut stats = stage.stats.lock().await;
            if still_running == 0 {
                stats.state = StageState::Idle;
            }
            stats.last_finished = Some(Utc::now());
            match outcome {
                Ok(ref report) => {
                    stats.completed += 1;
                    stats.last_report = Some(report.clone());
                }
                Err(ref e) => {
                    stats.failed += 1;
                    stats.last_error = Some(e.to_string());
                }
            }
        }

        match outcome {
            Ok(report) => {
                info!(
                    stage = %stage.id,
                    job = job.seq,
                    elapsed_ms = elapsed.as_millis() as u64,
                    emitted = report.emitted,
                    tasks_failed = report.failed,
                    "Job completed"
                );
                if job.cascade {
                    for d in &stage.downstream {
                        if let Err(e) = self
                            .trigger(*d, serde_json::Value::Null, TriggerCause::Upstream(stage.id), true)
                            .await
                        {
                            debug!(stage = %d, "Downstream trigger skipped: {}", e);
                        }
                    }
                }

                self.emit(SchedulerEvent::Completed {
                    stage: stage.id,
                    seq: job.seq,
                    report,
                    elapsed,
                });
            }
            Err(e) => {
                error!(
                    stage = %stage.id,
                    job = job.seq,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job failed: {}",
                    e
                );
                self.emit(SchedulerEvent::Failed {
                    stage: stage.id,
                    seq: job.seq,
                    error: e.to_string(),
                });
            }
        }

        self.active.send_modify(|n| *n = n.saturating_sub(1));
    }

    async fn ticker_loop(self: Arc<Self>, id: StageId, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.trigger(id, serde_json::Value::Null, TriggerCause::Schedule, true).await {
                        debug!(stage = %id, "Scheduled trigger skipped: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

/// Running scheduler.
pub struct SchedulerHandle {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SchedulerHandle {
    /// Trigger a stage now; its success cascades downstream as usual.
    pub async fn run_once(&self, id: StageId) -> ScrapeResult<u64> {
        self.inner
            .trigger(id, serde_json::Value::Null, TriggerCause::Manual, true)
            .await
    }

    /// Trigger a stage now with a payload.
    pub async fn run_with(&self, id: StageId, payload: serde_json::Value) -> ScrapeResult<u64> {
        self.inner
            .trigger(id, payload, TriggerCause::Manual, true)
            .await
    }

    /// Trigger a stage now without triggering its downstream stages.
    pub async fn run_alone(&self, id: StageId) -> ScrapeResult<u64> {
        self.run_alone_with(id, serde_json::Value::Null).await
    }

    pub async fn run_alone_with(&self, id: StageId, payload: serde_json::Value) -> ScrapeResult<u64> {
        self.inner
            .trigger(id, payload, TriggerCause::Manual, false)
            .await
    }

    pub async fn stats(&self, id: StageId) -> ScrapeResult<StageStats> {
        Ok(self.inner.stage(id)?.stats.lock().await.clone())
    }

    pub async fn state(&self, id: StageId) -> ScrapeResult<StageState> {
        Ok(self.stats(id).await?.state)
    }

    /// Wait until no stage has a pending or running job.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.active.subscribe();
        let _ = rx.wait_for(|active| *active == 0).await;
    }

    /// Stop tickers, drop pending jobs, and wait for in-flight jobs to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down scheduler");
        self.inner.shutdown.send_replace(true);

        let mut ids: Vec<StageId> = self.inner.stages.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.inner.drop_pending(id, DropReason::Shutdown).await;
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageReport;
    use async_trait::async_trait;

    /// Counts runs; optionally fails or waits on a gate before returning.
    #[derive(Default)]
    struct TestHandler {
        runs: AtomicUsize,
        fail: bool,
        gate: Option<Arc<Notify>>,
        entered: Option<Arc<Notify>>,
    }

    impl TestHandler {
        fn ok() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Default::default()
            })
        }

        fn gated(gate: Arc<Notify>, entered: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                gate: Some(gate),
                entered: Some(entered),
                ..Default::default()
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StageHandler for TestHandler {
        async fn run(&self, _job: &Job) -> ScrapeResult<StageReport> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(ref entered) = self.entered {
                entered.notify_one();
            }
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(ScrapeError::UpstreamQuery("directory down".to_string()));
            }
            Ok(StageReport::emitted(1))
        }
    }

    #[tokio::test]
    async fn test_duplicate_stage_is_configuration_error() {
        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(StageId::Leagues, TestHandler::ok(), &[])
            .unwrap();
        let err = scheduler
            .register_stage(StageId::Leagues, TestHandler::ok(), &[])
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_downstream_fails_validation() {
        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(StageId::Leagues, TestHandler::ok(), &[StageId::Teams])
            .unwrap();
        assert!(matches!(
            scheduler.start(),
            Err(ScrapeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_cycle_fails_validation() {
        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(StageId::Leagues, TestHandler::ok(), &[StageId::Teams])
            .unwrap();
        scheduler
            .register_stage(StageId::Teams, TestHandler::ok(), &[StageId::Leagues])
            .unwrap();
        assert!(matches!(
            scheduler.validate(),
            Err(ScrapeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_schedule_requires_registered_stage() {
        let mut scheduler = Scheduler::new();
        let err = scheduler
            .schedule(StageId::LiveMatches, Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_success_triggers_each_downstream_once() {
        let leagues = TestHandler::ok();
        let teams = TestHandler::ok();
        let live = TestHandler::ok();

        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(
                StageId::Leagues,
                leagues.clone(),
                &[StageId::Teams, StageId::LiveMatches],
            )
            .unwrap();
        scheduler.register_stage(StageId::Teams, teams.clone(), &[]).unwrap();
        scheduler
            .register_stage(StageId::LiveMatches, live.clone(), &[])
            .unwrap();

        let handle = scheduler.start().unwrap();
        handle.run_once(StageId::Leagues).await.unwrap();
        handle.wait_idle().await;

        assert_eq!(leagues.runs(), 1);
        assert_eq!(teams.runs(), 1);
        assert_eq!(live.runs(), 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_triggers_nothing() {
        let leagues = TestHandler::failing();
        let teams = TestHandler::ok();

        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(StageId::Leagues, leagues.clone(), &[StageId::Teams])
            .unwrap();
        scheduler.register_stage(StageId::Teams, teams.clone(), &[]).unwrap();

        let handle = scheduler.start().unwrap();
        handle.run_once(StageId::Leagues).await.unwrap();
        handle.wait_idle().await;

        assert_eq!(teams.runs(), 0);
        let stats = handle.stats(StageId::Leagues).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.state, StageState::Idle);
        assert!(stats.last_error.unwrap().contains("directory down"));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_triggers_while_running_coalesce_into_one_run() {
        let gate = Arc::new(Notify::new());
        let entered = Arc::new(Notify::new());
        let live = TestHandler::gated(gate.clone(), entered.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new().with_events(tx);
        scheduler
            .register_stage(StageId::LiveMatches, live.clone(), &[])
            .unwrap();
        let handle = scheduler.start().unwrap();

        handle.run_once(StageId::LiveMatches).await.unwrap();
        entered.notified().await;
        assert_eq!(
            handle.state(StageId::LiveMatches).await.unwrap(),
            StageState::Running
        );

        // Two rapid triggers while the first run is in flight
        handle.run_once(StageId::LiveMatches).await.unwrap();
        handle.run_once(StageId::LiveMatches).await.unwrap();

        gate.notify_one();
        entered.notified().await;
        gate.notify_one();
        handle.wait_idle().await;

        assert_eq!(live.runs(), 2);
        let stats = handle.stats(StageId::LiveMatches).await.unwrap();
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.completed, 2);

        handle.shutdown().await;
        drop(handle);
        let mut coalesced = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SchedulerEvent::Coalesced { .. }) {
                coalesced += 1;
            }
        }
        assert_eq!(coalesced, 1);
    }

    #[tokio::test]
    async fn test_quiescing_drops_stale_dependent_jobs() {
        let gate = Arc::new(Notify::new());
        let entered = Arc::new(Notify::new());
        let team_stats = TestHandler::gated(gate.clone(), entered.clone());
        let teams = TestHandler::ok();
        let matches = TestHandler::ok();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = Scheduler::new().with_events(tx);
        scheduler
            .register_stage(
                StageId::Teams,
                teams.clone(),
                &[StageId::TeamStats, StageId::Matches],
            )
            .unwrap();
        scheduler
            .register_stage(StageId::TeamStats, team_stats.clone(), &[])
            .unwrap();
        scheduler
            .register_stage(StageId::Matches, matches.clone(), &[])
            .unwrap();
        let handle = scheduler.start().unwrap();

        // Occupy TeamStats, then leave a stale job waiting behind it.
        handle.run_alone(StageId::TeamStats).await.unwrap();
        entered.notified().await;
        handle.run_alone(StageId::TeamStats).await.unwrap();

        // Teams clears the stale TeamStats job before running, then
        // re-triggers TeamStats once on success.
        handle.run_once(StageId::Teams).await.unwrap();

        let mut quiesced = 0;
        let is_quiesced = |event: &SchedulerEvent| {
            matches!(
                event,
                SchedulerEvent::Dropped {
                    reason: DropReason::Quiesced(StageId::Teams),
                    ..
                }
            )
        };
        loop {
            let event = rx.recv().await.unwrap();
            if is_quiesced(&event) {
                quiesced += 1;
            }
            if matches!(
                event,
                SchedulerEvent::Completed {
                    stage: StageId::Teams,
                    ..
                }
            ) {
                break;
            }
        }

        // Let the in-flight run and the one Teams triggered finish.
        gate.notify_one();
        entered.notified().await;
        gate.notify_one();
        handle.wait_idle().await;

        assert_eq!(teams.runs(), 1);
        assert_eq!(matches.runs(), 1);
        assert_eq!(team_stats.runs(), 2);

        handle.shutdown().await;
        while let Ok(event) = rx.try_recv() {
            if is_quiesced(&event) {
                quiesced += 1;
            }
        }
        assert_eq!(quiesced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_ticks_trigger_runs() {
        let live = TestHandler::ok();
        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(StageId::LiveMatches, live.clone(), &[])
            .unwrap();
        scheduler
            .schedule(StageId::LiveMatches, Duration::from_secs(60))
            .unwrap();
        let handle = scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_secs(185)).await;
        handle.wait_idle().await;

        assert_eq!(live.runs(), 3);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_triggers() {
        let mut scheduler = Scheduler::new();
        scheduler
            .register_stage(StageId::Leagues, TestHandler::ok(), &[])
            .unwrap();
        let handle = scheduler.start().unwrap();
        handle.shutdown().await;
        assert!(handle.run_once(StageId::Leagues).await.is_err());
    }
}
