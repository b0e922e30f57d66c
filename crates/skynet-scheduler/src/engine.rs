use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use skynet_core::types::{
    now_ms, CronJob, CronPayload, CronSchedule, JobState, JobTarget, RunAction, RunRecord, RunStatus, WakeMode,
};
use skynet_hooks::{HookAction, HookContext, HookEngine, HookEvent};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::error::{Result, SchedulerError};
use crate::hooks::{HeartbeatOnce, HeartbeatOutcome, IsolatedAgentRunner, MainLoopHooks};
use crate::schedule::next_run_at_ms;

/// Clamp bounds for the ticker's sleep duration.
const MIN_TICK_MS: i64 = 1;
const MAX_TICK_MS: i64 = 60_000;

/// `running_at_ms` older than this is considered abandoned and cleared on
/// startup.
const STUCK_THRESHOLD_MS: i64 = 2 * 60 * 60 * 1000;

const HEARTBEAT_RETRY_INTERVAL_MS: u64 = 250;
const HEARTBEAT_RETRY_BOUND_MS: i64 = 120_000;

pub const DEFAULT_RUN_HISTORY_LEN: usize = 50;

/// Owns the job catalog and drives the tick loop. Construct via `new`, then
/// call `into_handle()` to obtain a cheaply-cloneable `SchedulerHandle` for
/// the Dispatcher/admin surface, and spawn `SchedulerHandle::spawn_loop` to
/// run the ticker.
pub struct SchedulerEngine {
    store: skynet_persistence::CronStore,
    jobs: Mutex<HashMap<String, CronJob>>,
    hooks: Arc<HookEngine>,
    main_hooks: Arc<dyn MainLoopHooks>,
    heartbeat_once: Option<Arc<dyn HeartbeatOnce>>,
    isolated_runner: Option<Arc<dyn IsolatedAgentRunner>>,
}

impl SchedulerEngine {
    /// Load the catalog from disk, recover stuck runs, and recompute
    /// missing `next_run_at_ms` values for enabled jobs. Corruption of the
    /// underlying store is fatal (propagated as `SchedulerError::Persist`).
    #[instrument(skip_all)]
    pub fn new(
        data_root: impl Into<std::path::PathBuf>,
        hooks: Arc<HookEngine>,
        main_hooks: Arc<dyn MainLoopHooks>,
        heartbeat_once: Option<Arc<dyn HeartbeatOnce>>,
        isolated_runner: Option<Arc<dyn IsolatedAgentRunner>>,
    ) -> Result<Self> {
        let store = skynet_persistence::CronStore::new(data_root, DEFAULT_RUN_HISTORY_LEN);
        let mut jobs = store.load_jobs()?;

        let now = now_ms();
        let mut dirty = false;
        for job in jobs.values_mut() {
            if let Some(running_at) = job.state.running_at_ms {
                if now - running_at > STUCK_THRESHOLD_MS {
                    warn!(job_id = %job.id, running_at, "clearing stuck cron job on startup");
                    job.state.running_at_ms = None;
                    dirty = true;
                }
            }
            if job.enabled && job.state.next_run_at_ms.is_none() {
                match next_run_at_ms(&job.schedule, now) {
                    Ok(t) => {
                        job.state.next_run_at_ms = Some(t);
                        dirty = true;
                    }
                    Err(e) => warn!(job_id = %job.id, error = %e, "failed to recompute next_run_at_ms on startup"),
                }
            }
        }

        if dirty {
            store.save_jobs(&jobs)?;
        }

        Ok(Self {
            store,
            jobs: Mutex::new(jobs),
            hooks,
            main_hooks,
            heartbeat_once,
            isolated_runner,
        })
    }

    pub fn into_handle(self) -> SchedulerHandle {
        SchedulerHandle(Arc::new(self))
    }

    async fn snapshot(&self) -> Vec<CronJob> {
        self.jobs.lock().await.values().cloned().collect()
    }

    async fn get(&self, id: &str) -> Option<CronJob> {
        self.jobs.lock().await.get(id).cloned()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn add(&self, job: CronJob) -> Result<CronJob> {
        job.validate_payload().map_err(SchedulerError::InvalidJob)?;
        let mut job = job;
        if job.enabled {
            job.state.next_run_at_ms = Some(next_run_at_ms(&job.schedule, now_ms())?);
        }

        let mut jobs = self.jobs.lock().await;
        jobs.insert(job.id.clone(), job.clone());
        self.store.save_jobs(&jobs)?;
        drop(jobs);

        self.emit(HookEvent::CronJobAdded, &job, json!({}));
        Ok(job)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn update(&self, job: CronJob) -> Result<CronJob> {
        job.validate_payload().map_err(SchedulerError::InvalidJob)?;
        let mut job = job;

        let mut jobs = self.jobs.lock().await;
        if !jobs.contains_key(&job.id) {
            return Err(SchedulerError::JobNotFound { id: job.id });
        }
        if job.enabled {
            job.state.next_run_at_ms = Some(next_run_at_ms(&job.schedule, now_ms())?);
        } else {
            job.state.next_run_at_ms = None;
        }
        jobs.insert(job.id.clone(), job.clone());
        self.store.save_jobs(&jobs)?;
        drop(jobs);

        self.emit(HookEvent::CronJobUpdated, &job, json!({}));
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        let removed = jobs.remove(id).ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        self.store.save_jobs(&jobs)?;
        drop(jobs);

        self.store.remove_runs(id)?;
        self.emit(HookEvent::CronJobRemoved, &removed, json!({}));
        Ok(())
    }

    fn emit(&self, event: HookEvent, job: &CronJob, extra: serde_json::Value) {
        let mut payload = json!({ "job_id": job.id, "name": job.name });
        if let serde_json::Value::Object(ref mut map) = payload {
            if let serde_json::Value::Object(extra_map) = extra {
                map.extend(extra_map);
            }
        }
        let ctx = HookContext::new(event, payload);
        // Before-hook semantics don't apply to lifecycle notifications — a
        // Block verdict here has nothing to block, so it's logged and
        // otherwise ignored.
        if let HookAction::Block { reason } = self.hooks.emit(ctx).action {
            warn!(job_id = %job.id, reason, "cron lifecycle hook returned Block (ignored)");
        }
    }

    /// Drives the cooperative ticker until the process shuts down. Intended
    /// to be spawned once via `SchedulerHandle::spawn_loop`.
    async fn run(self: Arc<Self>) {
        loop {
            let sleep_ms = self.next_tick_delay_ms().await;
            sleep(Duration::from_millis(sleep_ms as u64)).await;
            self.tick().await;
        }
    }

    async fn next_tick_delay_ms(&self) -> i64 {
        let now = now_ms();
        let jobs = self.jobs.lock().await;
        let min_next = jobs
            .values()
            .filter(|j| j.enabled)
            .filter_map(|j| j.state.next_run_at_ms)
            .min();
        drop(jobs);

        let delay = match min_next {
            Some(t) => t - now,
            None => MAX_TICK_MS,
        };
        delay.clamp(MIN_TICK_MS, MAX_TICK_MS)
    }

    #[instrument(skip(self))]
    async fn tick(&self) {
        let now = now_ms();
        let due_ids: Vec<String> = {
            let mut jobs = self.jobs.lock().await;
            let due: Vec<String> = jobs
                .values()
                .filter(|j| j.enabled && j.state.running_at_ms.is_none())
                .filter(|j| j.state.next_run_at_ms.map(|t| t <= now).unwrap_or(false))
                .map(|j| j.id.clone())
                .collect();
            for id in &due {
                if let Some(j) = jobs.get_mut(id) {
                    j.state.running_at_ms = Some(now);
                }
            }
            if !due.is_empty() {
                if let Err(e) = self.store.save_jobs(&jobs) {
                    warn!(error = %e, "failed to persist running-state before executing due jobs");
                }
            }
            due
        };

        for id in due_ids {
            let job = match self.get(&id).await {
                Some(j) => j,
                None => continue,
            };
            let outcome_job = match job.target {
                JobTarget::Main => self.execute_main(job).await,
                JobTarget::Isolated => self.execute_isolated(job).await,
            };
            self.finalize(outcome_job).await;
        }
    }

    /// Persist the job's post-execution state, deleting it outright if it
    /// was a one-shot job with `delete_after_run` that just completed.
    async fn finalize(&self, job: JobOutcome) {
        let mut jobs = self.jobs.lock().await;
        match job {
            JobOutcome::Delete(id) => {
                jobs.remove(&id);
            }
            JobOutcome::Keep(job) => {
                jobs.insert(job.id.clone(), job);
            }
        }
        if let Err(e) = self.store.save_jobs(&jobs) {
            warn!(error = %e, "failed to persist cron catalog after job execution");
        }
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn execute_main(&self, mut job: CronJob) -> JobOutcome {
        let start = now_ms();
        self.record_run(&job.id, RunAction::Started, None, None, None, None);
        self.emit(HookEvent::CronRunStarted, &job, json!({ "target": "main" }));

        let text = match &job.payload {
            CronPayload::SystemEvent { text } => text.clone(),
            CronPayload::AgentTurn { .. } => {
                // Rejected at add()/update() time — defensive only.
                String::new()
            }
        };

        if text.trim().is_empty() {
            let status = RunStatus::Skipped;
            self.finish_run(&job, start, status, None, Some("empty-payload".to_string()));
            job.state.last_status = Some(status);
            job.state.last_error = Some("empty-payload".to_string());
            job.state.last_run_at_ms = Some(start);
            job.state.run_count += 1;
            job.state.running_at_ms = None;
            // One-shot jobs remain scheduled (retryable) on an empty-payload
            // skip; next_run_at_ms is left untouched. Recurring schedules
            // advance normally below.
            if !matches!(job.schedule, CronSchedule::At { .. }) {
                self.advance_schedule(&mut job, start);
            }
            return JobOutcome::Keep(job);
        }

        self.main_hooks.enqueue_system_event(&text, None).await;

        let status = if job.wake_mode == WakeMode::Now {
            if let Some(hb) = &self.heartbeat_once {
                self.run_heartbeat_with_retry(hb.as_ref()).await
            } else {
                RunStatus::Ok
            }
        } else {
            RunStatus::Ok
        };

        self.main_hooks.request_heartbeat(&format!("cron:{}", job.id)).await;

        job.state.last_status = Some(status);
        job.state.last_error = None;
        job.state.last_run_at_ms = Some(start);
        job.state.run_count += 1;
        job.state.running_at_ms = None;

        self.finish_run(&job, start, status, None, None);

        let delete_after_run = job.delete_after_run;
        if matches!(job.schedule, CronSchedule::At { .. }) {
            if delete_after_run {
                return JobOutcome::Delete(job.id);
            }
            job.enabled = false;
            job.state.next_run_at_ms = None;
        } else {
            self.advance_schedule(&mut job, start);
        }
        JobOutcome::Keep(job)
    }

    async fn run_heartbeat_with_retry(&self, hb: &dyn HeartbeatOnce) -> RunStatus {
        let deadline = now_ms() + HEARTBEAT_RETRY_BOUND_MS;
        loop {
            match hb.run_heartbeat_once().await {
                HeartbeatOutcome::Ok => return RunStatus::Ok,
                HeartbeatOutcome::Error { message } => {
                    warn!(error = %message, "run_heartbeat_once failed");
                    return RunStatus::Error;
                }
                HeartbeatOutcome::Skipped { reason } if reason == "requests-in-flight" => {
                    if now_ms() >= deadline {
                        return RunStatus::Skipped;
                    }
                    sleep(Duration::from_millis(HEARTBEAT_RETRY_INTERVAL_MS)).await;
                }
                HeartbeatOutcome::Skipped { .. } => return RunStatus::Skipped,
            }
        }
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn execute_isolated(&self, mut job: CronJob) -> JobOutcome {
        let start = now_ms();
        self.record_run(&job.id, RunAction::Started, None, None, None, None);
        self.emit(HookEvent::CronRunStarted, &job, json!({ "target": "isolated" }));

        let runner = match &self.isolated_runner {
            None => {
                job.state.running_at_ms = None;
                job.state.last_status = Some(RunStatus::Skipped);
                job.state.last_error = Some("isolated-not-configured".to_string());
                job.state.last_run_at_ms = Some(start);
                job.state.run_count += 1;
                self.finish_run(&job, start, RunStatus::Skipped, None, Some("isolated-not-configured".to_string()));
                // "leave scheduling unchanged" — next_run_at_ms/enabled untouched.
                return JobOutcome::Keep(job);
            }
            Some(r) => r.clone(),
        };

        let message = match &job.payload {
            CronPayload::AgentTurn { message, .. } => message.clone(),
            CronPayload::SystemEvent { .. } => String::new(),
        };

        let outcome = runner.run(&job, &message).await;

        job.state.last_status = Some(outcome.status);
        job.state.last_error = outcome.error.clone();
        job.state.last_run_at_ms = Some(start);
        job.state.run_count += 1;
        job.state.running_at_ms = None;

        self.finish_run(&job, start, outcome.status, outcome.summary.clone(), outcome.error.clone());

        if job.wake_mode == WakeMode::Now {
            self.main_hooks.request_heartbeat(&format!("cron:{}:post", job.id)).await;
        }

        let delete_after_run = job.delete_after_run;
        if matches!(job.schedule, CronSchedule::At { .. }) {
            if delete_after_run {
                return JobOutcome::Delete(job.id);
            }
            job.enabled = false;
            job.state.next_run_at_ms = None;
        } else {
            self.advance_schedule(&mut job, start);
        }
        JobOutcome::Keep(job)
    }

    fn advance_schedule(&self, job: &mut CronJob, now: i64) {
        match next_run_at_ms(&job.schedule, now) {
            Ok(t) => job.state.next_run_at_ms = Some(t),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "failed to recompute next_run_at_ms, disabling job");
                job.enabled = false;
                job.state.next_run_at_ms = None;
            }
        }
    }

    fn record_run(
        &self,
        job_id: &str,
        action: RunAction,
        status: Option<RunStatus>,
        duration_ms: Option<i64>,
        summary: Option<String>,
        error: Option<String>,
    ) {
        let record = RunRecord {
            job_id: job_id.to_string(),
            action,
            status,
            ts_ms: now_ms(),
            duration_ms,
            summary,
            error,
        };
        if let Err(e) = self.store.append_run(record) {
            warn!(job_id, error = %e, "failed to append run record");
        }
    }

    fn finish_run(&self, job: &CronJob, start_ms: i64, status: RunStatus, summary: Option<String>, error: Option<String>) {
        let duration_ms = now_ms() - start_ms;
        self.record_run(&job.id, RunAction::Finished, Some(status), Some(duration_ms), summary, error.clone());
        self.emit(HookEvent::CronRunFinished, job, json!({ "status": status, "error": error }));
        info!(job_id = %job.id, ?status, duration_ms, "cron job finished");
    }
}

enum JobOutcome {
    Keep(CronJob),
    Delete(String),
}

/// Cheaply-cloneable front for `SchedulerEngine`. This is what the
/// Dispatcher and any admin surface hold onto; `spawn_loop` starts the
/// ticker exactly once.
#[derive(Clone)]
pub struct SchedulerHandle(Arc<SchedulerEngine>);

impl SchedulerHandle {
    pub async fn add_job(&self, job: CronJob) -> Result<CronJob> {
        self.0.add(job).await
    }

    pub async fn update_job(&self, job: CronJob) -> Result<CronJob> {
        self.0.update(job).await
    }

    pub async fn remove_job(&self, id: &str) -> Result<()> {
        self.0.remove(id).await
    }

    pub async fn get_job(&self, id: &str) -> Option<CronJob> {
        self.0.get(id).await
    }

    pub async fn list_jobs(&self) -> Vec<CronJob> {
        self.0.snapshot().await
    }

    pub fn load_runs(&self, job_id: &str) -> Result<Vec<RunRecord>> {
        self.0.store.load_runs(job_id)
    }

    /// Spawn the tick loop as a background task. Call once per process.
    pub fn spawn_loop(&self) -> tokio::task::JoinHandle<()> {
        let engine = self.0.clone();
        tokio::spawn(engine.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::types::JobTarget as JT;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct RecordingMainHooks {
        enqueued: StdMutex<Vec<String>>,
        heartbeats: AtomicUsize,
    }

    impl RecordingMainHooks {
        fn new() -> Self {
            Self { enqueued: StdMutex::new(Vec::new()), heartbeats: AtomicUsize::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl MainLoopHooks for RecordingMainHooks {
        async fn enqueue_system_event(&self, text: &str, _agent_id: Option<&str>) {
            self.enqueued.lock().unwrap().push(text.to_string());
        }
        async fn request_heartbeat(&self, _reason: &str) {
            self.heartbeats.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn job(id: &str, schedule: CronSchedule, payload: CronPayload, target: JT) -> CronJob {
        CronJob {
            id: id.to_string(),
            name: id.to_string(),
            enabled: true,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            schedule,
            target,
            wake_mode: WakeMode::NextHeartbeat,
            payload,
            delete_after_run: false,
            state: JobState::default(),
        }
    }

    async fn new_engine(dir: &std::path::Path) -> SchedulerEngine {
        SchedulerEngine::new(
            dir.to_path_buf(),
            Arc::new(HookEngine::new()),
            Arc::new(RecordingMainHooks::new()),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn add_job_computes_next_run_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let engine = new_engine(dir.path()).await;
        let j = job(
            "j1",
            CronSchedule::At { at_ms: now_ms() + 10_000 },
            CronPayload::SystemEvent { text: "hi".into() },
            JT::Main,
        );
        let handle = SchedulerHandle(Arc::new(engine));
        let added = handle.add_job(j).await.unwrap();
        assert!(added.state.next_run_at_ms.is_some());
        assert_eq!(handle.list_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_payload_target_combo_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = new_engine(dir.path()).await;
        let j = job(
            "bad",
            CronSchedule::At { at_ms: 0 },
            CronPayload::AgentTurn { message: "x".into(), model: None },
            JT::Main,
        );
        let handle = SchedulerHandle(Arc::new(engine));
        assert!(handle.add_job(j).await.is_err());
    }

    #[tokio::test]
    async fn due_main_job_enqueues_and_disables_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(new_engine(dir.path()).await);
        let j = job(
            "once",
            CronSchedule::At { at_ms: now_ms() - 1 },
            CronPayload::SystemEvent { text: "wake up".into() },
            JT::Main,
        );
        engine.add(j).await.unwrap();
        engine.tick().await;

        let after = engine.get("once").await.unwrap();
        assert!(!after.enabled);
        assert_eq!(after.state.last_status, Some(RunStatus::Ok));
        assert_eq!(after.state.run_count, 1);
    }

    #[tokio::test]
    async fn empty_payload_is_skipped_without_disabling_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(new_engine(dir.path()).await);
        let j = job(
            "empty",
            CronSchedule::At { at_ms: now_ms() - 1 },
            CronPayload::SystemEvent { text: "   ".into() },
            JT::Main,
        );
        engine.add(j).await.unwrap();
        engine.tick().await;

        let after = engine.get("empty").await.unwrap();
        assert!(after.enabled);
        assert_eq!(after.state.last_status, Some(RunStatus::Skipped));
        assert_eq!(after.state.last_error.as_deref(), Some("empty-payload"));
    }

    #[tokio::test]
    async fn isolated_job_without_runner_is_skipped_and_left_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(new_engine(dir.path()).await);
        let j = job(
            "iso",
            CronSchedule::Every { every_ms: 60_000, anchor_ms: Some(now_ms() - 70_000) },
            CronPayload::AgentTurn { message: "do thing".into(), model: None },
            JT::Isolated,
        );
        engine.add(j).await.unwrap();
        let before = engine.get("iso").await.unwrap();
        engine.tick().await;
        let after = engine.get("iso").await.unwrap();

        assert_eq!(after.state.last_error.as_deref(), Some("isolated-not-configured"));
        assert_eq!(before.state.next_run_at_ms, after.state.next_run_at_ms);
        assert!(after.enabled);
    }

    #[tokio::test]
    async fn stuck_running_job_is_cleared_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = new_engine(dir.path()).await;
            let mut j = job(
                "stuck",
                CronSchedule::Every { every_ms: 1000, anchor_ms: None },
                CronPayload::SystemEvent { text: "x".into() },
                JT::Main,
            );
            j.state.running_at_ms = Some(now_ms() - STUCK_THRESHOLD_MS - 1000);
            engine.add(j).await.unwrap();
        }

        let engine2 = new_engine(dir.path()).await;
        let recovered = engine2.get("stuck").await.unwrap();
        assert!(recovered.state.running_at_ms.is_none());
    }
}
