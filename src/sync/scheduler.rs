use crate::leads::{LeadFilter, LeadStore};
use crate::matching::MatchingEngine;
use crate::models::{Lead, LeadMatch, Source, WebhookEventKind};
use crate::sources::{SearchCriteria, SourceAdapter};
use crate::sync::rate_limiter::RateLimiter;
use crate::webhooks::WebhookDispatcher;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const IDLE: u8 = 0;
const FETCHING: u8 = 1;

/// Observable state of one source's sync loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Fetching,
}

#[derive(Debug, Clone)]
pub struct SourceSyncConfig {
    pub interval: Duration,
    pub requests_per_minute: u32,
    /// Leads considered per tick
    pub batch_size: usize,
}

impl Default for SourceSyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            requests_per_minute: 5,
            batch_size: 25,
        }
    }
}

/// Summary of a single tick for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub source: Source,
    /// Leads with a usable city that reached the rate-limit gate
    pub leads_considered: usize,
    /// Successful adapter calls
    pub fetched: usize,
    pub listings: usize,
    /// Matches stored across all leads
    pub matched: usize,
    /// Failed fetches or match updates
    pub failed: usize,
    pub rate_limited: bool,
    pub cancelled: bool,
    /// Fetches that completed after stop and were dropped
    pub discarded: usize,
}

impl TickReport {
    fn new(source: Source) -> Self {
        Self {
            source,
            leads_considered: 0,
            fetched: 0,
            listings: 0,
            matched: 0,
            failed: 0,
            rate_limited: false,
            cancelled: false,
            discarded: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// The previous tick for this source was still running
    AlreadyRunning,
    /// The scheduler has been stopped
    Stopped,
}

struct SourceWorker {
    adapter: Arc<dyn SourceAdapter>,
    limiter: RateLimiter,
    config: SourceSyncConfig,
    state: AtomicU8,
}

impl SourceWorker {
    fn source(&self) -> Source {
        self.adapter.source()
    }
}

/// Resets the worker to idle however the tick ends.
struct InFlight<'a>(&'a AtomicU8);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::Release);
    }
}

struct SchedulerCore {
    workers: BTreeMap<Source, Arc<SourceWorker>>,
    leads: Arc<dyn LeadStore>,
    engine: MatchingEngine,
    dispatcher: Option<WebhookDispatcher>,
    cancel: CancellationToken,
}

/// Runs one independent periodic sync loop per listing source
#[derive(Clone)]
pub struct SyncScheduler {
    core: Arc<SchedulerCore>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl SyncScheduler {
    pub fn new(leads: Arc<dyn LeadStore>, engine: MatchingEngine) -> SyncSchedulerBuilder {
        SyncSchedulerBuilder {
            leads,
            engine,
            dispatcher: None,
            workers: BTreeMap::new(),
        }
    }

    pub fn sources(&self) -> Vec<Source> {
        self.core.workers.keys().copied().collect()
    }

    pub fn state(&self, source: Source) -> Option<SyncState> {
        self.core.workers.get(&source).map(|worker| {
            match worker.state.load(Ordering::Acquire) {
                FETCHING => SyncState::Fetching,
                _ => SyncState::Idle,
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.core.cancel.is_cancelled()
    }

    /// Spawn the timer loop of every source. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !tasks.is_empty() {
            warn!("Sync scheduler already started");
            return;
        }

        for worker in self.core.workers.values() {
            let core = self.core.clone();
            let worker = worker.clone();
            info!(
                "Scheduling {} sync every {:?} ({} requests/min)",
                worker.source(),
                worker.config.interval,
                worker.limiter.requests_per_window()
            );

            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(worker.config.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = core.cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            core.run_tick(&worker).await;
                        }
                    }
                }
                debug!("{} sync loop stopped", worker.source());
            }));
        }
    }

    /// Run one tick for `source` immediately, outside its timer.
    ///
    /// Returns `None` for a source with no registered adapter.
    pub async fn sync_source_now(&self, source: Source) -> Option<TickOutcome> {
        let worker = self.core.workers.get(&source)?.clone();
        Some(self.core.run_tick(&worker).await)
    }

    /// Cancel every timer and wait for the loops to exit.
    ///
    /// Fetches still in flight are abandoned and their results discarded.
    pub async fn stop(&self) {
        self.core.cancel.cancel();
        let handles = {
            let mut tasks = match self.tasks.lock() {
                Ok(tasks) => tasks,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *tasks)
        };
        for handle in handles {
            if let Err(err) = handle.await {
                warn!("Sync loop ended abnormally: {}", err);
            }
        }
        info!("Sync scheduler stopped");
    }
}

impl SchedulerCore {
    async fn run_tick(&self, worker: &SourceWorker) -> TickOutcome {
        let source = worker.source();
        if self.cancel.is_cancelled() {
            return TickOutcome::Stopped;
        }
        if worker
            .state
            .compare_exchange(IDLE, FETCHING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("{} tick skipped, previous tick still running", source);
            return TickOutcome::AlreadyRunning;
        }
        let _in_flight = InFlight(&worker.state);

        let mut report = TickReport::new(source);
        let leads = match self
            .leads
            .query(&LeadFilter::active(worker.config.batch_size))
            .await
        {
            Ok(leads) => leads,
            Err(err) => {
                warn!("{} tick could not load leads: {}", source, err);
                report.failed += 1;
                return TickOutcome::Completed(report);
            }
        };

        for lead in leads {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(criteria) = SearchCriteria::for_lead(&lead) else {
                debug!("Lead {} has no city, skipping", lead.id);
                continue;
            };
            report.leads_considered += 1;

            if !worker.limiter.check_and_consume(source.as_str()) {
                warn!(
                    "{} rate limit reached, skipping remaining leads this tick",
                    source
                );
                report.rate_limited = true;
                break;
            }

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => None,
                result = worker.adapter.search_properties(&criteria) => Some(result),
            };
            let Some(result) = fetched else {
                report.cancelled = true;
                break;
            };
            if self.cancel.is_cancelled() {
                report.discarded += 1;
                report.cancelled = true;
                break;
            }

            let properties = match result {
                Ok(properties) => properties,
                Err(err) => {
                    warn!("{}; skipping lead {}", err, lead.id);
                    report.failed += 1;
                    continue;
                }
            };
            report.fetched += 1;
            report.listings += properties.len();

            match self
                .engine
                .process_property_matches(&lead.id, &properties, source)
                .await
            {
                Ok(matches) => {
                    report.matched += matches.len();
                    if !matches.is_empty() {
                        self.notify(&lead, source, &matches).await;
                    }
                }
                Err(err) => {
                    warn!("Matching lead {} from {} failed: {}", lead.id, source, err);
                    report.failed += 1;
                }
            }
        }

        info!(
            "{} tick: {} leads, {} fetches, {} listings, {} matches, {} failures{}",
            source,
            report.leads_considered,
            report.fetched,
            report.listings,
            report.matched,
            report.failed,
            if report.rate_limited { " (rate limited)" } else { "" }
        );

        TickOutcome::Completed(report)
    }

    async fn notify(&self, lead: &Lead, source: Source, matches: &[LeadMatch]) {
        let (Some(dispatcher), Some(tenant_id)) = (&self.dispatcher, lead.tenant_id.as_deref())
        else {
            return;
        };
        let data = json!({
            "lead_id": lead.id,
            "source": source,
            "matches": matches,
        });
        if let Err(err) = dispatcher
            .dispatch(WebhookEventKind::PropertyMatched, data, tenant_id)
            .await
        {
            warn!("Could not notify tenant {}: {}", tenant_id, err);
        }
    }
}

pub struct SyncSchedulerBuilder {
    leads: Arc<dyn LeadStore>,
    engine: MatchingEngine,
    dispatcher: Option<WebhookDispatcher>,
    workers: BTreeMap<Source, Arc<SourceWorker>>,
}

impl SyncSchedulerBuilder {
    /// Notify lead tenants about new matches
    pub fn with_dispatcher(mut self, dispatcher: WebhookDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_source(mut self, adapter: Arc<dyn SourceAdapter>, config: SourceSyncConfig) -> Self {
        let worker = SourceWorker {
            limiter: RateLimiter::new(config.requests_per_minute),
            adapter,
            config,
            state: AtomicU8::new(IDLE),
        };
        self.workers.insert(worker.source(), Arc::new(worker));
        self
    }

    pub fn build(self) -> SyncScheduler {
        SyncScheduler {
            core: Arc::new(SchedulerCore {
                workers: self.workers,
                leads: self.leads,
                engine: self.engine,
                dispatcher: self.dispatcher,
                cancel: CancellationToken::new(),
            }),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }
}
