mod common;

use async_trait::async_trait;
use common::{lead, property, RecordingMatchStore};
use listing_sync::leads::InMemoryLeadStore;
use listing_sync::matching::MatchingEngine;
use listing_sync::models::{PropertyData, Source};
use listing_sync::sources::{SearchCriteria, SourceAdapter, SourceError};
use listing_sync::sync::{SourceSyncConfig, SyncScheduler, SyncState, TickOutcome, TickReport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;

/// Adapter returning one listing per city, failing for a chosen city
struct ScriptedAdapter {
    source: Source,
    failing_city: Option<String>,
    calls: AtomicUsize,
    cities: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    fn new(source: Source, failing_city: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            source,
            failing_city: failing_city.map(str::to_string),
            calls: AtomicUsize::new(0),
            cities: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    async fn search_properties(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<PropertyData>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cities.lock().unwrap().push(criteria.city.clone());
        if self.failing_city.as_deref() == Some(criteria.city.as_str()) {
            return Err(SourceError::unavailable(self.source, "upstream returned 502"));
        }
        Ok(vec![property(
            &format!("{}-1", criteria.city.to_lowercase()),
            self.source,
            &criteria.city,
            620_000,
        )])
    }

    fn source(&self) -> Source {
        self.source
    }
}

/// Adapter that blocks inside the fetch until released
struct GatedAdapter {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl SourceAdapter for GatedAdapter {
    async fn search_properties(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<PropertyData>, SourceError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(vec![property("gated-1", Source::Mls, &criteria.city, 550_000)])
    }

    fn source(&self) -> Source {
        Source::Mls
    }
}

/// Adapter that stops its own scheduler before handing back results
#[derive(Default)]
struct StoppingAdapter {
    scheduler: OnceLock<SyncScheduler>,
}

#[async_trait]
impl SourceAdapter for StoppingAdapter {
    async fn search_properties(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<PropertyData>, SourceError> {
        if let Some(scheduler) = self.scheduler.get() {
            scheduler.stop().await;
        }
        Ok(vec![property("late-1", Source::Realtor, &criteria.city, 600_000)])
    }

    fn source(&self) -> Source {
        Source::Realtor
    }
}

fn scheduler(
    leads: Vec<listing_sync::models::Lead>,
    adapter: Arc<dyn SourceAdapter>,
    config: SourceSyncConfig,
) -> (SyncScheduler, Arc<RecordingMatchStore>) {
    let leads = Arc::new(InMemoryLeadStore::new(leads));
    let matches = Arc::new(RecordingMatchStore::default());
    let engine = MatchingEngine::new(leads.clone(), matches.clone());
    let scheduler = SyncScheduler::new(leads, engine)
        .with_source(adapter, config)
        .build();
    (scheduler, matches)
}

fn completed(outcome: Option<TickOutcome>) -> TickReport {
    match outcome {
        Some(TickOutcome::Completed(report)) => report,
        other => panic!("expected a completed tick, got {other:?}"),
    }
}

#[tokio::test]
async fn failing_lead_does_not_stop_the_tick() {
    let adapter = ScriptedAdapter::new(Source::Zillow, Some("Hamilton"));
    let (scheduler, matches) = scheduler(
        vec![
            lead("lead-1", Some("tenant-a"), Some("Toronto")),
            lead("lead-2", Some("tenant-a"), Some("Hamilton")),
            lead("lead-3", Some("tenant-b"), Some("Ottawa")),
        ],
        adapter.clone(),
        SourceSyncConfig::default(),
    );

    let report = completed(scheduler.sync_source_now(Source::Zillow).await);

    assert_eq!(report.source, Source::Zillow);
    assert_eq!(report.leads_considered, 3);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.listings, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.rate_limited);
    assert!(!report.cancelled);
    assert_eq!(adapter.calls(), 3);

    // Scores stay under the retention threshold, but each fetched lead still has its set replaced
    assert_eq!(matches.saved_leads(), vec!["lead-1", "lead-3"]);
    assert_eq!(report.matched, 0);
    assert_eq!(scheduler.state(Source::Zillow), Some(SyncState::Idle));
}

#[tokio::test]
async fn leads_without_city_are_skipped() {
    let adapter = ScriptedAdapter::new(Source::Realtor, None);
    let (scheduler, _) = scheduler(
        vec![
            lead("lead-1", None, None),
            lead("lead-2", None, Some("  ")),
            lead("lead-3", None, Some("Toronto")),
        ],
        adapter.clone(),
        SourceSyncConfig::default(),
    );

    let report = completed(scheduler.sync_source_now(Source::Realtor).await);
    assert_eq!(report.leads_considered, 1);
    assert_eq!(*adapter.cities.lock().unwrap(), vec!["Toronto".to_string()]);
}

#[tokio::test]
async fn rate_limit_ends_the_tick_early() {
    let adapter = ScriptedAdapter::new(Source::Zillow, None);
    let leads = (1..=4)
        .map(|n| lead(&format!("lead-{n}"), None, Some("Toronto")))
        .collect();
    let (scheduler, _) = scheduler(
        leads,
        adapter.clone(),
        SourceSyncConfig {
            requests_per_minute: 2,
            ..SourceSyncConfig::default()
        },
    );

    let first = completed(scheduler.sync_source_now(Source::Zillow).await);
    assert!(first.rate_limited);
    assert_eq!(first.fetched, 2);
    assert_eq!(adapter.calls(), 2);

    let second = completed(scheduler.sync_source_now(Source::Zillow).await);
    assert!(second.rate_limited);
    assert_eq!(second.fetched, 0);
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let adapter = Arc::new(GatedAdapter {
        started: Notify::new(),
        release: Notify::new(),
    });
    let (scheduler, _) = scheduler(
        vec![lead("lead-1", None, Some("Toronto"))],
        adapter.clone(),
        SourceSyncConfig::default(),
    );

    let running = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.sync_source_now(Source::Mls).await }
    });
    adapter.started.notified().await;
    assert_eq!(scheduler.state(Source::Mls), Some(SyncState::Fetching));

    let overlapping = scheduler.sync_source_now(Source::Mls).await;
    assert_eq!(overlapping, Some(TickOutcome::AlreadyRunning));

    adapter.release.notify_one();
    let report = completed(running.await.unwrap());
    assert_eq!(report.fetched, 1);
    assert_eq!(scheduler.state(Source::Mls), Some(SyncState::Idle));
}

#[tokio::test]
async fn stop_abandons_in_flight_fetch() {
    let adapter = Arc::new(GatedAdapter {
        started: Notify::new(),
        release: Notify::new(),
    });
    let (scheduler, matches) = scheduler(
        vec![
            lead("lead-1", None, Some("Toronto")),
            lead("lead-2", None, Some("Ottawa")),
        ],
        adapter.clone(),
        SourceSyncConfig::default(),
    );

    let running = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.sync_source_now(Source::Mls).await }
    });
    adapter.started.notified().await;
    scheduler.stop().await;

    let report = completed(running.await.unwrap());
    assert!(report.cancelled);
    assert_eq!(report.fetched, 0);
    assert!(matches.saved_leads().is_empty());
    assert!(scheduler.is_stopped());
    assert_eq!(scheduler.state(Source::Mls), Some(SyncState::Idle));
    assert_eq!(
        scheduler.sync_source_now(Source::Mls).await,
        Some(TickOutcome::Stopped)
    );
}

#[tokio::test]
async fn unknown_source_has_no_tick() {
    let adapter = ScriptedAdapter::new(Source::Zillow, None);
    let (scheduler, _) = scheduler(vec![], adapter, SourceSyncConfig::default());
    assert_eq!(scheduler.sources(), vec![Source::Zillow]);
    assert_eq!(scheduler.sync_source_now(Source::Mls).await, None);
    assert_eq!(scheduler.state(Source::Mls), None);
}

#[tokio::test]
async fn start_runs_first_tick_and_stop_joins_loops() {
    let adapter = ScriptedAdapter::new(Source::Zillow, None);
    let (scheduler, matches) = scheduler(
        vec![lead("lead-1", None, Some("Toronto"))],
        adapter.clone(),
        SourceSyncConfig {
            interval: Duration::from_secs(3600),
            ..SourceSyncConfig::default()
        },
    );

    scheduler.start();
    scheduler.start();

    tokio::time::timeout(Duration::from_secs(2), async {
        while matches.saved_leads().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first tick fires immediately");

    tokio::time::timeout(Duration::from_secs(2), scheduler.stop())
        .await
        .expect("stop returns once loops exit");
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test]
async fn results_arriving_after_stop_are_discarded() {
    let adapter = Arc::new(StoppingAdapter::default());
    let (scheduler, matches) = scheduler(
        vec![
            lead("lead-1", None, Some("Toronto")),
            lead("lead-2", None, Some("Ottawa")),
        ],
        adapter.clone(),
        SourceSyncConfig::default(),
    );
    assert!(adapter.scheduler.set(scheduler.clone()).is_ok());

    let report = completed(scheduler.sync_source_now(Source::Realtor).await);

    assert_eq!(report.discarded, 1);
    assert!(report.cancelled);
    assert_eq!(report.fetched, 0);
    assert_eq!(report.listings, 0);
    assert!(matches.saved_leads().is_empty());
    assert!(scheduler.is_stopped());
}

#[tokio::test]
async fn sources_tick_independently() {
    let gated = Arc::new(GatedAdapter {
        started: Notify::new(),
        release: Notify::new(),
    });
    let scripted = ScriptedAdapter::new(Source::Zillow, None);
    let leads = Arc::new(InMemoryLeadStore::new(vec![lead(
        "lead-1",
        None,
        Some("Toronto"),
    )]));
    let matches = Arc::new(RecordingMatchStore::default());
    let engine = MatchingEngine::new(leads.clone(), matches.clone());
    let scheduler = SyncScheduler::new(leads, engine)
        .with_source(gated.clone(), SourceSyncConfig::default())
        .with_source(scripted.clone(), SourceSyncConfig::default())
        .build();
    assert_eq!(scheduler.sources(), vec![Source::Zillow, Source::Mls]);

    let held = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.sync_source_now(Source::Mls).await }
    });
    gated.started.notified().await;

    let report = completed(scheduler.sync_source_now(Source::Zillow).await);
    assert_eq!(report.fetched, 1);
    assert_eq!(scripted.calls(), 1);
    assert_eq!(scheduler.state(Source::Mls), Some(SyncState::Fetching));
    assert_eq!(scheduler.state(Source::Zillow), Some(SyncState::Idle));

    gated.release.notify_one();
    let held_report = completed(held.await.unwrap());
    assert_eq!(held_report.fetched, 1);

    let saved: Vec<Source> = matches
        .saves
        .lock()
        .unwrap()
        .iter()
        .map(|(_, source, _)| *source)
        .collect();
    assert_eq!(saved, vec![Source::Zillow, Source::Mls]);
}
