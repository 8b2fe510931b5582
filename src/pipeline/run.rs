// src/pipeline/run.rs

//! Run coordinator.
//!
//! A run moves through `Initializing → FetchingCatalog → ProcessingBatches
//! → Finalizing → Done`. Only a failure while initializing aborts the run;
//! everything after that is contained at the resource, subscriber or batch
//! level and the run always ends with a persisted `RunRecord`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::config::RunSettingsProvider;
use crate::error::{AppError, PreferenceAnomaly, Result};
use crate::models::{BatchOutcome, RunPhase, RunRecord, RunSettings, RunStats, Subscriber};
use crate::pipeline::classify::classify_delta;
use crate::pipeline::detect::detect;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::policy::{Decision, evaluate};
use crate::services::render::Notification;
use crate::services::{Alerter, ChannelSet, ResourceFetcher};
use crate::storage::StateStore;

const MISSING_PROFILE: PreferenceAnomaly = PreferenceAnomaly::MissingRecord;

/// External collaborators a run depends on.
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub channels: ChannelSet,
    pub alerter: Arc<dyn Alerter>,
}

/// Everything a worker reads, built once while initializing.
///
/// The subscriber map and profiles are read-only for the rest of the run.
struct RunContext {
    store: Arc<dyn StateStore>,
    fetcher: Arc<dyn ResourceFetcher>,
    dispatcher: Dispatcher,
    subscribers: HashMap<String, BTreeSet<String>>,
    profiles: HashMap<String, std::result::Result<Subscriber, PreferenceAnomaly>>,
}

impl RunContext {
    fn profile(&self, user_id: &str) -> std::result::Result<&Subscriber, &PreferenceAnomaly> {
        match self.profiles.get(user_id) {
            Some(profile) => profile.as_ref(),
            None => Err(&MISSING_PROFILE),
        }
    }
}

/// Output of the initializing phase.
struct Initialized {
    context: RunContext,
    settings: RunSettings,
    resources: Vec<String>,
    orphans_removed: usize,
}

fn enter(phase: RunPhase) {
    crate::utils::log::step(phase.ordinal(), RunPhase::COUNT, &phase.to_string());
}

/// Execute one complete run for `term`.
///
/// Returns `AppError::Run` only when initialization fails; that failure is
/// also reported through the alerter.
pub async fn run_once(
    term: &str,
    collaborators: Collaborators,
    settings: &dyn RunSettingsProvider,
) -> Result<RunRecord> {
    crate::utils::log::header(&format!("Section tracker run for term {term}"));

    enter(RunPhase::Initializing);
    let alerter = Arc::clone(&collaborators.alerter);
    let init = match initialize(collaborators, settings).await {
        Ok(init) => init,
        Err(e) => {
            log::error!("Run aborted for term {term}: {e}");
            alerter.alert(term, &e.to_string()).await;
            return Err(e);
        }
    };

    // Sections are fetched one by one inside the batches.
    enter(RunPhase::FetchingCatalog);
    log::info!(
        "{} sections to check ({} orphans removed)",
        init.resources.len(),
        init.orphans_removed
    );

    enter(RunPhase::ProcessingBatches);
    let mut record = RunRecord::begin(term, init.resources.len(), init.settings);
    record.stats.orphans_removed = init.orphans_removed;

    let context = Arc::new(init.context);
    for (index, batch) in init.resources.chunks(init.settings.batch_size).enumerate() {
        let (outcome, stats) =
            process_batch(&context, index, batch, init.settings.max_concurrent).await;
        if let Some(failure) = &outcome.failure {
            alerter
                .alert(term, &format!("batch {index} abandoned: {failure}"))
                .await;
        }
        log::info!(
            "Checked batch {index} ({} sections) in {:.2} secs",
            outcome.size,
            outcome.duration_ms as f64 / 1000.0
        );
        record.record_batch(outcome, stats);
    }

    enter(RunPhase::Finalizing);
    let record = record.finalize(Utc::now());
    if let Err(e) = context.store.record_run(&record).await {
        log::error!("Could not persist run record: {e}");
    }
    log_summary(&record);

    enter(RunPhase::Done);
    Ok(record)
}

async fn initialize(
    collaborators: Collaborators,
    provider: &dyn RunSettingsProvider,
) -> Result<Initialized> {
    let phase = RunPhase::Initializing.to_string();
    let fail = |e: AppError| AppError::run(phase.clone(), e);

    let settings = provider.run_settings().map_err(fail)?.normalized();
    let store = collaborators.store;

    let tracked = store.tracked_ids().await.map_err(fail)?;
    let mut subscribers = HashMap::with_capacity(tracked.len());
    let mut orphans = Vec::new();
    for id in tracked {
        let users = store.subscribers(&id).await.map_err(fail)?;
        if users.is_empty() {
            orphans.push(id);
        } else {
            subscribers.insert(id, users);
        }
    }

    let user_ids: BTreeSet<&String> = subscribers.values().flatten().collect();
    let mut profiles = HashMap::with_capacity(user_ids.len());
    for user_id in user_ids {
        let record = store.user_preferences(user_id).await.map_err(fail)?;
        let profile = Subscriber::from_record(user_id, record.as_ref());
        if let Err(anomaly) = &profile {
            log::warn!("User {user_id} has unusable preferences: {anomaly}");
        }
        profiles.insert(user_id.clone(), profile);
    }

    let mut orphans_removed = 0;
    for id in &orphans {
        log::info!("Section {id} has no active users, removing from tracking");
        match store.delete_resource(id).await {
            Ok(()) => orphans_removed += 1,
            Err(e) => log::warn!("Could not remove orphaned section {id}: {e}"),
        }
    }

    let mut resources: Vec<String> = subscribers.keys().cloned().collect();
    resources.sort();

    log::info!(
        "Loaded {} sections, {} users (batch size {}, concurrency {})",
        resources.len(),
        profiles.len(),
        settings.batch_size,
        settings.max_concurrent
    );

    Ok(Initialized {
        context: RunContext {
            dispatcher: Dispatcher::new(collaborators.channels, Arc::clone(&store)),
            store,
            fetcher: collaborators.fetcher,
            subscribers,
            profiles,
        },
        settings,
        resources,
        orphans_removed,
    })
}

/// Process one batch with at most `concurrency` workers in flight.
///
/// The first unexpected failure abandons the batch: workers already running
/// finish, workers not yet started are skipped.
async fn process_batch(
    context: &Arc<RunContext>,
    index: usize,
    ids: &[String],
    concurrency: usize,
) -> (BatchOutcome, RunStats) {
    let started = Instant::now();
    let abandoned = Arc::new(AtomicBool::new(false));

    let mut results = stream::iter(ids.iter().cloned())
        .map(|id| {
            let context = Arc::clone(context);
            let abandoned = Arc::clone(&abandoned);
            async move {
                if abandoned.load(Ordering::SeqCst) {
                    return None;
                }
                let result = match tokio::spawn(process_resource(context, id.clone())).await {
                    Ok(result) => result,
                    Err(join) => Err(AppError::worker(&id, join)),
                };
                if result.is_err() {
                    abandoned.store(true, Ordering::SeqCst);
                }
                Some(result)
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut outcome = BatchOutcome {
        index,
        size: ids.len(),
        completed: 0,
        abandoned: 0,
        failure: None,
        duration_ms: 0,
    };
    let mut stats = RunStats::default();

    while let Some(result) = results.next().await {
        match result {
            None => outcome.abandoned += 1,
            Some(Ok(resource_stats)) => {
                outcome.completed += 1;
                stats += resource_stats;
            }
            Some(Err(e)) => {
                log::error!("CRITICAL: batch {index} abandoned: {e}");
                outcome.failure.get_or_insert_with(|| e.to_string());
            }
        }
    }

    outcome.duration_ms = started.elapsed().as_millis() as u64;
    (outcome, stats)
}

/// Fetch, detect, commit and notify for one section.
///
/// Fetch failures are contained here. Errors returned are unexpected and
/// abandon the batch.
async fn process_resource(context: Arc<RunContext>, id: String) -> Result<RunStats> {
    let mut stats = RunStats::default();

    let section = match context.fetcher.fetch(&id).await {
        Ok(section) => section,
        Err(e) => {
            log::warn!("Section {id} skipped this run: {e}");
            stats.fetch_failures += 1;
            return Ok(stats);
        }
    };

    let stored = context
        .store
        .snapshot(&id)
        .await
        .map_err(|e| AppError::worker(&id, e))?;
    let detection = match detect(&id, stored.as_ref(), &section.snapshot) {
        Ok(detection) => detection,
        Err(e) => {
            log::warn!("Section {id} skipped this run: {e}");
            stats.fetch_failures += 1;
            return Ok(stats);
        }
    };
    stats.checked += 1;

    // Commit before notifying so the stored previous value is never reused.
    if detection.write_required {
        context
            .store
            .set_snapshot(&id, &detection.next)
            .await
            .map_err(|e| AppError::worker(&id, e))?;
    }
    if detection.baseline {
        log::info!("Section {id} observed for the first time, baseline stored");
        stats.baselines_written += 1;
        return Ok(stats);
    }

    let Some(users) = context.subscribers.get(&id) else {
        return Ok(stats);
    };

    for change in detection.changes {
        stats.changes_detected += 1;
        log::info!(
            "Detected {} change in section {id}, from {} to {}",
            change.field(),
            change.delta.previous_text(),
            change.delta.current_text()
        );

        let category = classify_delta(&change.delta);
        let notification = Notification {
            section: section.info.clone(),
            instructor: section.snapshot.instructor.clone(),
            change,
            category,
        };

        for user_id in users {
            let profile = context.profile(user_id);
            match (evaluate(user_id, profile, &notification.change, category), profile) {
                (Decision::Notify, Ok(subscriber)) => {
                    context
                        .dispatcher
                        .dispatch(subscriber, &notification)
                        .await
                        .apply(&mut stats);
                }
                (Decision::Skip(_), _) => stats.preference_anomalies += 1,
                _ => {}
            }
        }
    }

    Ok(stats)
}

fn log_summary(record: &RunRecord) {
    let stats = &record.stats;
    let throughput = record
        .throughput()
        .map_or_else(|| "n/a".to_string(), |t| format!("{t:.2} sections/sec"));
    crate::utils::log::summary(
        "Run finished",
        &[
            ("term", record.term.clone()),
            ("sections", record.resource_count.to_string()),
            ("checked", stats.checked.to_string()),
            ("changes", stats.changes_detected.to_string()),
            ("notifications", stats.notifications_sent.to_string()),
            ("channel failures", stats.channel_failures.to_string()),
            ("fetch failures", stats.fetch_failures.to_string()),
            ("failed batches", record.failed_batches().to_string()),
            (
                "duration",
                format!("{:.2} secs", record.duration_ms.unwrap_or(0) as f64 / 1000.0),
            ),
            ("throughput", throughput),
            ("batch size", record.settings.batch_size.to_string()),
        ],
    );
}
