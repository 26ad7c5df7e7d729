//! Three-phase merge of plan entries and activity records into the log.
//!
//! 1. Plan ingestion refreshes planned fields, creating `Pending` records.
//! 2. Activity ingestion bundles in-window activities per (date, discipline)
//!    and links or creates records, skipping anything already consumed.
//! 3. Finalization drops future-dated and empty records and derives status.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, span, warn, Level};

use crate::bundle;
use crate::config::PathSettings;
use crate::error::{DataQualityIssue, DataQualityKind, Result};
use crate::models::{
    LogKey, MatchStatus, MergedLogRecord, PlannedWorkout, RawActivityRecord, Status,
};
use crate::registry::ConsumedIds;
use crate::store::{self, LogStore, Reserved};

/// Upper bound for the activity window, about a century
pub const MAX_ACTIVITY_WINDOW_DAYS: i64 = 36_500;

/// Reconciliation tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Days before today whose activities are still considered
    pub activity_window_days: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            activity_window_days: 14,
        }
    }
}

/// Counters and recoverable issues from one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub plans_ingested: usize,
    pub plans_skipped_future: usize,
    pub pending_created: usize,
    pub skipped_outside_window: usize,
    pub linked: usize,
    pub unplanned_created: usize,
    pub skipped_consumed: usize,
    pub dropped_future: usize,
    pub dropped_empty: usize,
    pub issues: Vec<DataQualityIssue>,
}

impl SyncReport {
    fn record_issue(&mut self, issue: DataQualityIssue) {
        if issue.severity().to_tracing_level() <= Level::WARN {
            warn!("{}", issue);
        } else {
            debug!("{}", issue);
        }
        self.issues.push(issue);
    }

    /// Prepend issues found while loading inputs
    pub fn absorb_issues(&mut self, mut issues: Vec<DataQualityIssue>) {
        issues.append(&mut self.issues);
        self.issues = issues;
    }
}

/// Result of a reconciliation run
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Final records, newest date first
    pub records: Vec<MergedLogRecord>,

    /// Ids embedded in `records` or held by preserved log elements
    pub consumed: ConsumedIds,

    pub report: SyncReport,
}

impl Reconciliation {
    pub fn count_by_status(&self, status: Status) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == Some(status))
            .count()
    }
}

pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Merge `plan` and `activities` into the `existing` log as of `today`
    pub fn run(
        &self,
        existing: Vec<MergedLogRecord>,
        plan: Vec<PlannedWorkout>,
        activities: Vec<RawActivityRecord>,
        today: NaiveDate,
    ) -> Reconciliation {
        self.run_with_reserved(existing, &Reserved::default(), plan, activities, today)
    }

    /// Like [`Reconciler::run`], leaving the ids and keys in `reserved` alone
    pub fn run_with_reserved(
        &self,
        existing: Vec<MergedLogRecord>,
        reserved: &Reserved,
        plan: Vec<PlannedWorkout>,
        activities: Vec<RawActivityRecord>,
        today: NaiveDate,
    ) -> Reconciliation {
        let mut report = SyncReport::default();

        // Registry covers every loaded record, duplicates included
        let mut consumed = ConsumedIds::from_records(&existing);
        consumed.mark_consumed(&reserved.ids);
        let mut log = {
            let span = span!(Level::DEBUG, "reconcile_phase", phase = "index");
            let _guard = span.enter();
            index_existing(existing, &mut report)
        };

        self.ingest_plan(&mut log, reserved, plan, today, &mut report);
        self.ingest_activities(&mut log, reserved, &mut consumed, activities, today, &mut report);
        let records = {
            let span = span!(Level::DEBUG, "reconcile_phase", phase = "finalize");
            let _guard = span.enter();
            finalize(log, today, &mut report)
        };

        let mut consumed = ConsumedIds::from_records(&records);
        consumed.mark_consumed(&reserved.ids);

        info!(
            records = records.len(),
            linked = report.linked,
            unplanned = report.unplanned_created,
            skipped_consumed = report.skipped_consumed,
            issues = report.issues.len(),
            "Reconciliation complete"
        );

        Reconciliation {
            consumed,
            records,
            report,
        }
    }

    /// Load inputs from `paths`, reconcile, and atomically save the log.
    ///
    /// Log elements that could not be decoded are written back unchanged.
    pub fn sync(&self, paths: &PathSettings, today: NaiveDate) -> Result<Reconciliation> {
        let log_store = LogStore::new(&paths.log);
        let existing = log_store.load()?;
        let plan = store::load_plan(&paths.plan)?;
        let activities = store::load_activities(&paths.activities)?;

        info!(
            existing = existing.records.len(),
            preserved = existing.rejected.len(),
            planned = plan.records.len(),
            activities = activities.records.len(),
            %today,
            "Starting sync"
        );

        let mut load_issues = existing.issues;
        load_issues.extend(plan.issues);
        load_issues.extend(activities.issues);

        let reserved = Reserved::from_elements(&existing.rejected);
        let mut outcome = self.run_with_reserved(
            existing.records,
            &reserved,
            plan.records,
            activities.records,
            today,
        );
        outcome.report.absorb_issues(load_issues);

        log_store.save_preserving(&outcome.records, &existing.rejected)?;
        Ok(outcome)
    }

    fn ingest_plan(
        &self,
        log: &mut BTreeMap<LogKey, MergedLogRecord>,
        reserved: &Reserved,
        plan: Vec<PlannedWorkout>,
        today: NaiveDate,
        report: &mut SyncReport,
    ) {
        let span = span!(Level::DEBUG, "reconcile_phase", phase = "plan");
        let _guard = span.enter();

        for mut entry in plan {
            entry.sanitize();

            if !entry.discipline.is_reconcilable() {
                report.record_issue(DataQualityIssue::new(
                    DataQualityKind::UnclassifiedDiscipline,
                    "plan",
                    format!("plan entry {} on {} has no schedulable discipline", entry.id, entry.date),
                ));
                continue;
            }

            if entry.date > today {
                report.plans_skipped_future += 1;
                continue;
            }

            if reserved.keys.contains(&entry.key()) {
                report.record_issue(DataQualityIssue::new(
                    DataQualityKind::DuplicateKey,
                    "plan",
                    format!("{} is held by an undecodable log element", entry.key()),
                ));
                continue;
            }

            match log.entry(entry.key()) {
                Entry::Occupied(mut existing) => existing.get_mut().apply_plan(&entry),
                Entry::Vacant(slot) => {
                    slot.insert(MergedLogRecord::from_plan(&entry));
                    report.pending_created += 1;
                }
            }
            report.plans_ingested += 1;
        }

        debug!(
            ingested = report.plans_ingested,
            created = report.pending_created,
            future = report.plans_skipped_future,
            "Plan ingestion done"
        );
    }

    fn ingest_activities(
        &self,
        log: &mut BTreeMap<LogKey, MergedLogRecord>,
        reserved: &Reserved,
        consumed: &mut ConsumedIds,
        activities: Vec<RawActivityRecord>,
        today: NaiveDate,
        report: &mut SyncReport,
    ) {
        let span = span!(Level::DEBUG, "reconcile_phase", phase = "activities");
        let _guard = span.enter();

        let window_start = window_start(today, self.config.activity_window_days);
        let mut seen = HashSet::new();
        let mut in_window = Vec::new();

        for mut activity in activities {
            activity.sanitize();

            if activity.date < window_start || activity.date > today {
                report.skipped_outside_window += 1;
                continue;
            }
            // The same activity can arrive from more than one cache
            if !seen.insert(activity.source_id.clone()) {
                debug!(source_id = %activity.source_id, "Duplicate activity in inputs");
                continue;
            }
            in_window.push(activity);
        }

        let groups = bundle::group_by_key(in_window);
        for source_id in &groups.unclassified {
            report.record_issue(DataQualityIssue::new(
                DataQualityKind::UnclassifiedDiscipline,
                "activities",
                format!("activity {} is not a Run, Bike or Swim", source_id),
            ));
        }

        let (composites, bundle_issues) = groups.into_composites();
        for issue in bundle_issues {
            report.record_issue(issue);
        }

        for composite in composites {
            if consumed.is_consumed(&composite.source_ids) {
                debug!(key = %composite.key, "Activity already in log, skipping");
                report.skipped_consumed += 1;
                continue;
            }

            if reserved.keys.contains(&composite.key) {
                report.record_issue(DataQualityIssue::new(
                    DataQualityKind::DuplicateKey,
                    "activities",
                    format!("{} is held by an undecodable log element", composite.key),
                ));
                continue;
            }

            match log.entry(composite.key) {
                Entry::Occupied(mut existing) => {
                    let record = existing.get_mut();
                    let earlier = record.actual.as_ref().filter(|a| !a.source_ids.is_empty());
                    let merged = match earlier {
                        Some(actual) => {
                            bundle::combine(&actual.to_composite(composite.key), &composite)
                        }
                        None => Ok(composite.clone()),
                    };
                    match merged {
                        Ok(merged) => record.link(&merged),
                        Err(e) => {
                            report.record_issue(DataQualityIssue::new(
                                DataQualityKind::OutOfRange,
                                "activities",
                                format!("{}: {}", composite.key, e),
                            ));
                            continue;
                        }
                    }
                    report.linked += 1;
                }
                Entry::Vacant(slot) => {
                    slot.insert(MergedLogRecord::from_composite(&composite));
                    report.unplanned_created += 1;
                }
            }
            consumed.mark_consumed(&composite.source_ids);
        }

        debug!(
            linked = report.linked,
            unplanned = report.unplanned_created,
            skipped = report.skipped_consumed,
            outside_window = report.skipped_outside_window,
            "Activity ingestion done"
        );
    }
}

/// First date whose activities are still ingested.
///
/// Windows reaching past the calendar start at the earliest date.
fn window_start(today: NaiveDate, window_days: i64) -> NaiveDate {
    Duration::try_days(window_days)
        .and_then(|days| today.checked_sub_signed(days))
        .unwrap_or(NaiveDate::MIN)
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconcileConfig::default())
    }
}

/// Key the loaded log, keeping the first record for any repeated key
fn index_existing(
    existing: Vec<MergedLogRecord>,
    report: &mut SyncReport,
) -> BTreeMap<LogKey, MergedLogRecord> {
    let mut log = BTreeMap::new();

    for record in existing {
        match log.entry(record.key()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(_) => report.record_issue(DataQualityIssue::new(
                DataQualityKind::DuplicateKey,
                "log",
                record.key().to_string(),
            )),
        }
    }

    log
}

fn finalize(
    log: BTreeMap<LogKey, MergedLogRecord>,
    today: NaiveDate,
    report: &mut SyncReport,
) -> Vec<MergedLogRecord> {
    let mut records = Vec::with_capacity(log.len());

    for (key, mut record) in log {
        if key.date > today {
            report.dropped_future += 1;
            continue;
        }

        match record.derive_status(today) {
            Some(status) => {
                record.match_status = settle_match_status(record.match_status, status);
                record.status = Some(status);
                records.push(record);
            }
            None => {
                report.dropped_empty += 1;
                report.record_issue(DataQualityIssue::new(
                    DataQualityKind::EmptyRecord,
                    "log",
                    format!("{} has neither planned nor actual duration", key),
                ));
            }
        }
    }

    records.sort_by(|a, b| b.date.cmp(&a.date).then(a.discipline.cmp(&b.discipline)));
    records
}

/// Move records without actuals between Pending and Missed as days pass
fn settle_match_status(current: MatchStatus, status: Status) -> MatchStatus {
    if !current.is_awaiting_actual() {
        return current;
    }

    match status {
        Status::Missed => MatchStatus::Missed,
        Status::Planned => MatchStatus::Pending,
        _ => current,
    }
}
