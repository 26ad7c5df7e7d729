//! Grouping of raw activity records by (date, discipline) and bundling of
//! each group into a single composite activity.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::error::{DataQualityIssue, DataQualityKind};
use crate::models::{CompositeActivity, LogKey, RawActivityRecord, SourceId, Telemetry};
use crate::sport;

/// Why a group could not be bundled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BundleError {
    #[error("no records to bundle")]
    Empty,

    #[error("aggregate exceeds the representable range")]
    Overflow,
}

/// Raw records partitioned by log key
#[derive(Debug, Clone, Default)]
pub struct ActivityGroups {
    /// Records per key, in input order
    pub groups: BTreeMap<LogKey, Vec<RawActivityRecord>>,

    /// Records whose type signal matched no discipline
    pub unclassified: Vec<SourceId>,
}

impl ActivityGroups {
    /// Bundle every group into its composite activity.
    ///
    /// Groups whose totals cannot be represented are left out and reported.
    pub fn into_composites(self) -> (Vec<CompositeActivity>, Vec<DataQualityIssue>) {
        let mut composites = Vec::with_capacity(self.groups.len());
        let mut issues = Vec::new();

        for (key, records) in self.groups {
            let ids: Vec<String> = records.iter().map(|r| r.source_id.to_string()).collect();
            match bundle(key, records) {
                Ok(composite) => composites.push(composite),
                Err(e) => issues.push(DataQualityIssue::new(
                    DataQualityKind::OutOfRange,
                    "activities",
                    format!("{} (activities {}): {}", key, ids.join(","), e),
                )),
            }
        }

        (composites, issues)
    }
}

/// Classify each record and group it under its (date, discipline) key.
///
/// Records classified as [`crate::models::Discipline::Other`] are set aside.
pub fn group_by_key<I>(records: I) -> ActivityGroups
where
    I: IntoIterator<Item = RawActivityRecord>,
{
    let mut result = ActivityGroups::default();

    for record in records {
        let discipline = sport::classify(record.type_signal());
        if !discipline.is_reconcilable() {
            debug!(source_id = %record.source_id, "Activity type not reconcilable, skipping");
            result.unclassified.push(record.source_id);
            continue;
        }

        result
            .groups
            .entry(LogKey::new(record.date, discipline))
            .or_default()
            .push(record);
    }

    result
}

/// Bundle the records sharing `key` into one composite activity.
///
/// The longest record is the primary: qualitative fields come from it alone.
/// Durations, distances, calories and elevation are summed, rate-like
/// telemetry is duration-weighted and peak telemetry takes the maximum.
pub fn bundle(
    key: LogKey,
    mut records: Vec<RawActivityRecord>,
) -> Result<CompositeActivity, BundleError> {
    if records.is_empty() {
        return Err(BundleError::Empty);
    }

    // Stable: equal durations keep their input order
    records.sort_by(|a, b| b.duration_seconds.cmp(&a.duration_seconds));

    let parts: Vec<Part<'_>> = records
        .iter()
        .map(|r| Part {
            duration_seconds: r.duration_seconds,
            distance_meters: r.distance_meters,
            telemetry: &r.telemetry,
        })
        .collect();

    let primary = &records[0];
    Ok(CompositeActivity {
        key,
        source_ids: records.iter().map(|r| r.source_id.clone()).collect(),
        record_count: records.len(),
        title: primary.title.clone(),
        duration_seconds: checked_total(parts.iter().map(|p| p.duration_seconds))?,
        distance_meters: checked_total(parts.iter().map(|p| p.distance_meters))?,
        telemetry: aggregate(&parts)?,
    })
}

/// Fold a newly recorded composite into actuals already on the log.
///
/// Used when the earlier activities are no longer in the provider window,
/// so the two cannot be bundled from raw records.
pub fn combine(
    existing: &CompositeActivity,
    incoming: &CompositeActivity,
) -> Result<CompositeActivity, BundleError> {
    let (primary, secondary) = if incoming.duration_seconds > existing.duration_seconds {
        (incoming, existing)
    } else {
        (existing, incoming)
    };

    let parts = [primary, secondary].map(|c| Part {
        duration_seconds: c.duration_seconds,
        distance_meters: c.distance_meters,
        telemetry: &c.telemetry,
    });

    let mut source_ids = primary.source_ids.clone();
    for id in &secondary.source_ids {
        if !source_ids.contains(id) {
            source_ids.push(id.clone());
        }
    }

    Ok(CompositeActivity {
        key: incoming.key,
        source_ids,
        record_count: primary.record_count + secondary.record_count,
        title: primary.title.clone(),
        duration_seconds: checked_total(parts.iter().map(|p| p.duration_seconds))?,
        distance_meters: checked_total(parts.iter().map(|p| p.distance_meters))?,
        telemetry: aggregate(&parts)?,
    })
}

/// One contributor to an aggregate, primary first
struct Part<'a> {
    duration_seconds: Decimal,
    distance_meters: Decimal,
    telemetry: &'a Telemetry,
}

fn aggregate(parts: &[Part<'_>]) -> Result<Telemetry, BundleError> {
    let primary = match parts {
        [] => return Err(BundleError::Empty),
        [only] => return Ok(only.telemetry.clone()),
        [first, ..] => first.telemetry,
    };

    Ok(Telemetry {
        average_power: weighted_mean(parts, |t| t.average_power)?,
        normalized_power: weighted_mean(parts, |t| t.normalized_power)?,
        average_heart_rate: weighted_mean(parts, |t| t.average_heart_rate)?,
        average_biking_cadence: weighted_mean(parts, |t| t.average_biking_cadence)?,
        average_running_cadence: weighted_mean(parts, |t| t.average_running_cadence)?,
        average_stride_length: weighted_mean(parts, |t| t.average_stride_length)?,
        average_vertical_oscillation: weighted_mean(parts, |t| t.average_vertical_oscillation)?,
        average_ground_contact_time: weighted_mean(parts, |t| t.average_ground_contact_time)?,
        average_speed: weighted_mean(parts, |t| t.average_speed)?,
        max_power: peak(parts, |t| t.max_power),
        max_heart_rate: peak(parts, |t| t.max_heart_rate),
        max_speed: peak(parts, |t| t.max_speed),
        vo2_max_estimate: peak(parts, |t| t.vo2_max_estimate),
        calories: sum_present(parts, |t| t.calories)?,
        elevation_gain_meters: sum_present(parts, |t| t.elevation_gain_meters)?,
        training_stress_score: primary.training_stress_score,
        intensity_factor: primary.intensity_factor,
        subjective_effort: primary.subjective_effort,
        subjective_feeling: primary.subjective_feeling,
        aerobic_training_effect: primary.aerobic_training_effect,
        anaerobic_training_effect: primary.anaerobic_training_effect,
        training_effect_label: primary.training_effect_label.clone(),
    })
}

fn checked_total<I>(values: I) -> Result<Decimal, BundleError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, |acc, value| {
        acc.checked_add(value).ok_or(BundleError::Overflow)
    })
}

/// `Σ(f·d) / Σd` over the parts carrying `f`; 0 when that duration is 0
fn weighted_mean<F>(parts: &[Part<'_>], field: F) -> Result<Option<Decimal>, BundleError>
where
    F: Fn(&Telemetry) -> Option<Decimal>,
{
    let mut weighted_sum = Decimal::ZERO;
    let mut total_duration = Decimal::ZERO;
    let mut present = false;

    for part in parts {
        if let Some(value) = field(part.telemetry) {
            present = true;
            let weighted = value
                .checked_mul(part.duration_seconds)
                .ok_or(BundleError::Overflow)?;
            weighted_sum = weighted_sum
                .checked_add(weighted)
                .ok_or(BundleError::Overflow)?;
            total_duration = total_duration
                .checked_add(part.duration_seconds)
                .ok_or(BundleError::Overflow)?;
        }
    }

    if !present {
        return Ok(None);
    }
    if total_duration.is_zero() {
        debug!("Zero total duration in weighted mean, using 0");
        return Ok(Some(Decimal::ZERO));
    }

    weighted_sum
        .checked_div(total_duration)
        .map(Some)
        .ok_or(BundleError::Overflow)
}

/// Maximum across parts, absent values counting as 0
fn peak<F>(parts: &[Part<'_>], field: F) -> Option<Decimal>
where
    F: Fn(&Telemetry) -> Option<Decimal>,
{
    if parts.iter().all(|p| field(p.telemetry).is_none()) {
        return None;
    }

    parts
        .iter()
        .map(|p| field(p.telemetry).unwrap_or(Decimal::ZERO))
        .max()
}

fn sum_present<F>(parts: &[Part<'_>], field: F) -> Result<Option<Decimal>, BundleError>
where
    F: Fn(&Telemetry) -> Option<Decimal>,
{
    let present: Vec<Decimal> = parts.iter().filter_map(|p| field(p.telemetry)).collect();
    if present.is_empty() {
        return Ok(None);
    }
    checked_total(present).map(Some)
}
