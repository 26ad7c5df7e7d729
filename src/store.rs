//! JSON inputs and the persisted training log.
//!
//! Inputs are decoded element by element so one bad record never sinks a
//! whole file. Log elements that cannot be decoded are carried through
//! unchanged and written back on save. The log is replaced atomically:
//! written to a sibling temp file, synced, then renamed over the target.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{DataQualityIssue, DataQualityKind, PersistenceError, Result, TrainSyncError};
use crate::models::{
    Discipline, LogKey, MergedLogRecord, PlannedWorkout, RawActivityRecord, SourceId,
};

/// Field names that may carry a record's date
const DATE_FIELDS: [&str; 2] = ["date", "startTimeLocal"];

/// Field names that may carry a log element's activity ids
const ID_FIELDS: [&str; 2] = ["sourceIds", "garminActivityId"];

/// Field names that may carry a log element's discipline
const DISCIPLINE_FIELDS: [&str; 3] = ["activityType", "discipline", "actualSport"];

/// Records decoded from one or more inputs, plus the ones that were skipped
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub issues: Vec<DataQualityIssue>,

    /// Elements that failed to decode, as read
    pub rejected: Vec<Value>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Loaded<T> {
    fn extend(&mut self, other: Loaded<T>) {
        self.records.extend(other.records);
        self.issues.extend(other.issues);
        self.rejected.extend(other.rejected);
    }
}

/// Read a JSON array, decoding each element on its own.
///
/// A missing file reads as empty. A file that is not a JSON array is an
/// input error.
pub fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Loaded<T>> {
    decode_elements(path, |element| {
        T::deserialize(element).map_err(|e| e.to_string())
    })
}

fn read_elements(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        debug!("{} does not exist, treating as empty", path.display());
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|e| TrainSyncError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|e| TrainSyncError::Input {
        path: path.to_path_buf(),
        reason: format!("expected a JSON array: {}", e),
    })
}

fn decode_elements<T, F>(path: &Path, decode: F) -> Result<Loaded<T>>
where
    F: Fn(&Value) -> std::result::Result<T, String>,
{
    let source = path.display().to_string();
    let mut loaded = Loaded::default();

    for (index, element) in read_elements(path)?.into_iter().enumerate() {
        match decode(&element) {
            Ok(record) => loaded.records.push(record),
            Err(reason) => {
                let issue = DataQualityIssue::new(
                    failure_kind(&element),
                    source.clone(),
                    format!("element {}: {}", index, reason),
                );
                warn!("{}", issue);
                loaded.issues.push(issue);
                loaded.rejected.push(element);
            }
        }
    }

    debug!(
        records = loaded.records.len(),
        skipped = loaded.issues.len(),
        "Read {}",
        path.display()
    );

    Ok(loaded)
}

/// Distinguish a bad date from any other decode failure
fn failure_kind(element: &Value) -> DataQualityKind {
    match element_date(element) {
        Some(_) => DataQualityKind::MalformedRecord,
        None => DataQualityKind::UnparseableDate,
    }
}

fn element_date(element: &Value) -> Option<NaiveDate> {
    let raw = DATE_FIELDS
        .iter()
        .find_map(|field| element.get(*field))
        .and_then(Value::as_str)?;
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

/// Activity ids an element claims, whatever shape they were written in
fn element_source_ids(element: &Value) -> Vec<SourceId> {
    let mut ids = Vec::new();
    for field in ID_FIELDS {
        match element.get(field) {
            Some(Value::Array(items)) => ids.extend(items.iter().filter_map(scalar_id)),
            Some(Value::String(joined)) => ids.extend(
                joined
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(SourceId::new),
            ),
            Some(value) => ids.extend(scalar_id(value)),
            None => {}
        }
    }

    // Hand-added records keep the provider id under "id"
    if let Some(Value::Number(n)) = element.get("id") {
        ids.push(SourceId::new(n.to_string()));
    }
    ids
}

fn scalar_id(value: &Value) -> Option<SourceId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(SourceId::new(s.as_str())),
        Value::Number(n) => Some(SourceId::new(n.to_string())),
        _ => None,
    }
}

fn element_key(element: &Value) -> Option<LogKey> {
    let date = element_date(element)?;
    let discipline = DISCIPLINE_FIELDS
        .iter()
        .filter_map(|field| element.get(*field))
        .find_map(|value| Discipline::deserialize(value).ok())?;
    Some(LogKey::new(date, discipline))
}

/// Claims held by log elements that could not be decoded.
///
/// Their ids stay consumed and their keys stay taken, so nothing new is
/// merged on top of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reserved {
    pub ids: Vec<SourceId>,
    pub keys: BTreeSet<LogKey>,
}

impl Reserved {
    pub fn from_elements(elements: &[Value]) -> Self {
        let mut reserved = Self::default();
        for element in elements {
            reserved.ids.extend(element_source_ids(element));
            reserved.keys.extend(element_key(element));
        }
        reserved
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.keys.is_empty()
    }
}

/// Load parsed plan entries
pub fn load_plan(path: &Path) -> Result<Loaded<PlannedWorkout>> {
    read_json_array(path)
}

/// Load and concatenate activity caches from every provider
pub fn load_activities(paths: &[PathBuf]) -> Result<Loaded<RawActivityRecord>> {
    let mut loaded = Loaded::default();
    for path in paths {
        loaded.extend(read_json_array(path)?);
    }
    Ok(loaded)
}

/// One element of the persisted array
#[derive(Serialize)]
#[serde(untagged)]
enum LogElement<'a> {
    Record(&'a MergedLogRecord),
    Preserved(&'a Value),
}

/// The durable training log
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted log; missing file means an empty log.
    ///
    /// Elements that fail to decode, or whose activity fields do not,
    /// end up in `rejected` with an issue each.
    pub fn load(&self) -> Result<Loaded<MergedLogRecord>> {
        decode_elements(&self.path, |element| {
            let record = MergedLogRecord::deserialize(element).map_err(|e| e.to_string())?;
            if record.actual.is_none() && !element_source_ids(element).is_empty() {
                return Err("activity fields could not be decoded".to_string());
            }
            Ok(record)
        })
    }

    /// Atomically replace the log with `records`
    pub fn save(&self, records: &[MergedLogRecord]) -> Result<()> {
        self.save_preserving(records, &[])
    }

    /// Atomically replace the log with `records` followed by `preserved`
    /// elements written back as they were read.
    ///
    /// On any failure the previous file is left as it was.
    pub fn save_preserving(&self, records: &[MergedLogRecord], preserved: &[Value]) -> Result<()> {
        let elements: Vec<LogElement<'_>> = records
            .iter()
            .map(LogElement::Record)
            .chain(preserved.iter().map(LogElement::Preserved))
            .collect();

        let mut json = serde_json::to_string_pretty(&elements).map_err(|e| {
            PersistenceError::Serialize {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;
        json.push('\n');

        if let Some(parent) = self.parent_dir() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::TempWrite {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, json.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(PersistenceError::Rename {
                path: self.path.clone(),
                reason: e.to_string(),
            }
            .into());
        }

        // The new file is in place; a failed directory sync only weakens durability
        if let Err(e) = self.sync_dir() {
            warn!("Could not sync directory of {}: {}", self.path.display(), e);
        }

        info!(
            records = records.len(),
            preserved = preserved.len(),
            "Saved training log to {}",
            self.path.display()
        );
        Ok(())
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Persist the rename itself
    fn sync_dir(&self) -> io::Result<()> {
        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));
        File::open(dir)?.sync_all()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("training_log"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::result::Result<(), PersistenceError> {
    let mut file = File::create(path).map_err(|e| PersistenceError::TempWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    file.write_all(bytes).map_err(|e| PersistenceError::TempWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    file.sync_all().map_err(|e| PersistenceError::Sync {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
