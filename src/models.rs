use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Disciplines the training plan schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Discipline {
    Run,
    Bike,
    Swim,
    /// Anything the plan never schedules; excluded from reconciliation
    Other,
}

impl Discipline {
    /// Whether records of this discipline take part in reconciliation
    pub fn is_reconcilable(&self) -> bool {
        !matches!(self, Discipline::Other)
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Run => write!(f, "Run"),
            Discipline::Bike => write!(f, "Bike"),
            Discipline::Swim => write!(f, "Swim"),
            Discipline::Other => write!(f, "Other"),
        }
    }
}

/// Provider-unique identifier of one recorded activity.
///
/// Providers hand these out as strings or integers; both are stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        SourceId(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        SourceId::new(value)
    }
}

impl From<u64> for SourceId {
    fn from(value: u64) -> Self {
        SourceId(value.to_string())
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => SourceId::new(s),
            RawId::Signed(n) => SourceId(n.to_string()),
            RawId::Unsigned(n) => SourceId(n.to_string()),
        })
    }
}

/// Unique key of a log record: one calendar day, one discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogKey {
    pub date: NaiveDate,
    pub discipline: Discipline,
}

impl LogKey {
    pub fn new(date: NaiveDate, discipline: Discipline) -> Self {
        Self { date, discipline }
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.date, self.discipline)
    }
}

/// Raw activity-type signal as a provider reports it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeSignal<'a> {
    /// Numeric sport code (authoritative when recognised)
    pub code: Option<i64>,

    /// Free-text type label, e.g. `"virtual_ride"`
    pub label: Option<&'a str>,
}

/// One scheduled session produced by the plan parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWorkout {
    /// Stable planned-entry identifier
    pub id: String,

    pub date: NaiveDate,

    #[serde(alias = "activityType")]
    pub discipline: Discipline,

    #[serde(alias = "plannedDuration", default, deserialize_with = "zero_if_null")]
    pub planned_duration_minutes: Decimal,

    #[serde(alias = "plannedWorkout", default)]
    pub title: String,

    #[serde(default)]
    pub notes: String,
}

impl PlannedWorkout {
    pub fn key(&self) -> LogKey {
        LogKey::new(self.date, self.discipline)
    }

    /// Clamp values that arrive out of range from the plan parser
    pub fn sanitize(&mut self) {
        if self.planned_duration_minutes.is_sign_negative() {
            self.planned_duration_minutes = Decimal::ZERO;
        }
    }
}

/// Optional telemetry carried by activities and log records.
///
/// Field names follow the provider cache so the log stays readable by the
/// same consumers. Absent fields stay `None`; they are never read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    #[serde(
        rename = "avgPower",
        alias = "averagePower",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_power: Option<Decimal>,

    #[serde(
        rename = "normPower",
        alias = "normalizedPower",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub normalized_power: Option<Decimal>,

    #[serde(
        rename = "maxPower",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_power: Option<Decimal>,

    #[serde(
        rename = "averageHR",
        alias = "averageHeartRate",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_heart_rate: Option<Decimal>,

    #[serde(
        rename = "maxHR",
        alias = "maxHeartRate",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_heart_rate: Option<Decimal>,

    /// Revolutions per minute
    #[serde(
        rename = "averageBikingCadenceInRevPerMinute",
        alias = "averageBikingCadence",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_biking_cadence: Option<Decimal>,

    /// Steps per minute
    #[serde(
        rename = "averageRunningCadenceInStepsPerMinute",
        alias = "averageRunningCadence",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_running_cadence: Option<Decimal>,

    #[serde(
        rename = "avgStrideLength",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_stride_length: Option<Decimal>,

    #[serde(
        rename = "avgVerticalOscillation",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_vertical_oscillation: Option<Decimal>,

    #[serde(
        rename = "avgGroundContactTime",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_ground_contact_time: Option<Decimal>,

    /// Meters per second
    #[serde(
        rename = "averageSpeed",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_speed: Option<Decimal>,

    #[serde(
        rename = "maxSpeed",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_speed: Option<Decimal>,

    #[serde(
        rename = "trainingStressScore",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub training_stress_score: Option<Decimal>,

    #[serde(
        rename = "intensityFactor",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub intensity_factor: Option<Decimal>,

    #[serde(serialize_with = "number::option", skip_serializing_if = "Option::is_none")]
    pub calories: Option<Decimal>,

    #[serde(
        rename = "elevationGain",
        alias = "elevationGainMeters",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub elevation_gain_meters: Option<Decimal>,

    /// Rate of perceived exertion
    #[serde(
        rename = "RPE",
        alias = "subjectiveEffort",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub subjective_effort: Option<Decimal>,

    #[serde(
        rename = "Feeling",
        alias = "subjectiveFeeling",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub subjective_feeling: Option<Decimal>,

    #[serde(
        rename = "vO2MaxValue",
        alias = "vo2MaxEstimate",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub vo2_max_estimate: Option<Decimal>,

    #[serde(
        rename = "aerobicTrainingEffect",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub aerobic_training_effect: Option<Decimal>,

    #[serde(
        rename = "anaerobicTrainingEffect",
        serialize_with = "number::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub anaerobic_training_effect: Option<Decimal>,

    /// Qualitative training-effect label, e.g. `"AEROBIC_BASE"`
    #[serde(rename = "trainingEffectLabel", skip_serializing_if = "Option::is_none")]
    pub training_effect_label: Option<String>,
}

/// One physical session recorded by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivityRecord {
    #[serde(alias = "activityId")]
    pub source_id: SourceId,

    /// Local calendar day the session started on
    #[serde(alias = "startTimeLocal", deserialize_with = "date_prefix")]
    pub date: NaiveDate,

    #[serde(alias = "sportTypeId", default)]
    pub type_code: Option<i64>,

    /// Either a bare label or the provider's `{"typeKey": ...}` object
    #[serde(alias = "typeKey", alias = "activityType", default, deserialize_with = "type_label")]
    pub type_label: Option<String>,

    #[serde(alias = "activityName", default)]
    pub title: Option<String>,

    #[serde(alias = "duration", default, deserialize_with = "zero_if_null")]
    pub duration_seconds: Decimal,

    #[serde(alias = "distance", default, deserialize_with = "zero_if_null")]
    pub distance_meters: Decimal,

    #[serde(flatten)]
    pub telemetry: Telemetry,
}

impl RawActivityRecord {
    pub fn type_signal(&self) -> TypeSignal<'_> {
        TypeSignal {
            code: self.type_code,
            label: self.type_label.as_deref(),
        }
    }

    /// Clamp values that arrive out of range from a provider
    pub fn sanitize(&mut self) {
        if self.duration_seconds.is_sign_negative() {
            self.duration_seconds = Decimal::ZERO;
        }
        if self.distance_meters.is_sign_negative() {
            self.distance_meters = Decimal::ZERO;
        }
    }
}

/// One logical workout bundled from one or more raw records sharing a key
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeActivity {
    pub key: LogKey,

    /// Contributing ids, primary record first
    pub source_ids: Vec<SourceId>,

    /// Number of raw records bundled
    pub record_count: usize,

    /// Title of the primary (longest) record
    pub title: Option<String>,

    pub duration_seconds: Decimal,

    pub distance_meters: Decimal,

    pub telemetry: Telemetry,
}

impl CompositeActivity {
    pub fn is_group(&self) -> bool {
        self.record_count > 1
    }
}

/// How a log record's actual data was (or wasn't) obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Planned, waiting for an activity
    Pending,
    /// Planned and matched by one activity
    Linked,
    #[serde(rename = "Linked Group", alias = "LinkedGroup")]
    LinkedGroup,
    /// Created from one activity with no plan entry
    Unplanned,
    #[serde(rename = "Unplanned Group", alias = "UnplannedGroup")]
    UnplannedGroup,
    /// Added by hand outside the sync
    #[serde(rename = "Unplanned (Manual)", alias = "UnplannedManual")]
    UnplannedManual,
    /// Planned day passed without an activity
    Missed,
    /// Written by older log versions for future plan entries; treated as Pending
    Planned,
}

impl MatchStatus {
    pub fn linked(group: bool) -> Self {
        if group {
            MatchStatus::LinkedGroup
        } else {
            MatchStatus::Linked
        }
    }

    pub fn unplanned(group: bool) -> Self {
        if group {
            MatchStatus::UnplannedGroup
        } else {
            MatchStatus::Unplanned
        }
    }

    /// True while no activity has been merged into the record
    pub fn is_awaiting_actual(&self) -> bool {
        matches!(
            self,
            MatchStatus::Pending | MatchStatus::Planned | MatchStatus::Missed
        )
    }
}

/// Derived completion classification of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Completed,
    Missed,
    Planned,
    Unplanned,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Completed => write!(f, "COMPLETED"),
            Status::Missed => write!(f, "MISSED"),
            Status::Planned => write!(f, "PLANNED"),
            Status::Unplanned => write!(f, "UNPLANNED"),
        }
    }
}

/// Actual-side fields of a log record, copied from a composite activity.
///
/// Flattened into the record, so `actualDuration` sits at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualTelemetry {
    #[serde(alias = "garminActivityId", deserialize_with = "source_id_list")]
    pub source_ids: Vec<SourceId>,

    #[serde(default, rename = "actualWorkout", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Minutes, rounded to one decimal place
    #[serde(
        rename = "actualDuration",
        default,
        deserialize_with = "zero_if_null",
        serialize_with = "number::serialize"
    )]
    pub duration_minutes: Decimal,

    #[serde(
        rename = "duration",
        alias = "durationSeconds",
        default,
        deserialize_with = "zero_if_null",
        serialize_with = "number::serialize"
    )]
    pub duration_seconds: Decimal,

    #[serde(
        rename = "distance",
        alias = "distanceMeters",
        default,
        deserialize_with = "zero_if_null",
        serialize_with = "number::serialize"
    )]
    pub distance_meters: Decimal,

    #[serde(flatten)]
    pub telemetry: Telemetry,
}

impl ActualTelemetry {
    pub fn from_composite(composite: &CompositeActivity) -> Self {
        Self {
            source_ids: composite.source_ids.clone(),
            title: composite.title.clone(),
            duration_minutes: (composite.duration_seconds / Decimal::from(60)).round_dp(1),
            duration_seconds: composite.duration_seconds,
            distance_meters: composite.distance_meters,
            telemetry: composite.telemetry.clone(),
        }
    }

    /// View the stored actuals as a composite so they can be re-bundled
    pub fn to_composite(&self, key: LogKey) -> CompositeActivity {
        CompositeActivity {
            key,
            source_ids: self.source_ids.clone(),
            record_count: self.source_ids.len().max(1),
            title: self.title.clone(),
            duration_seconds: self.duration_seconds,
            distance_meters: self.distance_meters,
            telemetry: self.telemetry.clone(),
        }
    }
}

/// The persisted merge of plan and activity data for one (date, discipline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedLogRecord {
    pub date: NaiveDate,

    #[serde(rename = "activityType", alias = "discipline")]
    pub discipline: Discipline,

    /// Weekday name, e.g. `"Monday"`
    #[serde(default)]
    pub day: String,

    #[serde(default, rename = "id", alias = "plannedId", skip_serializing_if = "Option::is_none")]
    pub planned_id: Option<String>,

    #[serde(default, rename = "plannedWorkout", skip_serializing_if = "Option::is_none")]
    pub planned_title: Option<String>,

    #[serde(
        rename = "plannedDuration",
        default,
        deserialize_with = "zero_if_null",
        serialize_with = "number::serialize"
    )]
    pub planned_duration_minutes: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(flatten)]
    pub actual: Option<ActualTelemetry>,

    pub match_status: MatchStatus,

    /// Unrecognised stored values read as `None` and are derived again
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl MergedLogRecord {
    /// New record for a plan entry that has no record yet
    pub fn from_plan(plan: &PlannedWorkout) -> Self {
        let mut record = Self::bare(plan.key(), MatchStatus::Pending);
        record.apply_plan(plan);
        record
    }

    /// New record for an activity with no planned counterpart
    pub fn from_composite(composite: &CompositeActivity) -> Self {
        let mut record =
            Self::bare(composite.key, MatchStatus::unplanned(composite.is_group()));
        record.actual = Some(ActualTelemetry::from_composite(composite));
        record
    }

    fn bare(key: LogKey, match_status: MatchStatus) -> Self {
        Self {
            date: key.date,
            discipline: key.discipline,
            day: day_name(key.date).to_string(),
            planned_id: None,
            planned_title: None,
            planned_duration_minutes: Decimal::ZERO,
            notes: None,
            actual: None,
            match_status,
            status: None,
        }
    }

    pub fn key(&self) -> LogKey {
        LogKey::new(self.date, self.discipline)
    }

    /// Refresh the planned side only
    pub fn apply_plan(&mut self, plan: &PlannedWorkout) {
        self.planned_id = Some(plan.id.clone());
        self.planned_title = Some(plan.title.clone());
        self.planned_duration_minutes = plan.planned_duration_minutes;
        self.notes = Some(plan.notes.clone());
        if self.day.is_empty() {
            self.day = day_name(self.date).to_string();
        }
    }

    /// Merge a composite activity into an existing record.
    ///
    /// Ids already on the record are kept so they stay consumed.
    pub fn link(&mut self, composite: &CompositeActivity) {
        let previous = self.source_ids().to_vec();
        let group = composite.is_group() || !previous.is_empty();

        let mut actual = ActualTelemetry::from_composite(composite);
        for id in previous {
            if !actual.source_ids.contains(&id) {
                actual.source_ids.push(id);
            }
        }
        self.actual = Some(actual);

        self.match_status = if self.has_plan() {
            MatchStatus::linked(group)
        } else {
            MatchStatus::unplanned(group)
        };
    }

    /// True once a plan entry has been applied
    pub fn has_plan(&self) -> bool {
        self.planned_id.is_some() || self.planned_duration_minutes > Decimal::ZERO
    }

    pub fn actual_duration_minutes(&self) -> Decimal {
        self.actual
            .as_ref()
            .map(|a| a.duration_minutes)
            .unwrap_or(Decimal::ZERO)
    }

    /// Ids of every activity merged into this record
    pub fn source_ids(&self) -> &[SourceId] {
        self.actual
            .as_ref()
            .map(|a| a.source_ids.as_slice())
            .unwrap_or(&[])
    }
}

pub fn day_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or(Decimal::ZERO))
}

/// Accepts `"2026-01-10"` as well as local timestamps like `"2026-01-10 07:45:00"`
fn date_prefix<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let prefix = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .map_err(|e| serde::de::Error::custom(format!("unparseable date {:?}: {}", raw, e)))
}

/// Label given as a plain string or as a provider object carrying `typeKey`
fn type_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawLabel {
        Text(String),
        Nested {
            #[serde(rename = "typeKey", default)]
            type_key: Option<String>,
        },
    }

    Ok(match Option::<RawLabel>::deserialize(deserializer)? {
        Some(RawLabel::Text(label)) => Some(label),
        Some(RawLabel::Nested { type_key }) => type_key,
        None => None,
    })
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<Status>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match s.trim().to_uppercase().as_str() {
        "COMPLETED" => Some(Status::Completed),
        "MISSED" => Some(Status::Missed),
        "PLANNED" => Some(Status::Planned),
        "UNPLANNED" => Some(Status::Unplanned),
        _ => None,
    }))
}

/// Writes `Decimal`s as JSON numbers, integers without a fraction
mod number {
    use rust_decimal::Decimal;
    use serde::ser::Error;
    use serde::Serializer;

    pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.fract().is_zero() {
            if let Ok(whole) = i64::try_from(value.trunc()) {
                return serializer.serialize_i64(whole);
            }
        }

        let float: f64 = value.to_string().parse().map_err(S::Error::custom)?;
        serializer.serialize_f64(float)
    }

    pub fn option<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Accepts a list of ids, a single id, or the legacy comma-joined form `"123,456"`
fn source_id_list<'de, D>(deserializer: D) -> Result<Vec<SourceId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIds {
        List(Vec<SourceId>),
        Joined(String),
        Single(SourceId),
    }

    Ok(match RawIds::deserialize(deserializer)? {
        RawIds::List(ids) => ids,
        RawIds::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SourceId::new)
            .collect(),
        RawIds::Single(id) => vec![id],
    })
}
