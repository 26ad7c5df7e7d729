use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use trainsync::config::PathSettings;
use trainsync::{
    DataQualityKind, LogStore, MatchStatus, Reconciler, SourceId, Status, TrainSyncError,
};

/// File-backed sync runs: loading, data-quality reporting, atomic saves

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

fn workspace() -> (TempDir, PathSettings) {
    let dir = TempDir::new().unwrap();
    let paths = PathSettings {
        plan: dir.path().join("planned.json"),
        activities: vec![
            dir.path().join("garmin.json"),
            dir.path().join("strava.json"),
        ],
        log: dir.path().join("log").join("training_log.json"),
    };
    (dir, paths)
}

const PLAN: &str = r#"[
    {"id": "PLAN-2026-01-10-Bike", "date": "2026-01-10", "activityType": "Bike",
     "plannedDuration": 60, "plannedWorkout": "[BIKE] Endurance", "notes": "Z2"},
    {"id": "PLAN-2026-01-11-Run", "date": "2026-01-11", "activityType": "Run",
     "plannedDuration": 45, "plannedWorkout": "[RUN] Tempo"},
    {"id": "PLAN-2026-01-20-Swim", "date": "2026-01-20", "activityType": "Swim",
     "plannedDuration": 30, "plannedWorkout": "[SWIM] Drills"}
]"#;

const GARMIN: &str = r#"[
    {"activityId": 1001, "startTimeLocal": "2026-01-10 07:00:00", "sportTypeId": 2,
     "activityType": {"typeId": 10, "typeKey": "road_biking"},
     "activityName": "Morning Ride", "duration": 2400,
     "distance": 20000, "avgPower": 200, "maxHR": 165},
    {"activityId": 1002, "startTimeLocal": "2026-01-10 18:00:00", "sportTypeId": 2,
     "activityType": {"typeId": 152, "typeKey": "virtual_ride"},
     "activityName": "Zwift", "duration": 1500,
     "distance": 12000, "avgPower": 150, "maxHR": 171},
    {"activityId": 1003, "startTimeLocal": "not a date", "sportTypeId": 1, "duration": 1800}
]"#;

const STRAVA: &str = r#"[
    {"sourceId": "1001", "date": "2026-01-10", "typeLabel": "Ride", "durationSeconds": 2400},
    {"sourceId": "s-77", "date": "2026-01-09", "typeLabel": "Run", "durationSeconds": 1800}
]"#;

#[test]
fn test_sync_end_to_end() {
    let (_dir, paths) = workspace();
    write(&paths.plan, PLAN);
    write(&paths.activities[0], GARMIN);
    write(&paths.activities[1], STRAVA);

    let outcome = Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.count_by_status(Status::Completed), 1);
    assert_eq!(outcome.count_by_status(Status::Missed), 1);
    assert_eq!(outcome.count_by_status(Status::Unplanned), 1);

    let bike = outcome
        .records
        .iter()
        .find(|r| r.date == date(2026, 1, 10))
        .unwrap();
    assert_eq!(bike.match_status, MatchStatus::LinkedGroup);
    assert_eq!(bike.source_ids(), &[SourceId::from("1001"), SourceId::from("1002")]);
    assert_eq!(bike.actual_duration_minutes(), dec!(65));
    assert_eq!(bike.actual.as_ref().unwrap().telemetry.max_heart_rate, Some(dec!(171)));

    // The bad Garmin date is reported, not fatal
    assert!(outcome
        .report
        .issues
        .iter()
        .any(|i| i.kind == DataQualityKind::UnparseableDate));

    let saved = LogStore::new(&paths.log).load().unwrap();
    assert_eq!(saved.records, outcome.records);
    assert!(saved.issues.is_empty());
}

#[test]
fn test_log_json_layout() {
    let (_dir, paths) = workspace();
    write(&paths.plan, PLAN);
    write(&paths.activities[0], GARMIN);

    Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();

    let content = fs::read_to_string(&paths.log).unwrap();
    assert!(content.ends_with('\n'));

    let value: Value = serde_json::from_str(&content).unwrap();
    let records = value.as_array().unwrap();

    // Newest first
    assert_eq!(records[0]["date"], "2026-01-11");
    assert_eq!(records[0]["status"], "MISSED");
    assert_eq!(records[0]["matchStatus"], "Missed");
    assert_eq!(records[1]["activityType"], "Bike");
    assert_eq!(records[1]["discipline"], Value::Null);
    assert_eq!(records[1]["day"], "Saturday");
    assert_eq!(records[1]["matchStatus"], "Linked Group");
    assert_eq!(records[1]["actual"], Value::Null);
    assert_eq!(records[1]["sourceIds"][0], "1001");
    assert_eq!(records[1]["plannedDuration"], 60);
    assert_eq!(records[1]["actualDuration"], 65);
    assert_eq!(records[1]["duration"], 3900);
    assert!(records[1]["avgPower"].is_number());
}

#[test]
fn test_sync_twice_leaves_file_unchanged() {
    let (_dir, paths) = workspace();
    write(&paths.plan, PLAN);
    write(&paths.activities[0], GARMIN);
    write(&paths.activities[1], STRAVA);

    let reconciler = Reconciler::default();
    reconciler.sync(&paths, date(2026, 1, 12)).unwrap();
    let first = fs::read_to_string(&paths.log).unwrap();

    let second_run = reconciler.sync(&paths, date(2026, 1, 12)).unwrap();
    let second = fs::read_to_string(&paths.log).unwrap();

    assert_eq!(first, second);
    assert_eq!(second_run.report.linked + second_run.report.unplanned_created, 0);
}

#[test]
fn test_missing_inputs_read_as_empty() {
    let (_dir, paths) = workspace();

    let outcome = Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();

    assert!(outcome.records.is_empty());
    assert_eq!(fs::read_to_string(&paths.log).unwrap().trim(), "[]");
}

#[test]
fn test_non_array_input_is_fatal_and_log_untouched() {
    let (_dir, paths) = workspace();
    write(&paths.plan, PLAN);
    Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();
    let before = fs::read_to_string(&paths.log).unwrap();

    write(&paths.activities[0], r#"{"activityId": 1}"#);
    let result = Reconciler::default().sync(&paths, date(2026, 1, 12));

    assert!(matches!(result, Err(TrainSyncError::Input { .. })));
    assert_eq!(fs::read_to_string(&paths.log).unwrap(), before);
}

#[test]
fn test_failed_save_keeps_previous_log() {
    let (dir, paths) = workspace();
    write(&paths.plan, PLAN);
    Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();
    let before = fs::read_to_string(&paths.log).unwrap();

    // A directory where the temp file should go makes the write fail
    fs::create_dir_all(dir.path().join("log").join("training_log.json.tmp")).unwrap();
    write(&paths.activities[0], GARMIN);

    let result = Reconciler::default().sync(&paths, date(2026, 1, 12));

    assert!(matches!(result, Err(TrainSyncError::Persistence(_))));
    assert_eq!(fs::read_to_string(&paths.log).unwrap(), before);
}

#[test]
fn test_corrupt_log_record_is_skipped() {
    let (_dir, paths) = workspace();
    fs::create_dir_all(paths.log.parent().unwrap()).unwrap();
    write(
        &paths.log,
        r#"[
            {"date": "2026-01-08", "activityType": "Run", "plannedDuration": 30,
             "garminActivityId": "500,501", "actualDuration": 31,
             "matchStatus": "Linked Group", "status": "COMPLETED"},
            {"date": "2026-01-07", "activityType": "Kayak", "matchStatus": "Pending"}
        ]"#,
    );
    write(
        &paths.activities[0],
        r#"[{"activityId": 501, "startTimeLocal": "2026-01-08", "sportTypeId": 1, "duration": 900}]"#,
    );

    let outcome = Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].actual_duration_minutes(), dec!(31));
    assert_eq!(outcome.report.skipped_consumed, 1);
    assert!(outcome
        .report
        .issues
        .iter()
        .any(|i| i.kind == DataQualityKind::MalformedRecord));

    // Skipped for the run, but still in the file
    let content = fs::read_to_string(&paths.log).unwrap();
    assert!(content.contains("Kayak"));
    assert_eq!(LogStore::new(&paths.log).load().unwrap().rejected.len(), 1);
}

#[test]
fn test_manual_entries_survive_sync() {
    let (_dir, paths) = workspace();
    fs::create_dir_all(paths.log.parent().unwrap()).unwrap();
    write(
        &paths.log,
        r#"[
            {"date": "2026-01-09", "activityType": {"typeKey": "running"},
             "actualSport": "Run", "id": 777, "actualDuration": 42,
             "matchStatus": "Unplanned (Manual)", "status": "UNPLANNED"}
        ]"#,
    );
    write(
        &paths.activities[0],
        r#"[{"activityId": 777, "startTimeLocal": "2026-01-09 06:00:00",
             "activityType": {"typeKey": "running"}, "duration": 2520},
            {"activityId": 778, "startTimeLocal": "2026-01-09 18:00:00",
             "activityType": {"typeKey": "trail_running"}, "duration": 1200}]"#,
    );

    let reconciler = Reconciler::default();
    let outcome = reconciler.sync(&paths, date(2026, 1, 12)).unwrap();

    // Neither the consumed id nor the taken key is merged again
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.report.skipped_consumed, 1);
    assert!(outcome.consumed.contains(&SourceId::from("777")));

    let saved: Value = serde_json::from_str(&fs::read_to_string(&paths.log).unwrap()).unwrap();
    let saved = saved.as_array().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["id"], 777);
    assert_eq!(saved[0]["matchStatus"], "Unplanned (Manual)");

    let first = fs::read_to_string(&paths.log).unwrap();
    reconciler.sync(&paths, date(2026, 1, 12)).unwrap();
    assert_eq!(fs::read_to_string(&paths.log).unwrap(), first);
}

#[test]
fn test_nested_activity_type_is_classified() {
    let (_dir, paths) = workspace();
    write(
        &paths.activities[0],
        r#"[{"activityId": 42, "startTimeLocal": "2026-01-11 07:30:00",
             "activityType": {"typeId": 26, "typeKey": "lap_swimming"},
             "duration": 1800, "distance": 1500}]"#,
    );

    let outcome = Reconciler::default().sync(&paths, date(2026, 1, 12)).unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].discipline, trainsync::Discipline::Swim);
    assert_eq!(outcome.records[0].actual_duration_minutes(), dec!(30));
    assert!(outcome.report.issues.is_empty());
}
