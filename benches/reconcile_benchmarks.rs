use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trainsync::{
    bundle, Discipline, LogKey, MergedLogRecord, PlannedWorkout, RawActivityRecord, Reconciler,
    SourceId, Telemetry,
};

/// Reconciliation benchmarks
///
/// Measures bundling, full runs, and re-runs over an existing log with
/// growing history sizes.

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
}

fn discipline_for(i: usize) -> Discipline {
    match i % 3 {
        0 => Discipline::Run,
        1 => Discipline::Bike,
        _ => Discipline::Swim,
    }
}

fn create_plan(days: usize) -> Vec<PlannedWorkout> {
    (0..days * 2)
        .map(|i| {
            let date = today() - Duration::days((i / 2) as i64);
            let discipline = discipline_for(i);
            PlannedWorkout {
                id: format!("PLAN-{}-{}", date, discipline),
                date,
                discipline,
                planned_duration_minutes: Decimal::from(30 + (i % 4) * 15),
                title: format!("[{}] session {}", discipline, i),
                notes: String::new(),
            }
        })
        .collect()
}

fn create_activities(days: usize) -> Vec<RawActivityRecord> {
    (0..days * 3)
        .map(|i| {
            let code = match discipline_for(i) {
                Discipline::Run => 1,
                Discipline::Bike => 2,
                _ => 5,
            };
            RawActivityRecord {
                source_id: SourceId::from(i as u64),
                date: today() - Duration::days((i / 3) as i64),
                type_code: Some(code),
                type_label: None,
                title: Some(format!("Activity {}", i)),
                duration_seconds: Decimal::from(1200 + (i % 5) * 600),
                distance_meters: dec!(8000),
                telemetry: Telemetry {
                    average_power: Some(Decimal::from(150 + i % 80)),
                    average_heart_rate: Some(Decimal::from(130 + i % 30)),
                    max_heart_rate: Some(Decimal::from(170 + i % 15)),
                    ..Telemetry::default()
                },
            }
        })
        .collect()
}

fn bench_bundle(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bundle");
    let key = LogKey::new(today(), Discipline::Bike);

    for &size in &[1, 5, 20] {
        let records: Vec<_> = create_activities(size)
            .into_iter()
            .map(|mut r| {
                r.date = today();
                r.type_code = Some(2);
                r
            })
            .collect();

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("bundle", size), &records, |b, records| {
            b.iter(|| bundle::bundle(key, black_box(records.clone())));
        });
    }

    group.finish();
}

fn bench_fresh_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("Reconcile Fresh");
    let reconciler = Reconciler::default();

    for &days in &[14, 90, 365] {
        let plan = create_plan(days);
        let activities = create_activities(days);

        group.throughput(Throughput::Elements((plan.len() + activities.len()) as u64));
        group.bench_with_input(
            BenchmarkId::new("run", days),
            &(plan, activities),
            |b, (plan, activities)| {
                b.iter(|| {
                    reconciler.run(Vec::new(), plan.clone(), activities.clone(), today())
                });
            },
        );
    }

    group.finish();
}

fn bench_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("Reconcile Rerun");
    let reconciler = Reconciler::default();

    for &days in &[90, 365, 1095] {
        let plan = create_plan(days);
        let activities = create_activities(days);
        let existing: Vec<MergedLogRecord> = reconciler
            .run(Vec::new(), plan.clone(), activities.clone(), today())
            .records;

        group.throughput(Throughput::Elements(existing.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("run_over_existing_log", days),
            &(existing, plan, activities),
            |b, (existing, plan, activities)| {
                b.iter(|| {
                    reconciler.run(existing.clone(), plan.clone(), activities.clone(), today())
                });
            },
        );
    }

    group.finish();
}

fn bench_log_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Log Serialization");
    let reconciler = Reconciler::default();

    for &days in &[90, 365] {
        let records = reconciler
            .run(Vec::new(), create_plan(days), create_activities(days), today())
            .records;

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("json_serialize", days),
            &records,
            |b, records| {
                b.iter(|| serde_json::to_string_pretty(records));
            },
        );

        let json = serde_json::to_string_pretty(&records).unwrap();
        group.bench_with_input(BenchmarkId::new("json_deserialize", days), &json, |b, json| {
            b.iter(|| {
                let _: Result<Vec<MergedLogRecord>, _> = serde_json::from_str(json);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_bundle,
    bench_fresh_run,
    bench_rerun,
    bench_log_serialization
);

criterion_main!(benches);
