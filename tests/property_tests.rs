use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;
use trainsync::{
    Discipline, PlannedWorkout, RawActivityRecord, Reconciler, SourceId, Telemetry,
};

/// Properties that must hold for any mix of plan entries and activities

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
}

fn today() -> NaiveDate {
    day(12)
}

fn discipline_strategy() -> impl Strategy<Value = Discipline> {
    prop_oneof![
        Just(Discipline::Run),
        Just(Discipline::Bike),
        Just(Discipline::Swim),
    ]
}

fn plan_strategy() -> impl Strategy<Value = Vec<PlannedWorkout>> {
    prop::collection::vec((1u32..=15, discipline_strategy(), 0i64..=120), 0..12).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(d, discipline, minutes)| PlannedWorkout {
                    id: format!("PLAN-{}-{}", day(d), discipline),
                    date: day(d),
                    discipline,
                    planned_duration_minutes: Decimal::from(minutes),
                    title: String::new(),
                    notes: String::new(),
                })
                .collect()
        },
    )
}

fn activity_strategy() -> impl Strategy<Value = Vec<RawActivityRecord>> {
    // Code 9 is not a reconcilable sport
    prop::collection::vec(
        (0u64..40, 1u32..=15, prop::sample::select(vec![1i64, 2, 5, 9]), 0i64..=7200),
        0..20,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, d, code, seconds)| RawActivityRecord {
                source_id: SourceId::from(id),
                date: day(d),
                type_code: Some(code),
                type_label: None,
                title: None,
                duration_seconds: Decimal::from(seconds),
                distance_meters: Decimal::ZERO,
                telemetry: Telemetry::default(),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_second_run_is_a_no_op(
        plan in plan_strategy(),
        activities in activity_strategy(),
    ) {
        let reconciler = Reconciler::default();
        let first = reconciler.run(Vec::new(), plan.clone(), activities.clone(), today());
        let second = reconciler.run(first.records.clone(), plan, activities, today());

        prop_assert_eq!(&first.records, &second.records);
        prop_assert_eq!(&first.consumed, &second.consumed);
    }

    #[test]
    fn prop_keys_are_unique_and_dated_up_to_today(
        plan in plan_strategy(),
        activities in activity_strategy(),
    ) {
        let outcome = Reconciler::default().run(Vec::new(), plan, activities, today());

        let mut keys = HashSet::new();
        for record in &outcome.records {
            prop_assert!(keys.insert(record.key()), "duplicate key {}", record.key());
            prop_assert!(record.date <= today());
            prop_assert!(record.discipline.is_reconcilable());
            prop_assert!(record.status.is_some());
        }
    }

    #[test]
    fn prop_each_source_id_lands_in_at_most_one_record(
        plan in plan_strategy(),
        activities in activity_strategy(),
    ) {
        let outcome = Reconciler::default().run(Vec::new(), plan, activities, today());

        let mut seen = HashSet::new();
        for record in &outcome.records {
            for id in record.source_ids() {
                prop_assert!(seen.insert(id.clone()), "id {} merged twice", id);
            }
        }
        prop_assert_eq!(seen.len(), outcome.consumed.len());
    }
}
