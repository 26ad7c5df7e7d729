//! Completion status of a log record.
//!
//! | planned | actual | date vs today | status    |
//! |---------|--------|---------------|-----------|
//! | > 0     | > 0    | any           | COMPLETED |
//! | > 0     | = 0    | before        | MISSED    |
//! | > 0     | = 0    | today/after   | PLANNED   |
//! | = 0     | > 0    | any           | UNPLANNED |
//! | = 0     | = 0    | today/after   | PLANNED   |
//! | = 0     | = 0    | before        | excluded  |

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{MergedLogRecord, Status};

/// Classify from planned and actual minutes and the record date.
///
/// Returns `None` for an empty record dated before `today`; such records do
/// not belong in the log.
pub fn classify(
    planned_minutes: Decimal,
    actual_minutes: Decimal,
    date: NaiveDate,
    today: NaiveDate,
) -> Option<Status> {
    let planned = planned_minutes > Decimal::ZERO;
    let actual = actual_minutes > Decimal::ZERO;
    let past = date < today;

    match (planned, actual, past) {
        (true, true, _) => Some(Status::Completed),
        (true, false, true) => Some(Status::Missed),
        (true, false, false) => Some(Status::Planned),
        (false, true, _) => Some(Status::Unplanned),
        (false, false, false) => Some(Status::Planned),
        (false, false, true) => None,
    }
}

impl MergedLogRecord {
    pub fn derive_status(&self, today: NaiveDate) -> Option<Status> {
        classify(
            self.planned_duration_minutes,
            self.actual_duration_minutes(),
            self.date,
            today,
        )
    }
}
