//! Maps provider activity-type signals onto plan disciplines.

use crate::models::{Discipline, TypeSignal};

/// Provider sport codes that map directly onto a discipline
const SPORT_CODES: [(i64, Discipline); 3] = [
    (1, Discipline::Run),
    (2, Discipline::Bike),
    (5, Discipline::Swim),
];

/// Label fragments, checked in order after the numeric code
const LABEL_FRAGMENTS: [(&str, Discipline); 5] = [
    ("run", Discipline::Run),
    ("bik", Discipline::Bike),
    ("cycl", Discipline::Bike),
    ("ride", Discipline::Bike),
    ("swim", Discipline::Swim),
];

/// Classify a raw type signal.
///
/// A recognised numeric code wins over the label. Unrecognised codes
/// (e.g. a provider's generic "other" code) fall through to the label.
/// Signals matching nothing come back as [`Discipline::Other`].
pub fn classify(signal: TypeSignal<'_>) -> Discipline {
    if let Some(discipline) = signal.code.and_then(discipline_for_code) {
        return discipline;
    }

    signal
        .label
        .and_then(discipline_for_label)
        .unwrap_or(Discipline::Other)
}

fn discipline_for_code(code: i64) -> Option<Discipline> {
    SPORT_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, discipline)| *discipline)
}

fn discipline_for_label(label: &str) -> Option<Discipline> {
    let label = label.to_lowercase();
    LABEL_FRAGMENTS
        .iter()
        .find(|(fragment, _)| label.contains(fragment))
        .map(|(_, discipline)| *discipline)
}
