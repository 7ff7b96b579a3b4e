use crate::prelude::*;
use chrono::Duration;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Deserializer, Serialize};

/// NaN is how many tabular sources spell a missing age.
pub fn known_age(age: Option<Age>) -> Option<Age> {
    age.filter(|a| !a.is_nan())
}

fn deserialize_age<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Age>, D::Error> {
    Ok(known_age(Option::<Age>::deserialize(deserializer)?))
}

/// One row of a line list: a single confirmed case.
///
/// The locality fields are only used to tell cases apart across snapshots
/// (see CaseKey). They may be left empty when unknown.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct CaseRecord {
    #[getset(get_copy = "pub")]
    #[serde(default, deserialize_with = "deserialize_age")]
    age: Option<Age>,
    #[getset(get_copy = "pub")]
    onset: Day,
    #[getset(get_copy = "pub")]
    report: Day,
    #[getset(get_copy = "pub")]
    died: bool,
    #[getset(get = "pub")]
    #[serde(default)]
    county: String,
    #[getset(get = "pub")]
    #[serde(default)]
    sex: String,
    #[getset(get = "pub")]
    #[serde(default)]
    jurisdiction: String,
}

impl CaseRecord {
    pub fn new(age: Option<Age>, onset: Day, report: Day, died: bool) -> Self {
        CaseRecord {
            age: known_age(age),
            onset,
            report,
            died,
            county: String::new(),
            sex: String::new(),
            jurisdiction: String::new(),
        }
    }

    /// Attach the locality attributes used for identity matching.
    pub fn with_locality(mut self, county: &str, sex: &str, jurisdiction: &str) -> Self {
        self.county = county.to_string();
        self.sex = sex.to_string();
        self.jurisdiction = jurisdiction.to_string();
        return self;
    }

    pub fn key(&self) -> CaseKey {
        CaseKey::from(self)
    }
}

/// Identity of a case across line-list snapshots.
///
/// Fields compare in declaration order: county, age, sex, jurisdiction,
/// report day, onset day. Ages compare by exact value (0.0 and -0.0 are the
/// same age). Two rows with equal keys are indistinguishable; they are
/// tracked as a shared counter rather than as separate individuals, which is
/// an accepted approximation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaseKey {
    pub county: String,
    age_bits: Option<u64>,
    pub sex: String,
    pub jurisdiction: String,
    pub report: Day,
    pub onset: Day,
}

impl CaseKey {
    pub fn age(&self) -> Option<Age> {
        self.age_bits.map(Age::from_bits)
    }
}

impl From<&CaseRecord> for CaseKey {
    fn from(r: &CaseRecord) -> Self {
        CaseKey {
            county: r.county.clone(),
            // adding 0.0 folds -0.0 into 0.0
            age_bits: r.age.map(|a| (a + 0.0).to_bits()),
            sex: r.sex.clone(),
            jurisdiction: r.jurisdiction.clone(),
            report: r.report,
            onset: r.onset,
        }
    }
}

/// A full line list as downloaded on a given day.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct Snapshot {
    #[getset(get_copy = "pub")]
    date: Day,
    #[getset(get = "pub")]
    records: Vec<CaseRecord>,
}

impl Snapshot {
    pub fn new(date: Day, records: Vec<CaseRecord>) -> Self {
        Snapshot { date, records }
    }

    /// A snapshot downloaded on some day holds data up to the day before.
    pub fn reference_day(&self) -> Day {
        self.date - Duration::days(1)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
