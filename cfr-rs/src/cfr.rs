//! Age-stratified case fatality ratios, corrected for right censoring.
//!
//! Cases are bucketed by onset day and age bracket. For each day, the CFR is
//! averaged over a trailing window of onset days: the raw and the short-term
//! adjusted CFR over the most recent `short` days, and the long-term adjusted
//! CFR over the `long - short` days before those. Adjusted CFRs inflate each
//! day's deaths by the censoring factor of its cohort.
use crate::prelude::*;
use chrono::Duration;
use getset::CopyGetters;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Case and death counts of one age bracket on one onset day, plus the values
/// derived from them. Derived CFRs are percentages and stay `None` when their
/// window holds no cases.
#[derive(Debug, Copy, Clone, PartialEq, Default, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct BracketCounters {
    cases: u32,
    deaths: u32,
    deaths_adjusted: Option<Real>,
    cfr_raw: Option<Real>,
    cfr_adjusted: Option<Real>,
    cfr_adjusted_long: Option<Real>,
}

impl BracketCounters {
    pub fn cfr(&self, kind: CfrKind) -> Option<Real> {
        match kind {
            CfrKind::Raw => self.cfr_raw,
            CfrKind::Adjusted => self.cfr_adjusted,
            CfrKind::AdjustedLong => self.cfr_adjusted_long,
        }
    }

    fn add(&mut self, cases: u32, deaths: u32) {
        self.cases += cases;
        self.deaths += deaths;
    }
}

/// The three CFR variants computed per day and bracket.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfrKind {
    /// Short window, deaths as observed.
    Raw,
    /// Short window, deaths corrected for censoring.
    Adjusted,
    /// Long window (excluding the short one), deaths corrected for censoring.
    AdjustedLong,
}

impl CfrKind {
    pub const ALL: [CfrKind; 3] = [CfrKind::Raw, CfrKind::Adjusted, CfrKind::AdjustedLong];

    pub fn name(self) -> &'static str {
        match self {
            CfrKind::Raw => "raw",
            CfrKind::Adjusted => "adjusted",
            CfrKind::AdjustedLong => "adjusted_long",
        }
    }
}

/// Averaging windows, in days.
#[derive(Debug, Copy, Clone, PartialEq, Eq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct CfrWindows {
    short: u32,
    long: u32,
}

impl CfrWindows {
    pub fn new(short: u32, long: u32) -> Result<Self> {
        if short == 0 || long < short {
            return Err(Error::InvalidWindow(format!(
                "CFR windows need 0 < short <= long, got short={} long={}",
                short, long
            )));
        }
        Ok(CfrWindows { short, long })
    }
}

impl Default for CfrWindows {
    fn default() -> Self {
        CfrWindows { short: 7, long: 28 }
    }
}

/// Counters keyed by onset day and bracket.
///
/// Every stored day holds one entry per configured bracket, followed by an
/// all-ages entry. Cases of unknown age are counted apart and never enter the
/// table.
#[derive(Debug, Clone, PartialEq)]
pub struct CfrTable {
    brackets: AgeBrackets,
    days: BTreeMap<Day, Vec<BracketCounters>>,
    unknown_age: usize,
}

impl CfrTable {
    pub fn new(brackets: AgeBrackets) -> Self {
        CfrTable {
            brackets,
            days: BTreeMap::new(),
            unknown_age: 0,
        }
    }

    /// Tabulate line-list records by onset day.
    pub fn from_records(brackets: AgeBrackets, records: &[CaseRecord]) -> Result<Self> {
        let mut table = CfrTable::new(brackets);
        for r in records {
            table.add_case(r.onset(), r.age(), r.died())?;
        }
        if table.unknown_age > 0 {
            info!(target: "cfr", "skipped {} of {} cases with unknown age", table.unknown_age, records.len());
        }
        return Ok(table);
    }

    pub fn add_case(&mut self, onset: Day, age: Option<Age>, died: bool) -> Result<()> {
        match known_age(age) {
            None => {
                self.unknown_age += 1;
                Ok(())
            }
            Some(age) => {
                let i = self.brackets.index_of(age, "CFR age brackets")?;
                self.add_counts(onset, i, 1, died as u32)
            }
        }
    }

    /// Add pre-aggregated counts for a bracket (by index) on some day.
    pub fn add_counts(&mut self, day: Day, bracket: usize, cases: u32, deaths: u32) -> Result<()> {
        let n = self.brackets.len();
        if bracket >= n {
            return Err(Error::InvalidBrackets(format!("bracket index {} out of {}", bracket, n)));
        }
        let row = self
            .days
            .entry(day)
            .or_insert_with(|| vec![BracketCounters::default(); n + 1]);
        row[bracket].add(cases, deaths);
        row[n].add(cases, deaths);
        Ok(())
    }

    pub fn brackets(&self) -> &AgeBrackets {
        &self.brackets
    }

    pub fn unknown_age(&self) -> usize {
        self.unknown_age
    }

    pub fn days(&self) -> impl Iterator<Item = Day> + '_ {
        self.days.keys().copied()
    }

    pub fn last_day(&self) -> Option<Day> {
        self.days.keys().next_back().copied()
    }

    pub fn get(&self, day: Day, bracket: usize) -> Option<&BracketCounters> {
        self.days.get(&day).and_then(|row| row.get(bracket))
    }

    pub fn overall(&self, day: Day) -> Option<&BracketCounters> {
        self.days.get(&day).and_then(|row| row.last())
    }

    /// Fill in adjusted deaths and the three CFR variants for every day and
    /// bracket.
    ///
    /// The censoring factor of each day uses its distance to the last day in
    /// the table, shared by all brackets.
    pub fn compute(&mut self, corrector: &CensoringCorrector, windows: CfrWindows) {
        let last = match self.last_day() {
            Some(day) => day,
            None => return,
        };
        let days: Vec<Day> = self.days.keys().copied().collect();
        let slots = self.brackets.len() + 1;

        for &day in &days {
            let days_since_onset = (last - day).num_days() as u32;
            let factor = corrector.factor(days_since_onset);
            if let Some(row) = self.days.get_mut(&day) {
                for c in row.iter_mut() {
                    c.deaths_adjusted = Some(c.deaths as Real * factor);
                }
            }

            let mut derived = Vec::with_capacity(slots);
            for slot in 0..slots {
                derived.push(self.window_cfr(day, slot, windows));
            }
            if let Some(row) = self.days.get_mut(&day) {
                for (c, (raw, adjusted, long)) in row.iter_mut().zip(derived) {
                    c.cfr_raw = raw;
                    c.cfr_adjusted = adjusted;
                    c.cfr_adjusted_long = long;
                }
            }
        }
        debug!(
            target: "cfr",
            "computed CFR for {} days x {} brackets (short={}, long={})",
            days.len(),
            self.brackets.len(),
            windows.short(),
            windows.long()
        );
    }

    /// Raw, adjusted and long-term adjusted CFR of a slot on a given day.
    fn window_cfr(&self, day: Day, slot: usize, windows: CfrWindows) -> (Option<Real>, Option<Real>, Option<Real>) {
        let (mut deaths_raw, mut deaths_adj, mut cases) = (0.0, 0.0, 0u64);
        let (mut long_deaths, mut long_cases) = (0.0, 0u64);

        for delta in 0..windows.long() {
            let c = match self.get(day - Duration::days(delta as i64), slot) {
                Some(c) => c,
                None => continue,
            };
            let adjusted = c.deaths_adjusted.unwrap_or(0.0);
            if delta < windows.short() {
                deaths_raw += c.deaths as Real;
                deaths_adj += adjusted;
                cases += c.cases as u64;
            } else {
                long_deaths += adjusted;
                long_cases += c.cases as u64;
            }
        }

        let ratio = |deaths: Real, cases: u64| {
            if cases > 0 {
                Some(100.0 * deaths / cases as Real)
            } else {
                None
            }
        };
        (
            ratio(deaths_raw, cases),
            ratio(deaths_adj, cases),
            ratio(long_deaths, long_cases),
        )
    }

    /// Defined values of one CFR variant for a bracket (by index).
    pub fn series(&self, bracket: usize, kind: CfrKind) -> TimeSeries {
        self.days
            .iter()
            .filter_map(|(&day, row)| row.get(bracket).and_then(|c| c.cfr(kind)).map(|v| (day, v)))
            .collect()
    }

    /// Defined values of one CFR variant over all ages.
    pub fn overall_series(&self, kind: CfrKind) -> TimeSeries {
        self.series(self.brackets.len(), kind)
    }

    /// Build a CFR model from the latest long-term adjusted CFR of every
    /// bracket, converted from percent to fraction.
    pub fn to_model(&self, label: &str) -> Result<CfrModel> {
        let latest = |slot: usize| -> Result<Real> {
            self.series(slot, CfrKind::AdjustedLong)
                .last()
                .map(|(_, v)| v / 100.0)
                .ok_or_else(|| {
                    Error::InsufficientData(format!("no long-term adjusted CFR for bracket slot {}", slot))
                })
        };
        let mut by_bracket = vec![];
        for (i, &b) in self.brackets.iter().enumerate() {
            by_bracket.push((b, latest(i)?));
        }
        let average = latest(self.brackets.len())?;
        CfrModel::new(label, average, by_bracket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// Day `d` counted from May 1st, 2020. May run into June.
    fn day(d: u32) -> Day {
        Day::from_ymd_opt(2020, 5, 1).unwrap() + Duration::days(d as i64 - 1)
    }

    fn table(records: &[CaseRecord]) -> CfrTable {
        CfrTable::from_records(AgeBrackets::florida(), records).unwrap()
    }

    fn case(onset: u32, age: Age, died: bool) -> CaseRecord {
        CaseRecord::new(Some(age), day(onset), day(onset), died)
    }

    #[test]
    fn three_day_scenario() {
        let mut t = table(&[case(1, 70.0, true), case(2, 30.0, false), case(3, 70.0, false)]);
        let corrector = CensoringCorrector::new(DelayParams::default()).unwrap();
        t.compute(&corrector, CfrWindows::new(1, 2).unwrap());

        let b70 = t.brackets().position(70.0).unwrap();
        let factor = corrector.factor(2);
        let c = t.get(day(1), b70).unwrap();
        assert_eq!(c.cases(), 1);
        assert_eq!(c.deaths(), 1);
        assert_approx_eq!(c.deaths_adjusted().unwrap(), factor, 1e-12);
        assert_approx_eq!(c.cfr_raw().unwrap(), 100.0, 1e-12);
        assert_approx_eq!(c.cfr_adjusted().unwrap(), 100.0 * factor, 1e-9);
        assert_eq!(c.cfr_adjusted_long(), None);

        // day 2 has no 70-79 case: short window undefined, long window sees day 1
        let c = t.get(day(2), b70).unwrap();
        assert_eq!(c.cases(), 0);
        assert_eq!(c.cfr_raw(), None);
        assert_eq!(c.cfr_adjusted(), None);
        assert_approx_eq!(c.cfr_adjusted_long().unwrap(), 100.0 * factor, 1e-9);

        let c = t.get(day(3), b70).unwrap();
        assert_eq!(c.cfr_raw(), Some(0.0));
        assert_eq!(c.cfr_adjusted_long(), None);
    }

    #[test]
    fn every_bracket_has_counters() {
        let t = table(&[case(1, 45.0, false)]);
        for i in 0..t.brackets().len() {
            let c = t.get(day(1), i).unwrap();
            if t.brackets().get(i).unwrap().contains(45.0) {
                assert_eq!(c.cases(), 1);
            } else {
                assert_eq!(*c, BracketCounters::default());
            }
        }
        assert_eq!(t.overall(day(1)).unwrap().cases(), 1);
    }

    #[test]
    fn unknown_ages_are_skipped() {
        let records = vec![CaseRecord::new(None, day(1), day(1), true), case(1, 20.0, false)];
        let t = table(&records);
        assert_eq!(t.unknown_age(), 1);
        assert_eq!(t.overall(day(1)).unwrap().cases(), 1);
        assert_eq!(t.overall(day(1)).unwrap().deaths(), 0);
    }

    #[test]
    fn nan_ages_are_unknown() {
        let mut t = table(&[case(1, 20.0, false)]);
        t.add_case(day(1), Some(Age::NAN), true).unwrap();
        assert_eq!(t.unknown_age(), 1);
        assert_eq!(t.overall(day(1)).unwrap().cases(), 1);
        assert_eq!(t.overall(day(1)).unwrap().deaths(), 0);
    }

    #[test]
    fn uncovered_age_is_an_error() {
        let brackets = AgeBrackets::new(vec![AgeBracket::new(0, 9), AgeBracket::new(10, 19)]).unwrap();
        let res = CfrTable::from_records(brackets, &[case(1, 25.0, false)]);
        assert!(matches!(res, Err(Error::BracketNotFound { .. })));
    }

    #[test]
    fn invalid_windows() {
        assert!(matches!(CfrWindows::new(0, 7), Err(Error::InvalidWindow(_))));
        assert!(matches!(CfrWindows::new(7, 6), Err(Error::InvalidWindow(_))));
        assert!(CfrWindows::new(7, 7).is_ok());
    }

    #[test]
    fn cfrs_are_non_negative_or_undefined() {
        let mut records = vec![];
        for d in 1..=30 {
            for k in 0..(d % 5) {
                records.push(case(d, (10 * k + d) as Age, (d + k) % 4 == 0));
            }
        }
        let mut t = table(&records);
        let corrector = CensoringCorrector::new(DelayParams::default()).unwrap();
        t.compute(&corrector, CfrWindows::default());
        for d in t.days().collect::<Vec<_>>() {
            for i in 0..=t.brackets().len() {
                let c = t.get(d, i).unwrap();
                assert!(c.deaths_adjusted().is_some());
                for kind in CfrKind::ALL.iter() {
                    if let Some(v) = c.cfr(*kind) {
                        assert!(v >= 0.0 && v.is_finite());
                    }
                }
            }
        }
        assert_eq!(t.overall_series(CfrKind::Raw).len(), t.days().count());
    }

    #[test]
    fn adjusted_cfr_exceeds_raw_for_recent_deaths() {
        let mut records = vec![];
        for d in 1..=10 {
            records.push(case(d, 85.0, true));
            records.push(case(d, 85.0, false));
        }
        let mut t = table(&records);
        let corrector = CensoringCorrector::new(DelayParams::default()).unwrap();
        t.compute(&corrector, CfrWindows::new(3, 6).unwrap());
        let b = t.brackets().position(85.0).unwrap();
        let raw = t.series(b, CfrKind::Raw);
        let adj = t.series(b, CfrKind::Adjusted);
        assert_eq!(raw.len(), 10);
        for (r, a) in raw.iter().zip(adj.iter()) {
            assert_approx_eq!(r.1, 50.0, 1e-9);
            assert!(a.1 >= r.1);
        }
        // first long window value appears once 3 days have passed
        assert_eq!(t.series(b, CfrKind::AdjustedLong).first().unwrap().0, day(4));
    }

    #[test]
    fn model_from_table() {
        let mut records = vec![];
        for d in 1..=40 {
            for age in (5..100).step_by(10) {
                records.push(case(d, age as Age, age >= 80 && d % 2 == 0));
                records.push(case(d, age as Age, false));
            }
        }
        let mut t = table(&records);
        let corrector = CensoringCorrector::new(DelayParams::default()).unwrap();
        t.compute(&corrector, CfrWindows::default());
        assert_eq!(t.last_day(), Some(day(40)));
        assert_eq!(day(40), Day::from_ymd_opt(2020, 6, 9).unwrap());
        let model = t.to_model("line list").unwrap();
        assert_eq!(model.label(), "line list");
        assert_eq!(model.cfr_for_age(Some(20.0)).unwrap(), 0.0);
        assert!(model.cfr_for_age(Some(95.0)).unwrap() > 0.0);
        assert!(model.average_cfr() > 0.0 && model.average_cfr() < 1.0);

        let sparse = table(&[case(1, 50.0, false)]);
        assert!(matches!(sparse.to_model("x"), Err(Error::InsufficientData(_))));
    }
}
