//! Death forecasts from the ages of recent cases.
//!
//! Every case is expected to die with the probability given by a CFR model for
//! its age, a mean onset-to-death delay after its onset day.
use crate::brackets::check_partition;
use crate::prelude::*;
use chrono::Duration;
use getset::{CopyGetters, Getters};
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Case fatality ratios (as fractions) by age bracket, as published by some
/// study or derived from a line list.
///
/// The brackets of a model are its own and need not match the brackets used
/// elsewhere. They must cover every age the model is asked about.
#[derive(Debug, Clone, PartialEq, CopyGetters, Serialize, Deserialize)]
pub struct CfrModel {
    label: String,
    /// Used for cases of unknown age.
    #[getset(get_copy = "pub")]
    average_cfr: Real,
    brackets: Vec<AgeBracket>,
    cfr: Vec<Real>,
}

impl CfrModel {
    pub fn new(label: &str, average_cfr: Real, by_bracket: Vec<(AgeBracket, Real)>) -> Result<Self> {
        let (brackets, cfr) = by_bracket.into_iter().unzip();
        let model = CfrModel {
            label: label.to_string(),
            average_cfr,
            brackets,
            cfr,
        };
        model.validate()?;
        return Ok(model);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn brackets(&self) -> &[AgeBracket] {
        &self.brackets
    }

    pub fn by_bracket(&self) -> impl Iterator<Item = (AgeBracket, Real)> + '_ {
        self.brackets.iter().copied().zip(self.cfr.iter().copied())
    }

    /// Check brackets are contiguous from age 0 and all ratios are fractions.
    pub fn validate(&self) -> Result<()> {
        let context = |msg: String| Error::InvalidParams(format!("CFR model '{}': {}", self.label, msg));
        if self.brackets.len() != self.cfr.len() {
            return Err(context(format!(
                "{} brackets but {} CFR values",
                self.brackets.len(),
                self.cfr.len()
            )));
        }
        check_partition(&self.brackets).map_err(|e| context(e.to_string()))?;
        let fraction = |x: Real| (0.0..=1.0).contains(&x);
        if !fraction(self.average_cfr) {
            return Err(context(format!("average CFR {} not in [0, 1]", self.average_cfr)));
        }
        if let Some((b, x)) = self.by_bracket().find(|(_, x)| !fraction(*x)) {
            return Err(context(format!("CFR {} for ages {} not in [0, 1]", x, b)));
        }
        Ok(())
    }

    /// CFR of a case. Unknown or NaN ages get the average CFR; an age outside every
    /// bracket is a configuration error.
    pub fn cfr_for_age(&self, age: Option<Age>) -> Result<Real> {
        let age = match known_age(age) {
            None => return Ok(self.average_cfr),
            Some(age) => age,
        };
        match self.brackets.iter().position(|b| b.contains(age)) {
            Some(i) => Ok(self.cfr[i]),
            None => Err(Error::BracketNotFound {
                age,
                context: format!("CFR model '{}'", self.label),
            }),
        }
    }

    /// Expected deaths among cases of the given ages.
    pub fn expected_deaths(&self, ages: &[Option<Age>]) -> Result<Real> {
        let mut total = 0.0;
        for &age in ages {
            total += self.cfr_for_age(age)?;
        }
        return Ok(total);
    }
}

/// What to do with the most recent input day, whose cases are usually still
/// coming in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastDayPolicy {
    /// Use it as is.
    Keep,
    /// Never let it fall below the day before.
    FloorToPrevious,
    /// Leave it out of the forecast.
    Drop,
}

impl Default for LastDayPolicy {
    fn default() -> Self {
        LastDayPolicy::FloorToPrevious
    }
}

/// Smoothed forecast of daily deaths for one model.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct Forecast {
    label: String,
    series: TimeSeries,
}

impl Forecast {
    pub fn into_series(self) -> TimeSeries {
        self.series
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct ForecastEngine {
    #[getset(get = "pub")]
    models: Vec<CfrModel>,
    #[getset(get_copy = "pub")]
    mean_delay: Real,
    #[getset(get_copy = "pub")]
    window: usize,
    #[getset(get_copy = "pub")]
    last_day: LastDayPolicy,
}

impl ForecastEngine {
    pub fn new(models: Vec<CfrModel>, mean_delay: Real, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::InvalidWindow("forecast window must be positive".into()));
        }
        if !(mean_delay >= 0.0 && mean_delay.is_finite()) {
            return Err(Error::InvalidParams(format!("invalid mean delay {}", mean_delay)));
        }
        for m in &models {
            m.validate()?;
        }
        Ok(ForecastEngine {
            models,
            mean_delay,
            window,
            last_day: LastDayPolicy::default(),
        })
    }

    pub fn with_last_day(mut self, policy: LastDayPolicy) -> Self {
        self.last_day = policy;
        return self;
    }

    /// Whole days between onset and the forecast death.
    pub fn shift(&self) -> Duration {
        Duration::days(self.mean_delay.round() as i64)
    }

    /// One smoothed series per model, in model order.
    ///
    /// Every calendar day from the first to the last input day is forecast;
    /// a day without cases expects no deaths.
    pub fn forecast(&self, daily_ages: &BTreeMap<Day, Vec<Option<Age>>>) -> Result<Vec<Forecast>> {
        let mut out = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let raw = self.raw_forecast(model, daily_ages)?;
            debug!(target: "forecast", "{}: {} raw points", model.label(), raw.len());
            out.push(Forecast {
                label: model.label.clone(),
                series: raw.moving_average(self.window)?,
            });
        }
        return Ok(out);
    }

    /// Unsmoothed expected deaths, dated by the forecast day of death.
    pub fn raw_forecast(&self, model: &CfrModel, daily_ages: &BTreeMap<Day, Vec<Option<Age>>>) -> Result<TimeSeries> {
        let mut series = TimeSeries::new();
        let (first, last) = match (daily_ages.keys().next(), daily_ages.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => return Ok(series),
        };
        let shift = self.shift();
        let none = vec![];
        let mut prev: Option<Real> = None;
        let mut day = first;

        while day <= last {
            let ages = daily_ages.get(&day).unwrap_or(&none);
            let mut deaths = model.expected_deaths(ages)?;
            if day == last {
                match (self.last_day, prev) {
                    (LastDayPolicy::Drop, _) => break,
                    (LastDayPolicy::FloorToPrevious, Some(p)) if deaths < p => {
                        trace!(target: "forecast", "{}: floored last day {} from {:.2} to {:.2}", model.label(), day, deaths, p);
                        deaths = p;
                    }
                    _ => {}
                }
            }
            series.insert(day + shift, deaths);
            prev = Some(deaths);
            day = day + Duration::days(1);
        }
        return Ok(series);
    }
}

/// Ages of cases grouped by onset day.
pub fn ages_by_onset(records: &[CaseRecord]) -> BTreeMap<Day, Vec<Option<Age>>> {
    let mut out: BTreeMap<Day, Vec<Option<Age>>> = BTreeMap::new();
    for r in records {
        out.entry(r.onset()).or_default().push(r.age());
    }
    return out;
}
