use crate::gamma::Gamma;
use crate::prelude::*;
use getset::{CopyGetters, Getters};
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Gamma fit of Florida line-list onset-to-death times.
const DELAY_MEAN: Real = 17.5;
const DELAY_SHAPE: Real = 1.72;

/// Minimum number of death samples for a fit to be trusted.
pub const MIN_DELAY_SAMPLES: usize = 5;

/// Gamma characterization of the onset-to-death delay, in days.
#[derive(Debug, Copy, Clone, PartialEq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct DelayParams {
    mean: Real,
    shape: Real,
}

impl DelayParams {
    pub fn new(mean: Real, shape: Real) -> Result<Self> {
        let params = DelayParams { mean, shape };
        params.validate()?;
        return Ok(params);
    }

    pub fn validate(&self) -> Result<()> {
        self.gamma().map(|_| ())
    }

    pub fn scale(&self) -> Real {
        self.mean / self.shape
    }

    pub fn gamma(&self) -> Result<Gamma> {
        Gamma::from_mean_shape(self.mean, self.shape)
    }
}

impl Default for DelayParams {
    fn default() -> Self {
        DelayParams {
            mean: DELAY_MEAN,
            shape: DELAY_SHAPE,
        }
    }
}

/// Soft problems found while fitting. The fit is still usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitWarning {
    /// Too few samples, or samples without any dispersion.
    LowConfidenceFit { samples: usize },
    /// Deaths whose onset falls after the snapshot reference day. They are
    /// discarded.
    NegativeDelay { count: usize },
}

/// Result of a delay fit.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters)]
pub struct DelayFit {
    #[getset(get_copy = "pub")]
    params: DelayParams,
    /// Onset-to-death delays in days, sorted.
    #[getset(get = "pub")]
    samples: Vec<u32>,
    #[getset(get_copy = "pub")]
    stats: PointStats,
    #[getset(get = "pub")]
    warnings: Vec<FitWarning>,
}

impl DelayFit {
    pub fn is_low_confidence(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, FitWarning::LowConfidenceFit { .. }))
    }

    /// Number of samples at each observed delay.
    pub fn histogram(&self) -> Vec<(u32, usize)> {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for &d in &self.samples {
            *counts.entry(d).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }
}

/// Infers the onset-to-death delay distribution from successive line-list
/// snapshots.
///
/// A death that first shows up in a snapshot is assumed to have happened on
/// the snapshot's reference day. Cases are matched across snapshots by their
/// CaseKey, and only the increase in deaths per key counts as new deaths.
#[derive(Debug, Copy, Clone, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct DelayFitter {
    min_samples: usize,
}

impl DelayFitter {
    pub fn new(min_samples: usize) -> Self {
        DelayFitter { min_samples }
    }

    /// Delay samples (in days, unsorted) and the number of discarded negative
    /// delays. Zero delays are dropped: they mostly come from cases whose
    /// onset date was back-filled with the date of death.
    pub fn samples(&self, snapshots: &[Snapshot]) -> Result<(Vec<u32>, usize)> {
        if snapshots.len() < 2 {
            return Err(Error::InsufficientData(format!(
                "need at least 2 line-list snapshots, got {}",
                snapshots.len()
            )));
        }
        let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
        ordered.sort_by_key(|s| s.date());

        let counters: Vec<BTreeMap<CaseKey, u32>> = ordered.iter().map(|s| death_counters(s)).collect();
        let mut samples = vec![];
        let (mut zero, mut negative) = (0, 0);

        for i in 1..ordered.len() {
            let reported = ordered[i].reference_day();
            let (prev, curr) = (&counters[i - 1], &counters[i]);
            for (key, &n) in curr {
                let new_deaths = n.saturating_sub(prev.get(key).copied().unwrap_or(0));
                if new_deaths == 0 {
                    continue;
                }
                let delay = (reported - key.onset).num_days();
                if delay < 0 {
                    negative += new_deaths as usize;
                } else if delay == 0 {
                    zero += new_deaths as usize;
                } else {
                    samples.extend((0..new_deaths).map(|_| delay as u32));
                }
            }
            trace!(target: "fit", "snapshot {}: {} samples so far", ordered[i].date(), samples.len());
        }
        debug!(target: "fit", "{} delay samples, {} zero-day dropped, {} negative dropped", samples.len(), zero, negative);
        return Ok((samples, negative));
    }

    /// Fit a Gamma distribution (location 0) to the delay samples by maximum
    /// likelihood.
    pub fn fit(&self, snapshots: &[Snapshot]) -> Result<DelayFit> {
        let (mut samples, negative) = self.samples(snapshots)?;
        if samples.is_empty() {
            return Err(Error::InsufficientData(
                "no new deaths with a positive onset-to-death delay".into(),
            ));
        }
        samples.sort_unstable();

        let xs: Vec<Real> = samples.iter().map(|&d| d as Real).collect();
        let (gamma, capped) = Gamma::fit(&xs)?;
        let params = DelayParams::new(gamma.mean(), gamma.shape())?;

        let mut acc = PointStatsAcc::new();
        acc.add_many(xs);

        let mut warnings = vec![];
        if negative > 0 {
            warn!(target: "fit", "discarded {} deaths reported before their onset", negative);
            warnings.push(FitWarning::NegativeDelay { count: negative });
        }
        if samples.len() < self.min_samples || capped {
            warn!(
                target: "fit",
                "low confidence delay fit: {} samples, shape capped={}",
                samples.len(),
                capped
            );
            warnings.push(FitWarning::LowConfidenceFit {
                samples: samples.len(),
            });
        }
        info!(target: "fit", "onset-to-death: mean={:.1} shape={:.2} (N={})", params.mean(), params.shape(), samples.len());

        return Ok(DelayFit {
            params,
            samples,
            stats: acc.stats(),
            warnings,
        });
    }
}

impl Default for DelayFitter {
    fn default() -> Self {
        DelayFitter::new(MIN_DELAY_SAMPLES)
    }
}

/// Number of dead cases per identity key.
fn death_counters(snapshot: &Snapshot) -> BTreeMap<CaseKey, u32> {
    let mut counters = BTreeMap::new();
    for record in snapshot.records().iter().filter(|r| r.died()) {
        *counters.entry(record.key()).or_insert(0) += 1;
    }
    return counters;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn day(d: u32) -> Day {
        Day::from_ymd_opt(2020, 6, d).unwrap()
    }

    fn dead(age: Age, onset: Day) -> CaseRecord {
        CaseRecord::new(Some(age), onset, onset, true).with_locality("Broward", "Female", "FL resident")
    }

    fn alive(age: Age, onset: Day) -> CaseRecord {
        CaseRecord::new(Some(age), onset, onset, false).with_locality("Broward", "Female", "FL resident")
    }

    #[test]
    fn needs_two_snapshots() {
        let fitter = DelayFitter::default();
        let one = vec![Snapshot::new(day(20), vec![dead(80.0, day(1))])];
        assert!(matches!(fitter.fit(&one), Err(Error::InsufficientData(_))));
        assert!(matches!(fitter.fit(&[]), Err(Error::InsufficientData(_))));
    }

    #[test]
    fn only_new_deaths_are_sampled() {
        // Snapshot of June 21 holds data up to June 20.
        let first = Snapshot::new(day(20), vec![dead(80.0, day(1)), alive(72.0, day(10)), alive(60.0, day(19))]);
        let second = Snapshot::new(
            day(21),
            vec![
                dead(80.0, day(1)),
                dead(72.0, day(10)),
                // onset back-filled with the day of death
                dead(60.0, day(20)),
            ],
        );
        let fitter = DelayFitter::default();
        let (samples, negative) = fitter.samples(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(samples, vec![10]);
        assert_eq!(negative, 0);

        let fit = fitter.fit(&[second, first]).unwrap();
        assert_eq!(fit.samples(), &vec![10]);
        assert_approx_eq!(fit.params().mean(), 10.0, 1e-9);
        assert!(fit.is_low_confidence());
    }

    #[test]
    fn duplicate_keys_count_increase_only() {
        let first = Snapshot::new(day(20), vec![dead(85.0, day(5)), dead(85.0, day(5))]);
        let second = Snapshot::new(day(22), vec![dead(85.0, day(5)), dead(85.0, day(5)), dead(85.0, day(5))]);
        let (samples, _) = DelayFitter::default().samples(&[first, second]).unwrap();
        assert_eq!(samples, vec![16]);
    }

    #[test]
    fn negative_delays_are_reported() {
        let first = Snapshot::new(day(10), vec![]);
        let second = Snapshot::new(day(11), vec![dead(50.0, day(1)), dead(51.0, day(20))]);
        let (samples, negative) = DelayFitter::default().samples(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(samples, vec![9]);
        assert_eq!(negative, 1);

        let fit = DelayFitter::default().fit(&[first, second]).unwrap();
        assert!(fit.warnings().contains(&FitWarning::NegativeDelay { count: 1 }));
    }

    #[test]
    fn no_usable_deaths_is_insufficient() {
        let first = Snapshot::new(day(10), vec![dead(50.0, day(1))]);
        let second = Snapshot::new(day(11), vec![dead(50.0, day(1))]);
        assert!(matches!(
            DelayFitter::default().fit(&[first, second]),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn fit_over_many_snapshots() {
        let onsets = [1, 3, 4, 6, 7, 9, 10];
        let mut snapshots = vec![Snapshot::new(day(15), vec![])];
        let mut records = vec![];
        for (i, &onset) in onsets.iter().enumerate() {
            records.push(dead(60.0 + i as Age, day(onset)));
            snapshots.push(Snapshot::new(day(16 + i as u32), records.clone()));
        }
        let fit = DelayFitter::default().fit(&snapshots).unwrap();

        // reference day is the snapshot day minus one
        let expected: Vec<u32> = onsets.iter().enumerate().map(|(i, &o)| 15 + i as u32 - o).collect();
        let mut sorted = expected.clone();
        sorted.sort_unstable();
        assert_eq!(fit.samples(), &sorted);
        assert!(!fit.is_low_confidence());
        assert_eq!(fit.stats().size(), onsets.len());

        let mean = expected.iter().sum::<u32>() as Real / expected.len() as Real;
        assert_approx_eq!(fit.params().mean(), mean, 1e-9);
        assert_eq!(fit.histogram().iter().map(|p| p.1).sum::<usize>(), onsets.len());
    }

    #[test]
    fn default_params() {
        let params = DelayParams::default();
        assert_eq!(params.mean(), 17.5);
        assert_eq!(params.shape(), 1.72);
        assert!(DelayParams::new(-1.0, 2.0).is_err());
    }
}
