use crate::prelude::*;
use chrono::Duration;
use getset::{CopyGetters, Getters};
use log::*;
use serde::{Deserialize, Serialize};

/// Calibrates a reference forecast against the latest observed deaths.
///
/// The observed/forecast ratio on the last observed day scales the forecast
/// from that day on. The band is widened once on that day and then relaxes
/// back toward the raw forecast a little every day.
#[derive(Debug, Copy, Clone, PartialEq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct Reconciler {
    widen: Real,
    decay: Real,
}

impl Reconciler {
    pub fn new(widen: Real, decay: Real) -> Result<Self> {
        let fraction = |x: Real| (0.0..1.0).contains(&x);
        if !fraction(widen) || !fraction(decay) {
            return Err(Error::InvalidParams(format!(
                "reconciliation needs widen and decay in [0, 1), got {} and {}",
                widen, decay
            )));
        }
        Ok(Reconciler { widen, decay })
    }

    /// Band of calibrated forecasts from the day before `as_of` onwards.
    ///
    /// Observed data is assumed to be complete only up to the day before the
    /// line list was downloaded.
    pub fn reconcile(&self, reference: &TimeSeries, observed: &TimeSeries, as_of: Day) -> Result<Reconciliation> {
        let target = as_of - Duration::days(1);
        let seen = observed.get(target).ok_or(Error::NoObservationAtTarget(target))?;
        if !seen.is_finite() || seen < 0.0 {
            return Err(Error::NegativeObservation { day: target, value: seen });
        }
        let expected = match reference.get(target) {
            Some(x) if x != 0.0 && x.is_finite() => x,
            _ => return Err(Error::ReferenceUnavailable(target)),
        };

        let ratio = seen / expected;
        info!(target: "reconcile", "{}: observed {:.1}, forecast {:.1}, ratio {:.3}", target, seen, expected, ratio);

        let (mut low, mut high) = (ratio, ratio);
        let mut band = Band::new();
        for &(day, value) in reference.since(target) {
            if day == target {
                low *= 1.0 - self.widen;
                high *= 1.0 + self.widen;
            } else {
                low = self.relax(low);
                high = self.relax(high);
            }
            band.push(BandPoint::new(day, value * low, value * high));
        }
        return Ok(Reconciliation { ratio, band });
    }

    /// Move a ratio one day's step toward 1 without crossing it.
    fn relax(&self, r: Real) -> Real {
        if r < 1.0 {
            (r * (1.0 + self.decay)).min(1.0)
        } else {
            (r * (1.0 - self.decay)).max(1.0)
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Reconciler {
            widen: 0.05,
            decay: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Observed over forecast deaths on the anchor day.
    #[getset(get_copy = "pub")]
    ratio: Real,
    #[getset(get = "pub")]
    band: Band,
}
