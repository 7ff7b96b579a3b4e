use crate::gamma::Gamma;
use crate::prelude::*;
use getset::CopyGetters;

/// Right-censoring correction for death counts.
///
/// Of all eventual deaths in a cohort with onset d days ago, only a fraction
/// F(d) has happened yet, where F is the CDF of the onset-to-death delay.
/// Observed deaths are multiplied by 1 / F(d) to estimate the eventual total.
///
/// The distribution is built once here and reused for every lookup.
#[derive(Debug, Copy, Clone, PartialEq, CopyGetters)]
pub struct CensoringCorrector {
    #[getset(get_copy = "pub")]
    params: DelayParams,
    distribution: Gamma,
}

impl CensoringCorrector {
    pub fn new(params: DelayParams) -> Result<Self> {
        Ok(CensoringCorrector {
            params,
            distribution: params.gamma()?,
        })
    }

    /// Inflation factor for a cohort observed `days_since_onset` days after
    /// onset. Day 0 is not corrected (1 / F(0) is infinite).
    pub fn factor(&self, days_since_onset: u32) -> Real {
        if days_since_onset == 0 {
            return 1.0;
        }
        let f = self.distribution.cdf(days_since_onset as Real);
        if f <= 0.0 {
            // CDF underflow this early: no sensible correction either
            return 1.0;
        }
        return (1.0 / f).max(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn no_correction_on_day_zero() {
        for &(mean, shape) in &[(17.5, 1.72), (5.0, 0.5), (30.0, 8.0)] {
            let c = CensoringCorrector::new(DelayParams::new(mean, shape).unwrap()).unwrap();
            assert_eq!(c.factor(0), 1.0);
        }
    }

    #[test]
    fn factor_decreases_with_age_of_cohort() {
        let c = CensoringCorrector::new(DelayParams::default()).unwrap();
        let mut prev = c.factor(1);
        assert!(prev > 1.0);
        for d in 2..200 {
            let f = c.factor(d);
            assert!(f >= 1.0);
            assert!(f <= prev, "factor({}) = {} > {}", d, f, prev);
            prev = f;
        }
        assert_approx_eq!(c.factor(365), 1.0, 1e-9);
    }

    #[test]
    fn factor_is_inverse_cdf() {
        let params = DelayParams::new(2.0, 1.0).unwrap();
        let c = CensoringCorrector::new(params).unwrap();
        // shape 1 is exponential with scale = mean
        assert_approx_eq!(c.factor(2), 1.0 / (1.0 - (-1.0 as Real).exp()), 1e-10);
    }

    #[test]
    fn stored_corrector_matches_fresh_ones() {
        let params = DelayParams::new(12.0, 2.5).unwrap();
        let stored = CensoringCorrector::new(params).unwrap();
        assert_eq!(stored.params(), params);
        for d in 0..60 {
            let fresh = CensoringCorrector::new(params).unwrap();
            assert_eq!(stored.factor(d), fresh.factor(d));
        }
    }
}
