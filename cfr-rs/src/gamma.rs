//! Two-parameter Gamma distribution (location fixed at zero).
//!
//! Only what the delay fitter and the censoring correction need: the CDF and
//! maximum likelihood estimation of shape and scale.
use crate::prelude::*;
use getset::CopyGetters;
use std::f64::consts::PI;

/// Shape estimates are capped here. Samples without any dispersion have an
/// unbounded shape MLE.
pub const MAX_SHAPE: Real = 1e4;

const EPS: Real = 1e-14;
const FPMIN: Real = 1e-300;
const MAX_ITER: usize = 10_000;

#[derive(Debug, Copy, Clone, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Gamma {
    shape: Real,
    scale: Real,
}

impl Gamma {
    pub fn new(shape: Real, scale: Real) -> Result<Self> {
        if !(shape > 0.0 && shape.is_finite()) || !(scale > 0.0 && scale.is_finite()) {
            return Err(Error::InvalidParams(format!(
                "gamma needs positive shape and scale, got shape={} scale={}",
                shape, scale
            )));
        }
        Ok(Gamma { shape, scale })
    }

    /// Parametrize by mean and shape (scale = mean / shape).
    pub fn from_mean_shape(mean: Real, shape: Real) -> Result<Self> {
        Gamma::new(shape, mean / shape)
    }

    pub fn mean(&self) -> Real {
        self.shape * self.scale
    }

    pub fn cdf(&self, x: Real) -> Real {
        if x <= 0.0 {
            return 0.0;
        }
        regularized_lower_gamma(self.shape, x / self.scale)
    }

    pub fn ln_pdf(&self, x: Real) -> Real {
        let (k, theta) = (self.shape, self.scale);
        (k - 1.0) * x.ln() - x / theta - ln_gamma(k) - k * theta.ln()
    }

    /// Maximum likelihood fit. Returns the fitted distribution and whether the
    /// shape had to be capped at MAX_SHAPE.
    ///
    /// With location pinned at zero the MLE of the mean is the sample mean and
    /// the shape k solves ln(k) - digamma(k) = ln(mean) - mean(ln x).
    pub fn fit(samples: &[Real]) -> Result<(Self, bool)> {
        if samples.is_empty() {
            return Err(Error::InsufficientData("cannot fit gamma to an empty sample".into()));
        }
        if let Some(&x) = samples.iter().find(|&&x| !(x > 0.0 && x.is_finite())) {
            return Err(Error::InvalidParams(format!(
                "gamma samples must be positive, got {}",
                x
            )));
        }
        let n = samples.len() as Real;
        let mean = samples.iter().sum::<Real>() / n;
        let mean_ln = samples.iter().map(|x| x.ln()).sum::<Real>() / n;
        let s = mean.ln() - mean_ln;

        if s <= 1e-12 {
            return Ok((Gamma::from_mean_shape(mean, MAX_SHAPE)?, true));
        }

        // Closed-form starting point, then Newton on ln(k) - digamma(k) = s
        let mut k = (3.0 - s + ((s - 3.0) * (s - 3.0) + 24.0 * s).sqrt()) / (12.0 * s);
        for _ in 0..100 {
            let f = k.ln() - digamma(k) - s;
            let df = 1.0 / k - trigamma(k);
            let mut next = k - f / df;
            if next <= 0.0 {
                next = k / 2.0;
            }
            let done = ((next - k) / k).abs() < 1e-12;
            k = next;
            if done || k >= MAX_SHAPE {
                break;
            }
        }
        if k >= MAX_SHAPE {
            return Ok((Gamma::from_mean_shape(mean, MAX_SHAPE)?, true));
        }
        Ok((Gamma::from_mean_shape(mean, k)?, false))
    }
}

///////////////////////////////////////////////////////////////////////////////
// Special functions
///////////////////////////////////////////////////////////////////////////////

/// Log-gamma via Lanczos approximation (g=7, n=9 coefficients).
#[allow(clippy::excessive_precision)]
pub fn ln_gamma(x: Real) -> Real {
    const COEFFS: [Real; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        return PI.ln() - (PI * x).sin().abs().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut ag = COEFFS[0];
    for (i, &c) in COEFFS[1..].iter().enumerate() {
        ag += c / (x + i as Real + 1.0);
    }
    let t = x + 7.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
}

/// Digamma function: derivative of ln_gamma.
pub fn digamma(x: Real) -> Real {
    if x <= 0.0 {
        return crate::NAN;
    }
    let mut result = 0.0;
    let mut x = x;
    while x < 10.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let inv_x = 1.0 / x;
    let inv_x2 = inv_x * inv_x;
    result + x.ln() - 0.5 * inv_x - inv_x2 / 12.0 + inv_x2 * inv_x2 / 120.0
        - inv_x2 * inv_x2 * inv_x2 / 252.0
}

/// Trigamma function: derivative of digamma.
pub fn trigamma(x: Real) -> Real {
    if x <= 0.0 {
        return crate::NAN;
    }
    let mut result = 0.0;
    let mut x = x;
    while x < 10.0 {
        result += 1.0 / (x * x);
        x += 1.0;
    }
    let inv_x = 1.0 / x;
    let inv_x2 = inv_x * inv_x;
    result
        + inv_x
        + inv_x2 / 2.0
        + inv_x * inv_x2 * (1.0 / 6.0 - inv_x2 * (1.0 / 30.0 - inv_x2 * (1.0 / 42.0 - inv_x2 / 30.0)))
}

/// Regularized lower incomplete gamma P(a, x).
///
/// Series expansion below x = a + 1, continued fraction for the upper
/// function above it.
pub fn regularized_lower_gamma(a: Real, x: Real) -> Real {
    if x <= 0.0 {
        return 0.0;
    }
    let prefactor = (-x + a * x.ln() - ln_gamma(a)).exp();
    if x < a + 1.0 {
        let mut ap = a;
        let mut term = 1.0 / a;
        let mut sum = term;
        for _ in 0..MAX_ITER {
            ap += 1.0;
            term *= x / ap;
            sum += term;
            if term.abs() < sum.abs() * EPS {
                break;
            }
        }
        return (sum * prefactor).min(1.0);
    }

    // Modified Lentz for the continued fraction of Q(a, x)
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITER {
        let an = -(i as Real) * (i as Real - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    (1.0 - prefactor * h).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn ln_gamma_at_integers() {
        assert_approx_eq!(ln_gamma(1.0), 0.0, 1e-12);
        assert_approx_eq!(ln_gamma(2.0), 0.0, 1e-12);
        assert_approx_eq!(ln_gamma(5.0), (24.0 as Real).ln(), 1e-10);
        assert_approx_eq!(ln_gamma(0.5), PI.sqrt().ln(), 1e-10);
    }

    #[test]
    fn digamma_and_trigamma_at_one() {
        assert_approx_eq!(digamma(1.0), -0.577_215_664_901_532_9, 1e-9);
        assert_approx_eq!(trigamma(1.0), PI * PI / 6.0, 1e-9);
    }

    #[test]
    fn exponential_cdf() {
        let g = Gamma::new(1.0, 2.0).unwrap();
        for &x in &[0.1, 1.0, 2.5, 10.0, 40.0] {
            assert_approx_eq!(g.cdf(x), 1.0 - (-x / 2.0 as Real).exp(), 1e-10);
        }
        assert_eq!(g.cdf(0.0), 0.0);
        assert_eq!(g.cdf(-1.0), 0.0);
    }

    #[test]
    fn erlang_cdf() {
        let g = Gamma::new(2.0, 1.0).unwrap();
        for &x in &[0.5, 2.0, 3.0, 8.0] {
            let expected = 1.0 - (-x as Real).exp() * (1.0 + x);
            assert_approx_eq!(g.cdf(x), expected, 1e-10);
        }
    }

    #[test]
    fn mean_shape_parametrization() {
        let g = Gamma::from_mean_shape(17.5, 1.72).unwrap();
        assert_approx_eq!(g.mean(), 17.5, 1e-12);
        assert_approx_eq!(g.scale(), 17.5 / 1.72, 1e-12);
        assert!(Gamma::from_mean_shape(17.5, 0.0).is_err());
        assert!(Gamma::new(1.0, -1.0).is_err());
    }

    #[test]
    fn fit_solves_likelihood_equation() {
        let samples = vec![3.0, 7.0, 9.0, 12.0, 14.0, 15.0, 18.0, 21.0, 25.0, 33.0];
        let (g, capped) = Gamma::fit(&samples).unwrap();
        assert!(!capped);
        let n = samples.len() as Real;
        let mean = samples.iter().sum::<Real>() / n;
        let mean_ln = samples.iter().map(|x| x.ln()).sum::<Real>() / n;
        assert_approx_eq!(g.mean(), mean, 1e-9);
        let k = g.shape();
        assert_approx_eq!(k.ln() - digamma(k), mean.ln() - mean_ln, 1e-9);
    }

    #[test]
    fn fit_maximizes_likelihood() {
        let samples = vec![2.0, 5.0, 6.0, 11.0, 17.0, 19.0, 30.0];
        let (g, _) = Gamma::fit(&samples).unwrap();
        let ll = |d: &Gamma| samples.iter().map(|&x| d.ln_pdf(x)).sum::<Real>();
        let best = ll(&g);
        for &f in &[0.9, 1.1] {
            let other = Gamma::from_mean_shape(g.mean(), g.shape() * f).unwrap();
            assert!(ll(&other) < best);
        }
    }

    #[test]
    fn fit_without_dispersion_is_capped() {
        let (g, capped) = Gamma::fit(&[10.0, 10.0]).unwrap();
        assert!(capped);
        assert_eq!(g.shape(), MAX_SHAPE);
        assert_approx_eq!(g.mean(), 10.0, 1e-9);
    }

    #[test]
    fn fit_rejects_bad_samples() {
        assert!(matches!(Gamma::fit(&[]), Err(Error::InsufficientData(_))));
        assert!(matches!(Gamma::fit(&[1.0, 0.0]), Err(Error::InvalidParams(_))));
    }
}
