use crate::prelude::{Error, Real, Result};
use getset::CopyGetters;

/// A moving window over the last n observations.
#[derive(Debug, Default, PartialEq, CopyGetters)]
pub struct Window {
    #[getset(get_copy = "pub")]
    window: usize,
    offset: usize,
    limit: usize,
    buffer: Vec<Real>,
}

impl Window {
    pub fn new(n: usize) -> Result<Window> {
        if n == 0 {
            return Err(Error::InvalidWindow("moving window must not be empty".into()));
        }
        Ok(Window {
            window: n,
            offset: 0,
            limit: 2 * n - 1,
            buffer: Vec::with_capacity(2 * n - 1),
        })
    }

    /// Add single observation of value x
    pub fn add(&mut self, x: Real) {
        if self.buffer.len() < self.window {
        } else if self.buffer.len() < self.limit {
            self.offset += 1;
        } else {
            for i in 0..self.window - 1 {
                self.buffer[i] = self.buffer[i + self.offset + 1];
            }
            self.buffer.truncate(self.window - 1);
            self.offset = 0;
        }
        self.buffer.push(x);
    }

    /// True once the window has seen at least n observations.
    pub fn is_full(&self) -> bool {
        self.buffer.len() - self.offset == self.window
    }

    pub fn mean(&self) -> Real {
        let slice = &self.buffer[self.offset..self.buffer.len()];
        let tot: Real = slice.iter().cloned().sum();
        return tot / slice.len() as Real;
    }
}

/// Trailing simple moving average.
///
/// Output point i is the mean of inputs [i, i + n - 1], so the result has
/// n - 1 fewer points than the input (none if the input is shorter than n).
pub fn moving_average(values: &[Real], n: usize) -> Result<Vec<Real>> {
    let mut w = Window::new(n)?;
    let mut out = Vec::with_capacity((values.len() + 1).saturating_sub(n));
    for &x in values {
        w.add(x);
        if w.is_full() {
            out.push(w.mean());
        }
    }
    return Ok(out);
}

/// Centered moving average over an odd window n = 2h + 1.
///
/// The i-th output is centered at input i + h; h points are dropped from
/// both ends.
pub fn centered_moving_average(values: &[Real], n: usize) -> Result<Vec<Real>> {
    if n % 2 == 0 {
        return Err(Error::InvalidWindow(format!(
            "centered average needs an odd window, got {}",
            n
        )));
    }
    moving_average(values, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn window_simple() {
        let mut w = Window::new(3).unwrap();
        w.add(10.0);
        assert_eq!(w.mean(), 10.0);
        assert!(!w.is_full());
        w.add(5.0);
        assert_eq!(w.mean(), 7.5);
        w.add(3.0);
        assert_eq!(w.mean(), 6.0);
        assert!(w.is_full());
        w.add(1.0);
        assert_eq!(w.mean(), 3.0);
        w.add(2.0);
        assert_eq!(w.mean(), 2.0);
        w.add(3.0);
        assert_eq!(w.mean(), 2.0);
        w.add(4.0);
        assert_eq!(w.mean(), 3.0);
        assert!(w.is_full());
    }

    #[test]
    fn empty_window_is_rejected() {
        assert!(matches!(Window::new(0), Err(Error::InvalidWindow(_))));
        assert!(moving_average(&[1.0], 0).is_err());
    }

    #[test]
    fn trailing_average_of_constant_series() {
        let values = vec![0.3; 20];
        for n in 1..=7 {
            let out = moving_average(&values, n).unwrap();
            assert_eq!(out.len(), 20 - (n - 1));
            for x in out {
                assert_approx_eq!(x, 0.3, 1e-12);
            }
        }
    }

    #[test]
    fn trailing_average_drops_leading_points() {
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
        assert!(moving_average(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn centered_average() {
        let out = centered_moving_average(&[1.0, 2.0, 6.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(out, vec![3.0, 4.0, 5.0]);
        assert_eq!(centered_moving_average(&[7.0], 1).unwrap(), vec![7.0]);
    }

    #[test]
    fn centered_average_rejects_even_window() {
        assert!(matches!(
            centered_moving_average(&[1.0, 2.0, 3.0, 4.0], 4),
            Err(Error::InvalidWindow(_))
        ));
        assert!(centered_moving_average(&[1.0], 0).is_err());
    }
}
