use crate::prelude::*;
use crate::utils;
use getset::CopyGetters;
use serde::{Deserialize, Serialize};

/// A daily series of values, sorted by day with at most one value per day.
///
/// Days need not be contiguous: a missing day is missing data. Smoothing
/// operates on the stored points in order and never fills gaps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    points: Vec<(Day, Real)>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from points in any order. A later point for the same
    /// day replaces an earlier one.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (Day, Real)>,
    {
        let mut series = TimeSeries::new();
        for (day, value) in points {
            series.insert(day, value);
        }
        return series;
    }

    /// Set the value for a day, keeping points sorted.
    pub fn insert(&mut self, day: Day, value: Real) {
        match self.points.last() {
            Some(&(last, _)) if last < day => self.points.push((day, value)),
            None => self.points.push((day, value)),
            _ => match self.points.binary_search_by_key(&day, |p| p.0) {
                Ok(i) => self.points[i].1 = value,
                Err(i) => self.points.insert(i, (day, value)),
            },
        }
    }

    pub fn get(&self, day: Day) -> Option<Real> {
        self.points
            .binary_search_by_key(&day, |p| p.0)
            .ok()
            .map(|i| self.points[i].1)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (Day, Real)> {
        self.points.iter()
    }

    pub fn points(&self) -> &[(Day, Real)] {
        &self.points
    }

    pub fn first(&self) -> Option<(Day, Real)> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<(Day, Real)> {
        self.points.last().copied()
    }

    pub fn days(&self) -> Vec<Day> {
        self.points.iter().map(|p| p.0).collect()
    }

    pub fn values(&self) -> Vec<Real> {
        self.points.iter().map(|p| p.1).collect()
    }

    /// Points from the given day onwards.
    pub fn since(&self, day: Day) -> &[(Day, Real)] {
        let i = self.points.partition_point(|p| p.0 < day);
        &self.points[i..]
    }

    /// Turn a cumulative series into per-point increments. The first point is
    /// taken relative to zero.
    pub fn differences(&self) -> TimeSeries {
        let mut prev = 0.0;
        let points = self
            .points
            .iter()
            .map(|&(day, total)| {
                let delta = total - prev;
                prev = total;
                (day, delta)
            })
            .collect();
        TimeSeries { points }
    }

    /// Trailing moving average of window n. The first n - 1 points are
    /// dropped; each output keeps the day of the last point in its window.
    pub fn moving_average(&self, n: usize) -> Result<TimeSeries> {
        let values = utils::moving_average(&self.values(), n)?;
        let points = self
            .points
            .iter()
            .skip(n - 1)
            .zip(values)
            .map(|(p, v)| (p.0, v))
            .collect();
        Ok(TimeSeries { points })
    }

    /// Centered moving average of odd window n. Drops n / 2 points from each
    /// end; each output keeps the day of the center of its window.
    pub fn centered_moving_average(&self, n: usize) -> Result<TimeSeries> {
        let values = utils::centered_moving_average(&self.values(), n)?;
        let points = self
            .points
            .iter()
            .skip(n / 2)
            .zip(values)
            .map(|(p, v)| (p.0, v))
            .collect();
        Ok(TimeSeries { points })
    }
}

impl std::iter::FromIterator<(Day, Real)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (Day, Real)>>(iter: I) -> Self {
        TimeSeries::from_points(iter)
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a (Day, Real);
    type IntoIter = std::slice::Iter<'a, (Day, Real)>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// A point of a forecast band.
#[derive(Debug, Copy, Clone, PartialEq, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct BandPoint {
    day: Day,
    lower: Real,
    upper: Real,
}

impl BandPoint {
    pub fn new(day: Day, lower: Real, upper: Real) -> Self {
        BandPoint { day, lower, upper }
    }
}

/// A daily series of (lower, upper) bounds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Band {
    points: Vec<BandPoint>,
}

impl Band {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: BandPoint) {
        self.points.push(point);
    }

    pub fn get(&self, day: Day) -> Option<BandPoint> {
        self.points
            .binary_search_by_key(&day, |p| p.day)
            .ok()
            .map(|i| self.points[i])
    }

    pub fn points(&self) -> &[BandPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn lower(&self) -> TimeSeries {
        self.points.iter().map(|p| (p.day, p.lower)).collect()
    }

    pub fn upper(&self) -> TimeSeries {
        self.points.iter().map(|p| (p.day, p.upper)).collect()
    }
}
