//! Estimation and forecasting of COVID-19 mortality from case line lists.
//!
//! The crate fits the onset-to-death delay distribution from repeated line
//! list snapshots, computes age-stratified case fatality ratios corrected for
//! right censoring, forecasts daily deaths from age-stratified CFR models and
//! reconciles those forecasts against observed deaths.
pub mod brackets;
pub mod censoring;
pub mod cfr;
pub mod config;
pub mod delay;
pub mod error;
pub mod forecast;
pub mod gamma;
pub mod io;
pub mod prelude;
pub mod reconcile;
pub mod records;
pub mod series;
pub mod utils;

pub use crate::error::{Error, Result};

/// Base Real type used by this crate. Uses an alias to easily change precision
/// if necessary.
pub type Real = f64;
pub(crate) const INF: Real = Real::INFINITY;
pub(crate) const NAN: Real = Real::NAN;

/// Age of a case, in years. Line lists occasionally omit it, hence the
/// surrounding `Option` wherever a case age is stored.
pub type Age = Real;

/// Calendar day. All time series in this crate have daily resolution.
pub type Day = chrono::NaiveDate;
