use pyo3::{prelude::*, wrap_pyfunction};

extern crate pyo3;
use cfr::io::parse_day;
use cfr::prelude as rs;
use cfr::prelude::{Age, Day, Real};
use paste::paste;
use pyo3::exceptions::*;
use pythonize::{depythonize, pythonize};
use std::collections::BTreeMap;
use std::convert::TryFrom;

type Points = Vec<(String, Real)>;

fn value_error(e: rs::Error) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn day(s: &str) -> PyResult<Day> {
    parse_day(s).map_err(value_error)
}

fn to_points(series: &rs::TimeSeries) -> Points {
    series.iter().map(|(d, v)| (d.to_string(), *v)).collect()
}

fn from_points(points: Points) -> PyResult<rs::TimeSeries> {
    let mut series = rs::TimeSeries::new();
    for (d, v) in points {
        series.insert(day(&d)?, v);
    }
    Ok(series)
}

macro_rules! py_immutable_props {
    ($name:ident { $($x:ident : $t:ident),*}) => {
        paste! {
            #[pymethods]
            impl $name {
                $(
                    #[getter]
                    pub fn [<get_ $x>](&self) -> PyResult<$t> {
                        Ok(self.data.$x())
                    }
                )*
            }
        }
    };
}

/// Gamma onset-to-death delay.
#[pyclass]
#[derive(Debug)]
pub struct Delay {
    data: rs::DelayParams,
    corrector: rs::CensoringCorrector,
}

impl Delay {
    fn from_params(data: rs::DelayParams) -> PyResult<Self> {
        let corrector = rs::CensoringCorrector::new(data).map_err(value_error)?;
        Ok(Delay { data, corrector })
    }
}

#[pymethods]
impl Delay {
    #[new]
    #[args(mean = "17.5", shape = "1.72")]
    fn new(mean: Real, shape: Real) -> PyResult<Self> {
        Delay::from_params(rs::DelayParams::new(mean, shape).map_err(value_error)?)
    }

    /// Censoring correction for a cohort with onset `days` days ago.
    fn factor(&self, days: u32) -> Real {
        self.corrector.factor(days)
    }

    fn __repr__(&self) -> PyResult<String> {
        Ok(format!("Delay(mean={}, shape={})", self.data.mean(), self.data.shape()))
    }
}

py_immutable_props!(Delay {
    mean: Real,
    shape: Real,
    scale: Real
});

#[pyclass]
#[derive(Debug)]
pub struct DelayFit {
    data: rs::DelayFit,
}

#[pymethods]
impl DelayFit {
    #[getter]
    fn params(&self) -> PyResult<Delay> {
        Delay::from_params(self.data.params())
    }

    #[getter]
    fn samples(&self) -> Vec<u32> {
        self.data.samples().clone()
    }

    #[getter]
    fn warnings(&self) -> Vec<String> {
        self.data.warnings().iter().map(|w| format!("{:?}", w)).collect()
    }

    fn histogram(&self) -> Vec<(u32, usize)> {
        self.data.histogram()
    }

    fn __repr__(&self) -> PyResult<String> {
        let p = self.data.params();
        Ok(format!(
            "DelayFit(mean={}, shape={}, n={})",
            p.mean(),
            p.shape(),
            self.data.samples().len()
        ))
    }
}

py_immutable_props!(DelayFit {
    is_low_confidence: bool
});

/// Fit the onset-to-death delay from `[(date, records), ...]` snapshots, where
/// records are dicts with `age`, `onset`, `report` and `died` keys.
#[pyfunction(min_samples = "5")]
fn fit_delay(snapshots: Vec<(String, &PyAny)>, min_samples: usize) -> PyResult<DelayFit> {
    let mut data = vec![];
    for (date, records) in snapshots {
        let records: Vec<rs::CaseRecord> = depythonize(records)?;
        data.push(rs::Snapshot::new(day(&date)?, records));
    }
    let fit = rs::DelayFitter::new(min_samples).fit(&data).map_err(value_error)?;
    Ok(DelayFit { data: fit })
}

#[pyfunction(mean = "17.5", shape = "1.72")]
fn censoring_factor(days: u32, mean: Real, shape: Real) -> PyResult<Real> {
    Ok(Delay::new(mean, shape)?.factor(days))
}

/// CFR series per bracket: `{bracket: {"raw" | "adjusted" | "adjusted_long": [(date, cfr)]}}`.
/// The all-ages series is under the "all" key.
#[pyfunction(brackets = "None", short_window = "7", long_window = "28", mean = "17.5", shape = "1.72")]
fn stratified_cfr(
    py: Python,
    records: &PyAny,
    brackets: Option<Vec<Vec<u32>>>,
    short_window: u32,
    long_window: u32,
    mean: Real,
    shape: Real,
) -> PyResult<PyObject> {
    let records: Vec<rs::CaseRecord> = depythonize(records)?;
    let brackets = match brackets {
        Some(b) => {
            let mut parsed = vec![];
            for v in b {
                parsed.push(rs::AgeBracket::try_from(v).map_err(PyValueError::new_err)?);
            }
            rs::AgeBrackets::new(parsed).map_err(value_error)?
        }
        None => rs::AgeBrackets::florida(),
    };
    let corrector = rs::CensoringCorrector::new(rs::DelayParams::new(mean, shape).map_err(value_error)?)
        .map_err(value_error)?;
    let windows = rs::CfrWindows::new(short_window, long_window).map_err(value_error)?;

    let mut table = rs::CfrTable::from_records(brackets, &records).map_err(value_error)?;
    table.compute(&corrector, windows);

    let kinds = |slot: usize| -> BTreeMap<&'static str, Points> {
        rs::CfrKind::ALL
            .iter()
            .map(|&k| (k.name(), to_points(&table.series(slot, k))))
            .collect()
    };
    let mut out = BTreeMap::new();
    for (i, b) in table.brackets().iter().enumerate() {
        out.insert(b.to_string(), kinds(i));
    }
    out.insert("all".to_string(), kinds(table.brackets().len()));
    Ok(pythonize(py, &out)?)
}

/// Forecast daily deaths from `{date: [age or None, ...]}` for each model dict
/// (`label`, `average_cfr`, `brackets`, `cfr`). Returns `{label: [(date, deaths)]}`.
#[pyfunction(mean_delay = "17.5", window = "7", last_day = "\"floor_to_previous\"")]
fn forecast_deaths(
    py: Python,
    daily_ages: BTreeMap<String, Vec<Option<Age>>>,
    models: &PyAny,
    mean_delay: Real,
    window: usize,
    last_day: &str,
) -> PyResult<PyObject> {
    let models: Vec<rs::CfrModel> = depythonize(models)?;
    let policy = match last_day {
        "keep" => rs::LastDayPolicy::Keep,
        "floor_to_previous" => rs::LastDayPolicy::FloorToPrevious,
        "drop" => rs::LastDayPolicy::Drop,
        other => return Err(PyValueError::new_err(format!("unknown last_day policy '{}'", other))),
    };
    let engine = rs::ForecastEngine::new(models, mean_delay, window)
        .map_err(value_error)?
        .with_last_day(policy);

    let mut ages = BTreeMap::new();
    for (d, a) in daily_ages {
        ages.insert(day(&d)?, a);
    }
    let forecasts = engine.forecast(&ages).map_err(value_error)?;
    let out: BTreeMap<String, Points> = forecasts
        .iter()
        .map(|f| (f.label().clone(), to_points(f.series())))
        .collect();
    Ok(pythonize(py, &out)?)
}

/// Calibrate a reference forecast against observed deaths. Returns the ratio
/// and the `(date, lower, upper)` band.
#[pyfunction(widen = "0.05", decay = "0.005")]
fn reconcile(
    reference: Points,
    observed: Points,
    as_of: &str,
    widen: Real,
    decay: Real,
) -> PyResult<(Real, Vec<(String, Real, Real)>)> {
    let reconciler = rs::Reconciler::new(widen, decay).map_err(value_error)?;
    let rec = reconciler
        .reconcile(&from_points(reference)?, &from_points(observed)?, day(as_of)?)
        .map_err(value_error)?;
    let band = rec
        .band()
        .points()
        .iter()
        .map(|p| (p.day().to_string(), p.lower(), p.upper()))
        .collect();
    Ok((rec.ratio(), band))
}

#[pyfunction]
fn moving_average(values: Vec<Real>, n: usize) -> PyResult<Vec<Real>> {
    rs::moving_average(&values, n).map_err(value_error)
}

#[pyfunction]
fn centered_moving_average(values: Vec<Real>, n: usize) -> PyResult<Vec<Real>> {
    rs::centered_moving_average(&values, n).map_err(value_error)
}

#[pymodule]
fn epicfr(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Delay>()?;
    m.add_class::<DelayFit>()?;
    m.add_function(wrap_pyfunction!(fit_delay, m)?)?;
    m.add_function(wrap_pyfunction!(censoring_factor, m)?)?;
    m.add_function(wrap_pyfunction!(stratified_cfr, m)?)?;
    m.add_function(wrap_pyfunction!(forecast_deaths, m)?)?;
    m.add_function(wrap_pyfunction!(reconcile, m)?)?;
    m.add_function(wrap_pyfunction!(moving_average, m)?)?;
    m.add_function(wrap_pyfunction!(centered_moving_average, m)?)?;

    Ok(())
}
