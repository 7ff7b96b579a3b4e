use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Calibration of forecasts against observed deaths.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Band half-width added on the anchor day, as a fraction.
    pub widen: Real,
    /// Daily relaxation of the band toward the raw forecast.
    pub decay: Real,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            widen: 0.05,
            decay: 0.005,
        }
    }
}

/// Run configuration, usually read from a `conf.toml` file.
///
/// ```toml
/// brackets = [[0, 29], [30, 39], [40, 49], [50, 59], [60, 69], [70, 79], [80, 89], [90]]
/// short_window = 7
/// long_window = 28
/// models_path = "cfr_models.toml"
///
/// [delay]
/// mean = 17.5
/// shape = 1.72
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub brackets: AgeBrackets,
    pub short_window: u32,
    pub long_window: u32,
    /// Trailing average applied to every model forecast.
    pub forecast_window: usize,
    /// Centered average applied to observed deaths for display. Must be odd.
    pub display_window: usize,
    /// Onset-to-death delay. When absent it is fitted from snapshots if any
    /// are available, and otherwise takes the default values.
    pub delay: Option<DelayParams>,
    pub min_delay_samples: usize,
    pub last_day: LastDayPolicy,
    /// Index in `models` of the model used for reconciliation.
    pub reference_model: usize,
    pub reconcile: ReconcileConfig,
    /// Value of the `state` column selecting observed deaths.
    pub state: Option<String>,
    /// Extra model file, relative to the configuration file.
    pub models_path: Option<String>,
    pub models: Vec<CfrModel>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            brackets: AgeBrackets::florida(),
            short_window: 7,
            long_window: 28,
            forecast_window: 7,
            display_window: 7,
            delay: None,
            min_delay_samples: crate::delay::MIN_DELAY_SAMPLES,
            last_day: LastDayPolicy::default(),
            reference_model: 0,
            reconcile: ReconcileConfig::default(),
            state: None,
            models_path: None,
            models: vec![],
        }
    }
}

/// A file holding only `[[models]]` tables.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
struct ModelFile {
    models: Vec<CfrModel>,
}

impl FromStr for Config {
    type Err = Error;

    /// Parse and validate a configuration. `models_path` is not followed.
    fn from_str(data: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(data)?;
        cfg.validate()?;
        return Ok(cfg);
    }
}

impl Config {
    /// Read a configuration file. Models from `models_path` come before the
    /// inline ones.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut cfg: Config = toml::from_str(&fs::read_to_string(path)?)?;
        if let Some(models_path) = &cfg.models_path {
            let full = path.parent().unwrap_or_else(|| Path::new(".")).join(models_path);
            let mut models = read_models(full)?;
            models.append(&mut cfg.models);
            cfg.models = models;
        }
        cfg.validate()?;
        return Ok(cfg);
    }

    pub fn validate(&self) -> Result<()> {
        self.windows()?;
        if self.forecast_window == 0 {
            return Err(Error::InvalidWindow("forecast_window must be positive".into()));
        }
        if self.display_window % 2 == 0 {
            return Err(Error::InvalidWindow(format!(
                "display_window must be odd, got {}",
                self.display_window
            )));
        }
        if let Some(delay) = &self.delay {
            delay.validate()?;
        }
        for m in &self.models {
            m.validate()?;
        }
        if !self.models.is_empty() && self.reference_model >= self.models.len() {
            return Err(Error::InvalidParams(format!(
                "reference_model {} out of {} models",
                self.reference_model,
                self.models.len()
            )));
        }
        self.reconciler().map(|_| ())
    }

    pub fn windows(&self) -> Result<CfrWindows> {
        CfrWindows::new(self.short_window, self.long_window)
    }

    pub fn delay_params(&self) -> DelayParams {
        self.delay.unwrap_or_default()
    }

    pub fn delay_fitter(&self) -> DelayFitter {
        DelayFitter::new(self.min_delay_samples)
    }

    pub fn reconciler(&self) -> Result<Reconciler> {
        Reconciler::new(self.reconcile.widen, self.reconcile.decay)
    }

    /// Forecast engine over all configured models.
    pub fn forecast_engine(&self, mean_delay: Real) -> Result<ForecastEngine> {
        Ok(ForecastEngine::new(self.models.clone(), mean_delay, self.forecast_window)?.with_last_day(self.last_day))
    }

    pub fn reference_model(&self) -> Option<&CfrModel> {
        self.models.get(self.reference_model)
    }
}

/// Read the `[[models]]` tables of a TOML file.
pub fn read_models<P: AsRef<Path>>(path: P) -> Result<Vec<CfrModel>> {
    let data = fs::read_to_string(path)?;
    let file: ModelFile = toml::from_str(&data)?;
    for m in &file.models {
        m.validate()?;
    }
    return Ok(file.models);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIPPED_MODELS: &str = include_str!("../conf/cfr_models.toml");

    #[test]
    fn empty_config_is_default() {
        let cfg: Config = "".parse().unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.brackets.len(), 8);
        assert_eq!(cfg.delay, None);
        assert_eq!(cfg.delay_params(), DelayParams::default());
    }

    #[test]
    fn partial_config() {
        let cfg: Config = r#"
            brackets = [[0, 49], [50]]
            short_window = 3
            last_day = "drop"

            [reconcile]
            decay = 0.01

            [[models]]
            label = "flat"
            average_cfr = 0.02
            brackets = [[0]]
            cfr = [0.02]
            "#
        .parse()
        .unwrap();
        assert_eq!(cfg.brackets.len(), 2);
        assert_eq!(cfg.windows().unwrap().short(), 3);
        assert_eq!(cfg.windows().unwrap().long(), 28);
        assert_eq!(cfg.last_day, LastDayPolicy::Drop);
        assert_eq!(cfg.reconcile.widen, 0.05);
        assert_eq!(cfg.reconcile.decay, 0.01);
        assert_eq!(cfg.reference_model().unwrap().label(), "flat");
    }

    #[test]
    fn rejects_bad_config() {
        assert!(matches!(Config::from_str("short_window = 30"), Err(Error::InvalidWindow(_))));
        assert!(matches!(Config::from_str("display_window = 4"), Err(Error::InvalidWindow(_))));
        assert!(matches!(Config::from_str("brackets = [[0, 9], [20]]"), Err(Error::Toml(_))));
        assert!(Config::from_str("[delay]\nmean = 10.0\nshape = -1.0").is_err());
        let missing_reference = r#"
            reference_model = 1
            [[models]]
            label = "flat"
            average_cfr = 0.02
            brackets = [[0]]
            cfr = [0.02]
        "#;
        assert!(matches!(Config::from_str(missing_reference), Err(Error::InvalidParams(_))));
    }

    #[test]
    fn shipped_models_are_valid() {
        let file: ModelFile = toml::from_str(SHIPPED_MODELS).unwrap();
        assert_eq!(file.models.len(), 5);
        for m in &file.models {
            m.validate().unwrap();
            assert!(m.cfr_for_age(Some(100.0)).is_ok());
        }
        let iss = file.models.iter().find(|m| m.label().contains("ISS")).unwrap();
        assert_eq!(iss.cfr_for_age(Some(85.0)).unwrap(), 0.246);
    }

    #[test]
    fn shipped_config_loads_models_file() {
        let cfg = Config::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/conf/conf.toml")).unwrap();
        assert_eq!(cfg.models.len(), 5);
        assert_eq!(cfg.reference_model().unwrap().label(), "ISS (Italy)");
        let engine = cfg.forecast_engine(cfg.delay_params().mean()).unwrap();
        assert_eq!(engine.models().len(), 5);
        assert_eq!(engine.last_day(), LastDayPolicy::FloorToPrevious);
    }
}
