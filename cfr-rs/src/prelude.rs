pub use crate::brackets::{AgeBracket, AgeBrackets};
pub use crate::censoring::CensoringCorrector;
pub use crate::cfr::{BracketCounters, CfrKind, CfrTable, CfrWindows};
pub use crate::config::{Config, ReconcileConfig};
pub use crate::delay::{DelayFit, DelayFitter, DelayParams, FitWarning};
pub use crate::error::{Error, Result};
pub use crate::forecast::{CfrModel, Forecast, ForecastEngine, LastDayPolicy};
pub use crate::gamma::Gamma;
pub use crate::reconcile::{Reconciler, Reconciliation};
pub use crate::records::{known_age, CaseKey, CaseRecord, Snapshot};
pub use crate::series::{Band, BandPoint, TimeSeries};
pub use crate::utils::{centered_moving_average, moving_average, PointStats, PointStatsAcc, Stats, Window};
pub use crate::{Age, Day, Real};
