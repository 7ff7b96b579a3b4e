use crate::{Age, Day, Real};
use thiserror::Error;

/// Errors raised by the estimation and forecasting pipeline.
///
/// Configuration-shape errors (`BracketNotFound`, `InvalidBrackets`,
/// `InvalidWindow`, `InvalidParams`) signal a setup bug and should abort the
/// whole run. `NoObservationAtTarget`, `NegativeObservation` and
/// `ReferenceUnavailable` only affect the reconciliation call that raised them.
#[derive(Error, Debug)]
pub enum Error {
    /// Not enough snapshots or samples to fit anything.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A configured bracket set does not cover an observed age.
    #[error("no age bracket covers age {age} in {context}")]
    BracketNotFound { age: Age, context: String },

    /// Brackets overlap, leave gaps or are otherwise malformed.
    #[error("invalid age brackets: {0}")]
    InvalidBrackets(String),

    /// Smoothing or averaging window misconfiguration.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// Distribution or model parameters out of their admissible range.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Observed series has no value at the reconciliation day.
    #[error("no observed value at {0}")]
    NoObservationAtTarget(Day),

    /// Observed deaths at the reconciliation day are negative or not a number,
    /// as happens when a cumulative total is revised downwards.
    #[error("observed deaths at {day} are {value}, cannot calibrate against them")]
    NegativeObservation { day: Day, value: Real },

    /// Reference forecast is missing or zero at the reconciliation day.
    #[error("reference forecast unavailable at {0}")]
    ReferenceUnavailable(Day),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("bad date: {0}")]
    Date(#[from] chrono::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
