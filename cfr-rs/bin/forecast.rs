//! Age-stratified CFR and death forecasts from a line list.
//!
//!     forecast LINE_LIST.csv [OBSERVED.csv] [--snapshots SNAPSHOT.csv ...]
//!
//! Reads `conf.toml` from the working directory and writes `cfr.csv`,
//! `forecast.csv` and, when observed deaths are given, `best_guess.csv`.
use cfr::{forecast::ages_by_onset, io, prelude::*};
use log::*;
use simple_logger::SimpleLogger;
use std::fs::File;
use std::path::Path;
use std::process;

struct Args {
    line_list: String,
    observed: Option<String>,
    snapshots: Vec<String>,
}

fn parse_args() -> Option<Args> {
    let mut positional = vec![];
    let mut snapshots = vec![];
    let mut in_snapshots = false;
    for arg in std::env::args().skip(1) {
        if arg == "--snapshots" {
            in_snapshots = true;
        } else if in_snapshots {
            snapshots.push(arg);
        } else {
            positional.push(arg);
        }
    }
    let mut positional = positional.into_iter();
    Some(Args {
        line_list: positional.next()?,
        observed: positional.next(),
        snapshots,
    })
}

fn delay_params(cfg: &Config, args: &Args) -> Result<DelayParams> {
    if cfg.delay.is_some() || args.snapshots.is_empty() {
        return Ok(cfg.delay_params());
    }
    let mut snapshots = vec![];
    for path in &args.snapshots {
        snapshots.push(Snapshot::from_path(path)?);
    }
    let fit = cfg.delay_fitter().fit(&snapshots)?;
    return Ok(fit.params());
}

fn run(args: Args) -> Result<()> {
    let cfg = if Path::new("conf.toml").exists() {
        Config::from_path("conf.toml")?
    } else {
        warn!("conf.toml not found, using defaults");
        Config::default()
    };
    let delay = delay_params(&cfg, &args)?;
    info!("onset-to-death: mean={:.1} shape={:.2}", delay.mean(), delay.shape());

    let snapshot = Snapshot::from_path(&args.line_list)?;
    info!("{} cases in line list of {}", snapshot.len(), snapshot.date());

    // Age-stratified CFR
    let corrector = CensoringCorrector::new(delay)?;
    let mut table = CfrTable::from_records(cfg.brackets.clone(), snapshot.records())?;
    table.compute(&corrector, cfg.windows()?);
    io::write_cfr_table(File::create("cfr.csv")?, &table)?;

    // Forecasts, including one from the CFR just computed
    let mut engine = cfg.forecast_engine(delay.mean())?;
    match table.to_model("line list (this run)") {
        Ok(model) => {
            let mut models = engine.models().clone();
            models.push(model);
            engine = ForecastEngine::new(models, delay.mean(), cfg.forecast_window)?.with_last_day(cfg.last_day);
        }
        Err(e) => warn!("no model derived from the line list: {}", e),
    }
    let forecasts = engine.forecast(&ages_by_onset(snapshot.records()))?;
    for f in &forecasts {
        if let Some((day, value)) = f.series().last() {
            info!("{}: {:.1} deaths on {}", f.label(), value, day);
        }
    }

    let observed = match &args.observed {
        Some(path) => Some(io::read_observed_deaths_path(path, cfg.state.as_deref())?),
        None => None,
    };
    let smoothed = match &observed {
        Some(s) => Some(s.centered_moving_average(cfg.display_window)?),
        None => None,
    };

    let mut columns: Vec<(&str, &TimeSeries)> = forecasts.iter().map(|f| (f.label().as_str(), f.series())).collect();
    if let Some(s) = &smoothed {
        columns.push(("observed", s));
    }
    io::write_series(File::create("forecast.csv")?, &columns)?;

    if let (Some(observed), Some(reference)) = (&observed, forecasts.get(cfg.reference_model)) {
        match cfg.reconciler()?.reconcile(reference.series(), observed, snapshot.date()) {
            Ok(rec) => {
                info!("best guess from {}: ratio {:.3}", reference.label(), rec.ratio());
                io::write_band(File::create("best_guess.csv")?, rec.band())?;
            }
            Err(e) => warn!("no best guess: {}", e),
        }
    }
    Ok(())
}

pub fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("could not start logger: {}", e);
    }
    let args = match parse_args() {
        Some(args) => args,
        None => {
            eprintln!("usage: forecast LINE_LIST.csv [OBSERVED.csv] [--snapshots SNAPSHOT.csv ...]");
            process::exit(2);
        }
    };
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}
