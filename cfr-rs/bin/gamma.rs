//! Fit the onset-to-death delay from line-list snapshots.
//!
//!     gamma data/2020-06-01*.csv data/2020-06-02*.csv ...
//!
//! Snapshot dates are taken from file names. `conf.toml` in the working
//! directory is used when present.
use cfr::prelude::*;
use log::*;
use simple_logger::SimpleLogger;
use std::path::Path;
use std::process;

fn run(paths: &[String]) -> Result<()> {
    let cfg = if Path::new("conf.toml").exists() {
        Config::from_path("conf.toml")?
    } else {
        Config::default()
    };

    let mut snapshots = vec![];
    for path in paths {
        snapshots.push(Snapshot::from_path(path)?);
    }
    let fit = cfg.delay_fitter().fit(&snapshots)?;

    let params = fit.params();
    let stats = fit.stats();
    println!("N = {}", stats.size());
    println!("mean = {:.2}, shape = {:.3}, scale = {:.3}", params.mean(), params.shape(), params.scale());
    println!("sample std = {:.2}, min = {}, max = {}", stats.std(), stats.min(), stats.max());
    for w in fit.warnings() {
        println!("warning: {:?}", w);
    }

    let corrector = CensoringCorrector::new(params)?;
    println!("\ndelay  count  1/F(delay)");
    for (delay, count) in fit.histogram() {
        println!("{:>5}  {:>5}  {:>10.3}", delay, count, corrector.factor(delay));
    }
    Ok(())
}

pub fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("could not start logger: {}", e);
    }
    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.len() < 2 {
        eprintln!("usage: gamma SNAPSHOT.csv SNAPSHOT.csv [...]");
        process::exit(2);
    }
    if let Err(e) = run(&paths) {
        error!("{}", e);
        process::exit(1);
    }
}
