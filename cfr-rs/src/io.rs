//! Reading line lists and observed deaths from CSV, and writing results back.
//!
//! Line lists follow the layout of the Florida Department of Health case line
//! data; observed deaths follow the New York Times `us-states.csv` layout.
use crate::prelude::*;
use log::*;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Deserialize, Debug)]
struct LineListRow {
    #[serde(rename = "County", default)]
    county: String,
    #[serde(rename = "Age", default)]
    age: String,
    #[serde(rename = "Gender", default)]
    gender: String,
    #[serde(rename = "Jurisdiction", default)]
    jurisdiction: String,
    #[serde(rename = "EventDate")]
    event_date: String,
    #[serde(rename = "ChartDate")]
    chart_date: String,
    #[serde(rename = "Died", default)]
    died: String,
}

impl LineListRow {
    fn into_record(self) -> Result<CaseRecord> {
        let age = self.age.trim().parse::<Age>().ok().filter(|a| a.is_finite() && *a >= 0.0);
        let died = self.died.trim().eq_ignore_ascii_case("yes");
        let record = CaseRecord::new(age, parse_day(&self.event_date)?, parse_day(&self.chart_date)?, died)
            .with_locality(&self.county, &self.gender, &self.jurisdiction);
        return Ok(record);
    }
}

#[derive(Deserialize, Debug)]
struct ObservedRow {
    date: String,
    #[serde(default)]
    state: String,
    deaths: Real,
}

/// Parse the date part of a timestamp such as `2020/04/21 05:00:00+00`.
pub fn parse_day(s: &str) -> Result<Day> {
    let date = s.trim().split(' ').next().unwrap_or("");
    match Day::parse_from_str(date, "%Y/%m/%d") {
        Ok(day) => Ok(day),
        Err(_) => Ok(Day::parse_from_str(date, "%Y-%m-%d")?),
    }
}

/// Read line-list rows. Unparseable or missing ages become unknown ages.
pub fn read_line_list<R: std::io::Read>(reader: R) -> Result<Vec<CaseRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = vec![];
    for row in reader.deserialize() {
        let row: LineListRow = row?;
        records.push(row.into_record()?);
    }
    return Ok(records);
}

pub fn read_line_list_path<P: AsRef<Path>>(path: P) -> Result<Vec<CaseRecord>> {
    read_line_list(std::fs::File::open(path)?)
}

impl Snapshot {
    /// Load a line list whose file name starts with its download date, as in
    /// `2020-06-28-12-00-00.csv`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
        let path = path.as_ref();
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let date = Day::parse_from_str(name.get(..10).unwrap_or(name), "%Y-%m-%d")?;
        let records = read_line_list_path(path)?;
        debug!("snapshot {}: {} records from {}", date, records.len(), path.display());
        return Ok(Snapshot::new(date, records));
    }
}

/// Read cumulative deaths and return daily deaths. When `state` is given,
/// only rows of that state are used; otherwise the file must hold a single
/// state.
pub fn read_observed_deaths<R: std::io::Read>(reader: R, state: Option<&str>) -> Result<TimeSeries> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut cumulative = TimeSeries::new();
    let mut seen = BTreeSet::new();
    for row in reader.deserialize() {
        let row: ObservedRow = row?;
        match state {
            Some(s) if s != row.state => continue,
            Some(_) => {}
            None => {
                if seen.insert(row.state.clone()) && seen.len() > 1 {
                    let names: Vec<&str> = seen.iter().map(|s| s.as_str()).collect();
                    return Err(Error::InvalidParams(format!(
                        "observed deaths hold several states ({}), set `state` to pick one",
                        names.join(", ")
                    )));
                }
            }
        }
        cumulative.insert(parse_day(&row.date)?, row.deaths);
    }
    return Ok(cumulative.differences());
}

pub fn read_observed_deaths_path<P: AsRef<Path>>(path: P, state: Option<&str>) -> Result<TimeSeries> {
    read_observed_deaths(std::fs::File::open(path)?, state)
}

/// Write named series side by side, one row per day present in any of them.
/// Days missing from a series are left empty.
pub fn write_series<W: std::io::Write>(writer: W, columns: &[(&str, &TimeSeries)]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["date"];
    header.extend(columns.iter().map(|c| c.0));
    wtr.write_record(&header)?;

    let days: BTreeSet<Day> = columns.iter().flat_map(|c| c.1.days()).collect();
    for day in days {
        let mut row = vec![day.to_string()];
        for (_, series) in columns {
            row.push(series.get(day).map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_band<W: std::io::Write>(writer: W, band: &Band) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&["date", "lower", "upper"])?;
    for p in band.points() {
        wtr.write_record(&[p.day().to_string(), p.lower().to_string(), p.upper().to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// One column per bracket and CFR variant, plus the all-ages columns.
pub fn write_cfr_table<W: std::io::Write>(writer: W, table: &CfrTable) -> Result<()> {
    let mut names = vec![];
    let mut series = vec![];
    for (i, bracket) in table.brackets().iter().enumerate() {
        for &kind in CfrKind::ALL.iter() {
            names.push(format!("{}_{}", bracket, kind.name()));
            series.push(table.series(i, kind));
        }
    }
    for &kind in CfrKind::ALL.iter() {
        names.push(format!("all_{}", kind.name()));
        series.push(table.overall_series(kind));
    }
    let columns: Vec<(&str, &TimeSeries)> = names.iter().map(|n| n.as_str()).zip(series.iter()).collect();
    write_series(writer, &columns)
}
