//! Sweep reports.
//!
//! A [`Report`] echoes the run configuration and holds one [`DataPoint`] per
//! worker count. It renders in two formats:
//!
//! - **text**: a Python dict literal, one point per line, so a report can be
//!   `eval`ed by plotting scripts. Writable piecewise (header, points,
//!   footer) to stream points as the sweep produces them.
//! - **json**: the same content through `serde_json`.
//!
//! The columns of each point depend on the [`ReportMode`].

use std::fmt as StdFmt;
use std::io::{self, Write};
use std::str::FromStr;

use serde::Serialize;

use crate::config::RunConfig;
use crate::stats::Stats;

// ============================================================================
//  DataPoint
// ============================================================================

/// Trimmed totals measured at one worker count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPoint {
    /// Active workers.
    pub num_workers: usize,
    /// Sum of the kept chunk totals.
    pub totals: Stats,
}

impl DataPoint {
    /// New point.
    #[must_use]
    pub const fn new(num_workers: usize, totals: Stats) -> Self {
        Self {
            num_workers,
            totals,
        }
    }
}

// ============================================================================
//  ReportMode
// ============================================================================

/// Which columns each point carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportMode {
    /// `(workers, ops, seconds)`.
    #[default]
    Throughput,
    /// `(workers, mean insert µs, mean remove µs)`.
    Latency,
    /// All counters plus achieved ratios.
    Detailed,
}

impl ReportMode {
    /// Column labels.
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Throughput => &["numThreads", "mapOpsDone", "totalTime"],
            Self::Latency => &["numThreads", "insertMicros", "removeMicros"],
            Self::Detailed => &[
                "numThreads",
                "mapOpsDone",
                "mapReadsDone",
                "mapWritesDone",
                "mapInsertsDone",
                "mapRemovesDone",
                "I:R ratio",
                "R:W ratio",
            ],
        }
    }

    /// Columns of `point` in this mode.
    #[must_use]
    pub fn row(self, point: &DataPoint) -> Vec<Cell> {
        let t = &point.totals;
        let workers = Cell::Count(point.num_workers as u64);
        match self {
            Self::Throughput => vec![
                workers,
                Cell::Count(t.ops_done),
                Cell::Real(t.duration.as_secs_f64()),
            ],
            Self::Latency => vec![
                workers,
                Cell::Real(micros(t.mean_insert_time())),
                Cell::Real(micros(t.mean_remove_time())),
            ],
            Self::Detailed => vec![
                workers,
                Cell::Count(t.ops_done),
                Cell::Count(t.reads_done),
                Cell::Count(t.writes_done),
                Cell::Count(t.inserts_done),
                Cell::Count(t.removes_done),
                Cell::Real(t.insert_remove_ratio()),
                Cell::Real(t.read_write_ratio()),
            ],
        }
    }

    /// Name accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Throughput => "throughput",
            Self::Latency => "latency",
            Self::Detailed => "detailed",
        }
    }
}

fn micros(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1e6
}

impl StdFmt::Display for ReportMode {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "throughput" => Ok(Self::Throughput),
            "latency" => Ok(Self::Latency),
            "detailed" => Ok(Self::Detailed),
            other => Err(format!(
                "unknown report mode '{other}' (expected throughput, latency or detailed)"
            )),
        }
    }
}

/// One column value of a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// Integer count.
    Count(u64),
    /// Seconds, microseconds or a ratio.
    Real(f64),
}

impl StdFmt::Display for Cell {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Real(x) => write!(f, "{x:.6}"),
        }
    }
}

// ============================================================================
//  Report
// ============================================================================

/// Output of one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// Adapter name.
    pub map_type: String,
    /// Keys pre-populated across all worker ranges.
    pub population: usize,
    /// Configuration the sweep ran with.
    pub config: RunConfig,
    /// One point per worker count, ascending.
    pub points: Vec<DataPoint>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView<'a> {
    map_type: &'a str,
    population: usize,
    reads_per_write: usize,
    writes_per_read: usize,
    inserts_per_remove: usize,
    removes_per_insert: usize,
    iters_per_chunk: usize,
    chunks: usize,
    keep_chunk_fraction: f64,
    labels: &'static [&'static str],
    points: Vec<Vec<Cell>>,
}

impl Report {
    /// Report with no points yet.
    #[must_use]
    pub fn new(map_type: impl Into<String>, population: usize, config: RunConfig) -> Self {
        Self {
            map_type: map_type.into(),
            population,
            config,
            points: Vec::new(),
        }
    }

    /// Write everything up to and including the opening of the point list.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `out`.
    pub fn write_text_header<W: Write>(&self, mode: ReportMode, out: &mut W) -> io::Result<()> {
        let c = &self.config;
        writeln!(out, "{{")?;
        writeln!(out, "'mapType': '{}',", self.map_type)?;
        writeln!(out, "'population': {},", self.population)?;
        writeln!(out, "'readsPerWrite': {},", c.reads_per_write)?;
        writeln!(out, "'writesPerRead': {},", c.writes_per_read)?;
        writeln!(out, "'insertsPerRemove': {},", c.inserts_per_remove)?;
        writeln!(out, "'removesPerInsert': {},", c.removes_per_insert)?;
        writeln!(out, "'itersPerChunk': {},", c.iters_per_chunk)?;
        writeln!(out, "'chunks': {},", c.chunks)?;
        writeln!(out, "'keepChunkFraction': {:.6},", c.keep_chunk_fraction)?;

        let labels: Vec<String> = mode.labels().iter().map(|l| format!("'{l}'")).collect();
        writeln!(out, "'labels': ({}),", labels.join(", "))?;
        writeln!(out, "'points': [")
    }

    /// Write one point line.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `out`.
    pub fn write_text_point<W: Write>(
        mode: ReportMode,
        point: &DataPoint,
        out: &mut W,
    ) -> io::Result<()> {
        let cells: Vec<String> = mode.row(point).iter().map(ToString::to_string).collect();
        writeln!(out, "    ({}),", cells.join(", "))
    }

    /// Close the point list and the dict.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `out`.
    pub fn write_text_footer<W: Write>(out: &mut W) -> io::Result<()> {
        writeln!(out, "],")?;
        writeln!(out, "}}")
    }

    /// Write the whole report as text.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `out`.
    pub fn write_text<W: Write>(&self, mode: ReportMode, out: &mut W) -> io::Result<()> {
        self.write_text_header(mode, out)?;
        for point in &self.points {
            Self::write_text_point(mode, point, out)?;
        }
        Self::write_text_footer(out)
    }

    /// Whole report as a text string.
    #[must_use]
    pub fn to_text(&self, mode: ReportMode) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_text(mode, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Whole report as pretty-printed JSON.
    ///
    /// Non-finite ratios (nothing removed or written) become `null`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which only happens on a broken writer.
    pub fn write_json<W: Write>(&self, mode: ReportMode, out: &mut W) -> serde_json::Result<()> {
        let c = &self.config;
        let view = ReportView {
            map_type: &self.map_type,
            population: self.population,
            reads_per_write: c.reads_per_write,
            writes_per_read: c.writes_per_read,
            inserts_per_remove: c.inserts_per_remove,
            removes_per_insert: c.removes_per_insert,
            iters_per_chunk: c.iters_per_chunk,
            chunks: c.chunks,
            keep_chunk_fraction: c.keep_chunk_fraction,
            labels: mode.labels(),
            points: self.points.iter().map(|p| mode.row(p)).collect(),
        };
        serde_json::to_writer_pretty(&mut *out, &view)?;
        writeln!(out).map_err(serde_json::Error::io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Report {
        let mut report = Report::new("dashmap", 4000, RunConfig::default());
        for workers in 1..=2_u64 {
            report.points.push(DataPoint::new(
                workers as usize,
                Stats {
                    ops_done: 1000 * workers,
                    reads_done: 800 * workers,
                    writes_done: 200 * workers,
                    inserts_done: 100 * workers,
                    removes_done: 100 * workers,
                    duration: Duration::from_millis(250),
                    total_insert_time: Duration::from_micros(300 * workers),
                    total_remove_time: Duration::from_micros(100 * workers),
                },
            ));
        }
        report
    }

    #[test]
    fn text_throughput_layout() {
        let text = sample().to_text(ReportMode::Throughput);
        let expected = "\
{
'mapType': 'dashmap',
'population': 4000,
'readsPerWrite': 4,
'writesPerRead': 1,
'insertsPerRemove': 1,
'removesPerInsert': 1,
'itersPerChunk': 10000,
'chunks': 200,
'keepChunkFraction': 1.000000,
'labels': ('numThreads', 'mapOpsDone', 'totalTime'),
'points': [
    (1, 1000, 0.250000),
    (2, 2000, 0.250000),
],
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn text_latency_in_micros() {
        let text = sample().to_text(ReportMode::Latency);
        assert!(text.contains("    (1, 3.000000, 1.000000),"));
        assert!(text.contains("'labels': ('numThreads', 'insertMicros', 'removeMicros'),"));
    }

    #[test]
    fn text_detailed_has_ratios() {
        let text = sample().to_text(ReportMode::Detailed);
        assert!(text.contains("    (2, 2000, 1600, 400, 200, 200, 1.000000, 4.000000),"));
    }

    #[test]
    fn json_round_trips_through_value() {
        let mut buf = Vec::new();
        sample()
            .write_json(ReportMode::Throughput, &mut buf)
            .expect("json");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("parse");

        assert_eq!(value["mapType"], "dashmap");
        assert_eq!(value["population"], 4000);
        assert_eq!(value["labels"][1], "mapOpsDone");
        assert_eq!(value["points"][1][1], 2000);
        assert_eq!(value["points"][0][2], 0.25);
    }

    #[test]
    fn json_nulls_infinite_ratio() {
        let mut report = Report::new("locked", 0, RunConfig::default());
        report.points.push(DataPoint::new(
            1,
            Stats {
                ops_done: 10,
                reads_done: 10,
                ..Stats::default()
            },
        ));
        let mut buf = Vec::new();
        report.write_json(ReportMode::Detailed, &mut buf).expect("json");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("parse");
        assert!(value["points"][0][7].is_null());
    }

    #[test]
    fn mode_parse() {
        assert_eq!("Latency".parse::<ReportMode>(), Ok(ReportMode::Latency));
        assert!("fast".parse::<ReportMode>().is_err());
        assert_eq!(ReportMode::default().to_string(), "throughput");
    }
}
