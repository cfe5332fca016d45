//! Ratio matrix runner.
//!
//! Runs one sweep per (read:write, insert:remove) preset pair and writes
//! each text report to `<out_dir>/<map>/results_<rw>_<ir>.txt`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::{HarnessError, Result};
use crate::map::{AdapterVisitor, MapAdapter, MapKind};
use crate::report::ReportMode;
use crate::sweep::Sweep;
use crate::sync::BarrierKind;
use crate::tracing_helpers::info_log;

/// Read:write mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RwPreset {
    /// File-name tag.
    pub name: &'static str,
    /// Lookups per read phase.
    pub reads_per_write: usize,
    /// Writes per iteration.
    pub writes_per_read: usize,
}

/// Insert:remove mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrPreset {
    /// File-name tag.
    pub name: &'static str,
    /// Insert weight.
    pub inserts_per_remove: usize,
    /// Remove weight.
    pub removes_per_insert: usize,
}

/// Read:write presets, write-only to read-only.
pub const RW_PRESETS: [RwPreset; 5] = [
    rw("0R_100W", 0, 1),
    rw("20R_80W", 1, 4),
    rw("50R_50W", 1, 1),
    rw("80R_20W", 4, 1),
    rw("100R_0W", 1, 0),
];

/// Insert:remove presets, balanced to insert-only.
pub const IR_PRESETS: [IrPreset; 3] = [
    ir("50I_50R", 1, 1),
    ir("80I_20R", 4, 1),
    ir("100I_0R", 1, 0),
];

const fn rw(name: &'static str, reads_per_write: usize, writes_per_read: usize) -> RwPreset {
    RwPreset {
        name,
        reads_per_write,
        writes_per_read,
    }
}

const fn ir(name: &'static str, inserts_per_remove: usize, removes_per_insert: usize) -> IrPreset {
    IrPreset {
        name,
        inserts_per_remove,
        removes_per_insert,
    }
}

/// One preset pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixCell {
    /// Read:write preset.
    pub rw: RwPreset,
    /// Insert:remove preset.
    pub ir: IrPreset,
}

impl MatrixCell {
    /// `base` with this cell's ratios.
    #[must_use]
    pub fn apply(&self, base: &RunConfig) -> RunConfig {
        RunConfig {
            reads_per_write: self.rw.reads_per_write,
            writes_per_read: self.rw.writes_per_read,
            inserts_per_remove: self.ir.inserts_per_remove,
            removes_per_insert: self.ir.removes_per_insert,
            ..*base
        }
    }

    /// Report file name.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("results_{}_{}.txt", self.rw.name, self.ir.name)
    }
}

/// All preset pairs, read:write major.
pub fn cells() -> impl Iterator<Item = MatrixCell> {
    RW_PRESETS
        .into_iter()
        .flat_map(|rw| IR_PRESETS.into_iter().map(move |ir| MatrixCell { rw, ir }))
}

/// Runs the preset matrix for one or more maps.
#[derive(Debug, Clone)]
pub struct MatrixRunner {
    base: RunConfig,
    out_dir: PathBuf,
    max_workers: Option<usize>,
    barrier: BarrierKind,
    mode: ReportMode,
}

impl MatrixRunner {
    /// Runner writing under `out_dir`; ratios in `base` are overridden per cell.
    #[must_use]
    pub fn new(base: RunConfig, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            base,
            out_dir: out_dir.into(),
            max_workers: None,
            barrier: BarrierKind::default(),
            mode: ReportMode::default(),
        }
    }

    /// Cap worker capacity (default: physical cores).
    #[must_use]
    pub const fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Start barrier for every sweep.
    #[must_use]
    pub const fn barrier(mut self, barrier: BarrierKind) -> Self {
        self.barrier = barrier;
        self
    }

    /// Report columns.
    #[must_use]
    pub const fn mode(mut self, mode: ReportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the whole matrix for `kind`; returns the files written.
    ///
    /// # Errors
    ///
    /// See [`MatrixRunner::run`].
    pub fn run_kind(&self, kind: MapKind) -> Result<Vec<PathBuf>> {
        kind.visit(self)
    }

    /// Run the whole matrix for `adapter`; returns the files written.
    ///
    /// # Errors
    ///
    /// Sweep errors, or [`HarnessError::Output`] if a directory or report
    /// file cannot be written.
    pub fn run<A: MapAdapter + Clone>(&self, adapter: A) -> Result<Vec<PathBuf>> {
        let dir = self.out_dir.join(adapter.name());
        fs::create_dir_all(&dir).map_err(|source| HarnessError::Output {
            path: dir.clone(),
            source,
        })?;

        let mut written = Vec::new();
        for cell in cells() {
            let config = cell.apply(&self.base);
            let mut sweep = Sweep::new(adapter.clone(), config).barrier(self.barrier);
            if let Some(max) = self.max_workers {
                sweep = sweep.max_workers(max);
            }

            info_log!(
                map = adapter.name(),
                rw = cell.rw.name,
                ir = cell.ir.name,
                "matrix cell"
            );
            let report = sweep.run()?;

            let path = dir.join(cell.file_name());
            write_report(&path, |out| report.write_text(self.mode, out))?;
            written.push(path);
        }
        Ok(written)
    }
}

impl AdapterVisitor for &MatrixRunner {
    type Output = Result<Vec<PathBuf>>;

    fn visit<A: MapAdapter + Clone>(self, adapter: A) -> Self::Output {
        self.run(adapter)
    }
}

fn write_report<F>(path: &Path, render: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let to_output = |source| HarnessError::Output {
        path: path.to_path_buf(),
        source,
    };
    let mut out = BufWriter::new(File::create(path).map_err(to_output)?);
    render(&mut out).map_err(to_output)?;
    out.flush().map_err(to_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifteen_cells_with_unique_names() {
        let names: Vec<String> = cells().map(|c| c.file_name()).collect();
        assert_eq!(names.len(), 15);
        assert_eq!(names[0], "results_0R_100W_50I_50R.txt");
        assert_eq!(names[14], "results_100R_0W_100I_0R.txt");

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 15);
    }

    #[test]
    fn every_cell_is_a_valid_config() {
        let base = RunConfig::default();
        for cell in cells() {
            let config = cell.apply(&base);
            assert!(config.validate().is_ok(), "{}", cell.file_name());
            assert_eq!(config.iters_per_chunk, base.iters_per_chunk);
            assert_eq!(config.chunks, base.chunks);
        }
    }

    #[test]
    fn apply_overrides_only_ratios() {
        let base = RunConfig {
            chunks: 7,
            ..RunConfig::default()
        };
        let cell = MatrixCell {
            rw: RW_PRESETS[1],
            ir: IR_PRESETS[1],
        };
        let config = cell.apply(&base);
        assert_eq!(config.reads_per_write, 1);
        assert_eq!(config.writes_per_read, 4);
        assert_eq!(config.inserts_per_remove, 4);
        assert_eq!(config.removes_per_insert, 1);
        assert_eq!(config.chunks, 7);
    }
}
