//! Error type for the harness.
//!
//! The measured core has almost no failure modes: map operations are
//! infallible from the harness's point of view, so everything here is either
//! a configuration problem caught before any thread starts, a worker that
//! died underneath us, or a report that could not be written.

use std::error::Error as StdError;
use std::fmt as StdFmt;
use std::io;
use std::path::PathBuf;

// ============================================================================
//  HarnessError
// ============================================================================

/// Errors reported by configuration validation and by the worker pool.
#[derive(Debug)]
pub enum HarnessError {
    /// The workload would demand more removes than inserts over time.
    InvalidRatio {
        /// Configured inserts per remove.
        inserts_per_remove: usize,
        /// Configured removes per insert.
        removes_per_insert: usize,
    },

    /// `inserts_per_remove` is zero, so the insert share is undefined.
    NoInserts,

    /// At least one measurement chunk is required per worker count.
    NoChunks,

    /// Keep fraction must be a finite value in `[0, 1]`.
    InvalidKeepFraction(f64),

    /// Per-chunk operation counts would not fit in `u64`.
    WorkloadOverflow,

    /// The sweep was asked to run with zero worker slots.
    NoWorkers,

    /// The OS refused to create a worker thread.
    Spawn {
        /// Slot the thread was meant to serve.
        index: usize,
        /// Underlying spawn error.
        source: io::Error,
    },

    /// A worker thread died while running a job (usually a panic in the map).
    WorkerPanicked {
        /// Slot of the dead worker.
        index: usize,
    },

    /// A report file could not be written.
    Output {
        /// File or directory being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl StdFmt::Display for HarnessError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::InvalidRatio {
                inserts_per_remove,
                removes_per_insert,
            } => write!(
                f,
                "can't have more removes than inserts \
                 (inserts per remove = {inserts_per_remove}, removes per insert = {removes_per_insert})"
            ),

            Self::NoInserts => write!(f, "inserts per remove must be at least 1"),

            Self::NoChunks => write!(f, "chunks must be at least 1"),

            Self::InvalidKeepFraction(fraction) => {
                write!(f, "keep chunk fraction must be within [0, 1], got {fraction}")
            }

            Self::WorkloadOverflow => write!(
                f,
                "iterations per chunk times reads, writes or insert weight overflows 64 bits"
            ),

            Self::NoWorkers => write!(f, "worker capacity must be at least 1"),

            Self::Spawn { index, source } => {
                write!(f, "failed to spawn worker {index}: {source}")
            }

            Self::WorkerPanicked { index } => write!(f, "worker {index} panicked"),

            Self::Output { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl StdError for HarnessError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Output { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_message_names_both_parameters() {
        let err = HarnessError::InvalidRatio {
            inserts_per_remove: 1,
            removes_per_insert: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("more removes than inserts"));
        assert!(msg.contains("inserts per remove = 1"));
        assert!(msg.contains("removes per insert = 3"));
    }

    #[test]
    fn spawn_error_exposes_source() {
        let err = HarnessError::Spawn {
            index: 2,
            source: io::Error::other("no threads left"),
        };
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "failed to spawn worker 2: no threads left"
        );
        assert!(HarnessError::NoChunks.source().is_none());
    }

    #[test]
    fn output_error_names_the_path() {
        let err = HarnessError::Output {
            path: PathBuf::from("out/dashmap/results_0R_100W_50I_50R.txt"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(
            err.to_string()
                .starts_with("failed to write out/dashmap/results_0R_100W_50I_50R.txt")
        );
        assert!(err.source().is_some());
    }
}
