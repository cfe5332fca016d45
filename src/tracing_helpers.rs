//! Logging macros that vanish without the `tracing` feature.
//!
//! Only the sweep lifecycle, per-chunk totals and pool shutdown log; the
//! iteration loop never does. `RUST_LOG=mapscale=trace` shows every chunk.

#![allow(unused_macros, unused_imports)]

/// Per chunk.
#[cfg(feature = "tracing")]
macro_rules! trace_log {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

/// Sweep phases and worker exits.
#[cfg(feature = "tracing")]
macro_rules! debug_log {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

/// One line per measured point and per matrix cell.
#[cfg(feature = "tracing")]
macro_rules! info_log {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! info_log {
    ($($arg:tt)*) => {};
}

/// Worker threads that died.
#[cfg(feature = "tracing")]
macro_rules! error_log {
    ($($arg:tt)*) => { tracing::error!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! error_log {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_log;
pub(crate) use error_log;
pub(crate) use info_log;
pub(crate) use trace_log;
