//! Shared test support: log setup and a map that counts every call.
//!
//! `init_tracing()` appends NDJSON to `$MAPSCALE_LOG_DIR/mapscale.jsonl`
//! (default `logs/`) and mirrors to the test console unless
//! `MAPSCALE_LOG_CONSOLE=0`. `RUST_LOG` filters both, default `info`.
//!
//! ```bash
//! jq 'select(.fields.message == "chunk" and .fields.workers == 2)' logs/mapscale.jsonl
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};

use dashmap::DashMap;
use mapscale::map::QuiescentContext;
use mapscale::{ConcurrentMap, MapAdapter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

// =============================================================================
// Tracing
// =============================================================================

static INIT: Once = Once::new();

/// Install the subscriber once per test binary.
pub fn init_tracing() {
    INIT.call_once(install_subscriber);
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[expect(clippy::expect_used)]
fn install_subscriber() {
    let dir = env::var_os("MAPSCALE_LOG_DIR").map_or_else(|| PathBuf::from("logs"), PathBuf::from);
    fs::create_dir_all(&dir).expect("create log directory");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("mapscale.jsonl"))
        .expect("open log file");

    let console = !env::var("MAPSCALE_LOG_CONSOLE").is_ok_and(|v| v == "0");
    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_thread_names(true)
            .compact()
            .with_filter(filter())
    });

    // Worker threads are named `mapscale-worker-N`; keep that in every record.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_thread_names(true)
        .json()
        .with_filter(filter());

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// =============================================================================
// CountingMap
// =============================================================================

/// `DashMap` that counts every call the harness makes.
#[derive(Debug, Default)]
pub struct CountingMap {
    inner: DashMap<u32, u32>,
    assigns: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    erases: AtomicU64,
}

impl CountingMap {
    pub fn assigns(&self) -> u64 {
        self.assigns.load(Ordering::Relaxed)
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn erases(&self) -> u64 {
        self.erases.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn contains(&self, key: u32) -> bool {
        self.inner.contains_key(&key)
    }
}

impl ConcurrentMap for CountingMap {
    fn assign(&self, key: u32, value: u32) {
        self.assigns.fetch_add(1, Ordering::Relaxed);
        self.inner.insert(key, value);
    }

    fn get(&self, key: u32) -> Option<u32> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let found = self.inner.get(&key).map(|entry| *entry.value());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn erase(&self, key: u32) {
        self.erases.fetch_add(1, Ordering::Relaxed);
        self.inner.remove(&key);
    }
}

/// Builds [`CountingMap`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingAdapter;

impl MapAdapter for CountingAdapter {
    type Map = CountingMap;
    type Context = QuiescentContext;

    fn name(&self) -> &'static str {
        "counting"
    }

    fn create_map(&self, _capacity: usize) -> Self::Map {
        CountingMap::default()
    }

    fn thread_context(&self, _index: usize) -> Self::Context {
        QuiescentContext::default()
    }
}
