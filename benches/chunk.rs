//! Single-worker chunk cost per map adapter.
//!
//! Measures one driver chunk (no followers) against a pre-populated map, so
//! the numbers isolate the harness loop plus the map's uncontended cost.
//!
//! ```bash
//! cargo bench --bench chunk
//! cargo bench --bench chunk --features mimalloc
//! ```

#![expect(clippy::pedantic)]

use divan::{Bencher, black_box};
use mapscale::partition::key_range;
use mapscale::sync::SpinKicker;
use mapscale::{
    ChunkPlan, DashMapAdapter, LockedAdapter, MapAdapter, PapayaAdapter, Role, RunConfig,
    SkipMapAdapter, StopToken, WorkerState,
};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    divan::main();
}

const ITERS: [usize; 2] = [1_000, 10_000];

fn config(iters: usize) -> RunConfig {
    RunConfig {
        iters_per_chunk: iters,
        chunks: 1,
        ..RunConfig::default()
    }
}

fn bench_adapter<A: MapAdapter>(bencher: Bencher, adapter: A, iters: usize) {
    let config = config(iters);
    let plan = ChunkPlan::new(&config);
    let map = adapter.create_map(adapter.initial_capacity(config.num_keys_per_thread));
    let mut worker = WorkerState::new(0, key_range(0, 1), adapter.thread_context(0));
    worker.register::<A::Map>();
    worker.populate(&map, config.num_keys_per_thread);

    let stop = StopToken::new();
    let barrier = SpinKicker::new();

    bencher.bench_local(|| {
        black_box(worker.run_chunk(
            &map,
            &plan,
            Role::Driver { followers: 0 },
            &stop,
            &barrier,
        ))
    });

    worker.unregister::<A::Map>();
}

#[divan::bench(args = ITERS)]
fn dashmap(bencher: Bencher, iters: usize) {
    bench_adapter(bencher, DashMapAdapter, iters);
}

#[divan::bench(args = ITERS)]
fn skipmap(bencher: Bencher, iters: usize) {
    bench_adapter(bencher, SkipMapAdapter, iters);
}

#[divan::bench(args = ITERS)]
fn papaya(bencher: Bencher, iters: usize) {
    bench_adapter(bencher, PapayaAdapter, iters);
}

#[divan::bench(args = ITERS)]
fn locked(bencher: Bencher, iters: usize) {
    bench_adapter(bencher, LockedAdapter, iters);
}
