//! Erode Benchmark Suite
//!
//! Performance targets:
//!   decay_pass_200_chars ............ < 20μs
//!   accelerate_full_amount .......... < 200μs
//!   ambient_tick_100_memories ....... < 2ms
//!   persist_100_memories ............ < 5ms

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use erode_core::config::{DecayConfig, StabilityConfig};
use erode_core::decay::decay_pass;
use erode_core::stability::{fold_intensity, stability_map};
use erode_core::{DegradationScheduler, ErodeConfig, MemoryId, MemoryStore};

const SAMPLE: &str = "we walked home along the canal and you pointed at every heron \
                      as if it were the first one anyone had ever seen";

fn populated_scheduler(count: usize) -> (DegradationScheduler, Vec<MemoryId>) {
    let store = MemoryStore::in_memory().into_shared();
    let ids = {
        let mut s = store.lock();
        (0..count)
            .filter_map(|i| s.create(&format!("{SAMPLE} ({i})")).map(|m| m.id))
            .collect()
    };
    (DegradationScheduler::with_seed(store, &ErodeConfig::default(), 42), ids)
}

/// Benchmark: One decay pass over ~200 characters.
fn bench_decay_pass(c: &mut Criterion) {
    let text = SAMPLE.repeat(2);
    let len = text.chars().count();
    let stability = stability_map(&text, &StabilityConfig::default());
    let intensities = fold_intensity(0.5, &stability, len);
    let config = DecayConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    c.bench_function("decay_pass_200_chars", |b| {
        b.iter(|| {
            let out = decay_pass(black_box(&text), &intensities, None, &config, &mut rng);
            black_box(out);
        });
    });
}

/// Benchmark: accelerate(1.0) on a fresh memory (20 passes).
fn bench_accelerate(c: &mut Criterion) {
    c.bench_function("accelerate_full_amount", |b| {
        b.iter_batched(
            || populated_scheduler(1),
            |(mut scheduler, ids)| {
                black_box(scheduler.accelerate(ids[0], 1.0));
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: One ambient tick over 100 live memories.
fn bench_tick(c: &mut Criterion) {
    let (mut scheduler, _) = populated_scheduler(100);
    c.bench_function("ambient_tick_100_memories", |b| {
        b.iter(|| black_box(scheduler.tick(black_box(5.0))));
    });
}

/// Benchmark: Serializing 100 memories into the registry payload.
fn bench_persist(c: &mut Criterion) {
    let (scheduler, _) = populated_scheduler(100);
    let memories = scheduler.store().lock().list();
    c.bench_function("persist_100_memories", |b| {
        b.iter(|| {
            let bytes = erode_core::codec::encode(black_box(&memories));
            black_box(bytes)
        });
    });
}

criterion_group!(
    benches,
    bench_decay_pass,
    bench_accelerate,
    bench_tick,
    bench_persist,
);
criterion_main!(benches);
