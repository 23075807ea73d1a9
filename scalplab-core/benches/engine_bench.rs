//! Criterion benchmarks for ScalpLab hot paths.
//!
//! Benchmarks:
//! 1. EMA over a minute series
//! 2. Signal detection over a precomputed view
//! 3. Full strategy pass (EMA + detection + simulation)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use scalplab_core::config::StrategyConfig;
use scalplab_core::domain::Bar;
use scalplab_core::engine::run_strategy;
use scalplab_core::indicators::{ema_of_series, BarView, Ema};
use scalplab_core::signals::{detect_signals, ExhaustionReversal};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let mut prev = 4_000.0;
    (0..n)
        .map(|i| {
            let wave = (i as f64 * 0.13).sin() * 3.0 + (i as f64 * 0.041).cos() * 5.0;
            let close = ((4_000.0 + wave) * 4.0).round() / 4.0;
            let open = prev;
            prev = close;
            Bar::new(
                base + chrono::Duration::minutes(i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
            )
        })
        .collect()
}

// ── 1. EMA ───────────────────────────────────────────────────────────

fn bench_ema(c: &mut Criterion) {
    let mut group = c.benchmark_group("ema");

    for &n in &[1_440, 10_080, 43_200] {
        let closes: Vec<f64> = make_bars(n).iter().map(|b| b.close).collect();
        group.bench_with_input(BenchmarkId::new("span_9", n), &n, |b, _| {
            b.iter(|| ema_of_series(black_box(&closes), 9));
        });
    }

    group.finish();
}

// ── 2. Signal Detection ──────────────────────────────────────────────

fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_detection");
    let detector = ExhaustionReversal::new();

    for &n in &[1_440, 10_080, 43_200] {
        let bars = make_bars(n);
        let view = BarView::new(&bars, &Ema::default());
        group.bench_with_input(BenchmarkId::new("exhaustion_reversal", n), &n, |b, _| {
            b.iter(|| detect_signals(&detector, black_box(&view)));
        });
    }

    group.finish();
}

// ── 3. Full Strategy Pass ────────────────────────────────────────────

fn bench_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategy_pass");
    let fixed = StrategyConfig::default();
    let trailing = StrategyConfig::default().with_exit_params(20, 20, 5);

    for &n in &[1_440, 10_080, 43_200] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::new("fixed_exits", n), &n, |b, _| {
            b.iter(|| run_strategy(black_box(&bars), 9, black_box(&fixed)));
        });
        group.bench_with_input(BenchmarkId::new("trailing_stop", n), &n, |b, _| {
            b.iter(|| run_strategy(black_box(&bars), 9, black_box(&trailing)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ema, bench_detection, bench_strategy);
criterion_main!(benches);
