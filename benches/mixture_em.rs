use criterion::{black_box, criterion_group, criterion_main, Criterion};

use geochron::params::FitParams;
use geochron::peakfit::{minimum_age, peakfit, Components};

/// Three age populations at 30, 60 and 150 Ma, `n` grains each.
fn grain_ages(n: usize) -> (Vec<f64>, Vec<f64>) {
    let ages: Vec<f64> = [30.0, 60.0, 150.0]
        .iter()
        .flat_map(|t| (0..n).map(move |i| t * (1.0 + 0.03 * ((i % 7) as f64 - 3.0) / 3.0)))
        .collect();
    let errors = ages.iter().map(|t| 0.03 * t).collect();
    (ages, errors)
}

fn bench_peakfit(c: &mut Criterion) {
    let params = FitParams::default();
    let (ages, errors) = grain_ages(30);
    c.bench_function("peakfit/fixed_k=3/n=90", |b| {
        b.iter(|| {
            peakfit(
                black_box(&ages),
                black_box(&errors),
                Components::Fixed(3),
                true,
                &params,
            )
            .unwrap()
        })
    });
    c.bench_function("peakfit/auto/n=90", |b| {
        b.iter(|| {
            peakfit(
                black_box(&ages),
                black_box(&errors),
                Components::Auto,
                true,
                &params,
            )
            .unwrap()
        })
    });
}

fn bench_minimum_age(c: &mut Criterion) {
    let params = FitParams::builder().mam_grid_steps(20).build().unwrap();
    let (ages, errors) = grain_ages(10);
    c.bench_function("minimum_age/n=30", |b| {
        b.iter(|| minimum_age(black_box(&ages), black_box(&errors), true, &params).unwrap())
    });
}

criterion_group!(benches, bench_peakfit, bench_minimum_age);
criterion_main!(benches);
