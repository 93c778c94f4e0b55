use criterion::{black_box, criterion_group, criterion_main, Criterion};

use geochron::params::FitParams;
use geochron::regression::{titterington, york, TrivariateData, YorkData};

/// `n` points on `y = 0.7 + 0.005 x` with a deterministic zig-zag offset.
fn york_data(n: usize) -> YorkData {
    let x: Vec<f64> = (0..n).map(|i| 1.0 + 1.5 * i as f64).collect();
    let y: Vec<f64> = x
        .iter()
        .enumerate()
        .map(|(i, x)| (0.7 + 0.005 * x) * (1.0 + if i % 2 == 0 { 0.003 } else { -0.003 }))
        .collect();
    let sx = x.iter().map(|v| 0.01 * v).collect();
    let sy = y.iter().map(|v| 0.005 * v).collect();
    YorkData::new(x, sx, y, sy, vec![0.8; n]).unwrap()
}

fn trivariate_data(n: usize) -> TrivariateData {
    let rows: Vec<[f64; 9]> = (0..n)
        .map(|i| {
            let x = 1.0 + i as f64;
            let e = if i % 2 == 0 { 0.004 } else { -0.004 };
            [x, 0.02 * x, 0.5 + 0.2 * x + e, 0.01, 1.0 - 0.05 * x - e, 0.01, 0.5, 0.2, 0.1]
        })
        .collect();
    TrivariateData::from_rows(&rows).unwrap()
}

fn bench_york(c: &mut Criterion) {
    let params = FitParams::default();
    for n in [12usize, 100, 1000] {
        let data = york_data(n);
        c.bench_function(&format!("york/n={n}"), |b| {
            b.iter(|| york(black_box(&data), black_box(&params)).unwrap())
        });
    }
}

fn bench_titterington(c: &mut Criterion) {
    let params = FitParams::default();
    let data = trivariate_data(50);
    c.bench_function("titterington/n=50", |b| {
        b.iter(|| titterington(black_box(&data), black_box(&params)).unwrap())
    });
}

criterion_group!(benches, bench_york, bench_titterington);
criterion_main!(benches);
