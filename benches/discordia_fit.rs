use criterion::{black_box, criterion_group, criterion_main, Criterion};

use geochron::constants::Constants;
use geochron::data::upb::{UPbData, UPbFormat};
use geochron::data::Aliquot;
use geochron::ludwig::discordia;
use geochron::params::FitParams;
use geochron::stats::ErrorModel;

/// Tera-Wasserburg mixtures of a `t` Ma end-member with common Pb207/Pb206 = 0.86.
fn mixtures(t: f64, n: usize, consts: &Constants) -> UPbData {
    let (l8, _) = consts.lambda("U238").unwrap();
    let (l5, _) = consts.lambda("U235").unwrap();
    let (u85, _) = consts.iratio("U238U235").unwrap();
    let x_t = 1.0 / (l8 * t).exp_m1();
    let y_t = (l5 * t).exp_m1() / (u85 * (l8 * t).exp_m1());
    let aliquots = (0..n)
        .map(|i| {
            let f = 0.05 + 0.8 * i as f64 / n as f64;
            let jitter = if i % 2 == 0 { 0.004 } else { -0.004 };
            let x = (1.0 - f) * x_t;
            let y = (y_t + f * (0.86 - y_t)) * (1.0 + jitter);
            Aliquot::new(vec![x, y], vec![0.01 * x, 0.005 * y], vec![0.1]).unwrap()
        })
        .collect();
    UPbData::new(UPbFormat::TeraWasserburg, aliquots).unwrap()
}

fn bench_discordia(c: &mut Criterion) {
    let consts = Constants::default();
    let params = FitParams::default();
    let data = mixtures(600.0, 20, &consts);
    for (name, model) in [
        ("analytical", ErrorModel::Analytical),
        ("unweighted", ErrorModel::Unweighted),
        ("overdispersed", ErrorModel::Overdispersed),
    ] {
        c.bench_function(&format!("discordia/{name}/n=20"), |b| {
            b.iter(|| discordia(black_box(&data), &consts, model, &params).unwrap())
        });
    }
}

criterion_group!(benches, bench_discordia);
criterion_main!(benches);
