#![allow(dead_code)]

use geochron::constants::Constants;
use geochron::data::upb::{UPbData, UPbFormat};
use geochron::data::Aliquot;
use geochron::regression::YorkData;

/// York (1966) test data with 1 % and 0.5 % relative errors and a correlation of 0.8.
pub fn york_benchmark() -> YorkData {
    let x = vec![
        1.550, 12.395, 20.445, 20.435, 20.610, 24.900, 28.530, 50.540, 51.595, 86.51, 106.40,
        157.35,
    ];
    let y = vec![
        0.7268, 0.7849, 0.8200, 0.8156, 0.8160, 0.8322, 0.8642, 0.9584, 0.9617, 1.135, 1.230,
        1.490,
    ];
    let sx = x.iter().map(|v| 0.01 * v).collect();
    let sy = y.iter().map(|v| 0.005 * v).collect();
    let n = x.len();
    YorkData::new(x, sx, y, sy, vec![0.8; n]).unwrap()
}

/// Rows `[X, sX, Y, sY, Z, sZ, rXY, rXZ, rYZ]` scattered about the line
/// `Y = 0.5 + 0.2 X`, `Z = 1.0 − 0.05 X`.
pub fn titterington_rows() -> Vec<[f64; 9]> {
    vec![
        [1.0, 0.02, 0.702, 0.01, 0.949, 0.01, 0.5, 0.2, 0.1],
        [2.0, 0.03, 0.897, 0.01, 0.902, 0.01, 0.4, -0.1, 0.3],
        [3.0, 0.04, 1.105, 0.02, 0.848, 0.02, 0.6, 0.0, 0.2],
        [4.0, 0.04, 1.296, 0.02, 0.803, 0.02, 0.5, 0.3, -0.2],
        [5.0, 0.05, 1.507, 0.02, 0.746, 0.02, 0.3, 0.1, 0.4],
        [6.0, 0.06, 1.694, 0.03, 0.703, 0.02, 0.5, 0.2, 0.1],
    ]
}

/// Step ages of the weighted-mean scenario; the last one is far off.
pub const SCENARIO_AGES: [f64; 10] = [
    251.9, 251.59, 251.47, 251.35, 251.1, 251.04, 250.79, 250.73, 251.22, 228.43,
];

pub const SCENARIO_ERRORS: [f64; 10] = [0.28, 0.28, 0.63, 0.34, 0.28, 0.63, 0.28, 0.4, 0.28, 0.33];

/// Radiogenic Tera-Wasserburg composition `(U238/Pb206, Pb207/Pb206)` at age `t`.
pub fn concordia_tw(t: f64, consts: &Constants) -> (f64, f64) {
    let (l8, _) = consts.lambda("U238").unwrap();
    let (l5, _) = consts.lambda("U235").unwrap();
    let (u85, _) = consts.iratio("U238U235").unwrap();
    let m8 = (l8 * t).exp_m1();
    (1.0 / m8, (l5 * t).exp_m1() / (u85 * m8))
}

/// Two-dimensional mixtures of age `t` with common Pb207/Pb206 = `a0`, with
/// alternating relative offsets `jitter` in Pb207/Pb206.
pub fn tw_mixtures(t: f64, a0: f64, fractions: &[f64], jitter: f64) -> UPbData {
    let (x_t, y_t) = concordia_tw(t, &Constants::default());
    let aliquots = fractions
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let x = (1.0 - f) * x_t;
            let y = (y_t + f * (a0 - y_t)) * (1.0 + sign * jitter);
            Aliquot::new(vec![x, y], vec![0.01 * x, 0.005 * y], vec![0.0]).unwrap()
        })
        .collect();
    UPbData::new(UPbFormat::TeraWasserburg, aliquots).unwrap()
}

/// Three-dimensional mixtures `(U238/Pb206, Pb207/Pb206, Pb204/Pb206)` of age `t` with
/// common Pb of Pb206/Pb204 = `a0` and Pb207/Pb204 = `b0`.
pub fn tw204_mixtures(t: f64, a0: f64, b0: f64, fractions: &[f64]) -> UPbData {
    let (x_t, y_t) = concordia_tw(t, &Constants::default());
    let aliquots = fractions
        .iter()
        .map(|f| {
            let x = (1.0 - f) * x_t;
            let y = (1.0 - f) * y_t + f * b0 / a0;
            let z = f / a0;
            Aliquot::new(
                vec![x, y, z],
                vec![0.01 * x, 0.005 * y, 0.02 * z],
                vec![0.0, 0.0, 0.0],
            )
            .unwrap()
        })
        .collect();
    UPbData::new(UPbFormat::TeraWasserburg204, aliquots).unwrap()
}
