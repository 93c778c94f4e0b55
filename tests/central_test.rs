use approx::assert_relative_eq;
use geochron::age::{AgeConverter, AgeOptions};
use geochron::central::{central, central_age};
use geochron::constants::Constants;
use geochron::data::fissiontracks::{FissionTrackData, TrackCounts};
use geochron::data::uthhe::{UThHeData, UThHeFormat};
use geochron::data::{Aliquot, Dataset};
use geochron::params::FitParams;
use geochron::stats::ErrorModel;

fn tracks(counts: &[(u32, u32)]) -> FissionTrackData {
    let grains = counts.iter().map(|&(ns, ni)| TrackCounts { ns, ni }).collect();
    FissionTrackData::new((350.0, 10.0), (1.2, 0.02), grains).unwrap()
}

#[test]
fn test_repeated_value_with_zero_error() {
    let fit = central_age(&[42.0; 4], &[0.0; 4], &FitParams::default()).unwrap();
    assert_eq!(fit.t, 42.0);
    assert_eq!(fit.disp, 0.0);
    assert!(fit.stats.mswd.is_nan());
    assert!(fit.stats.p_value.is_nan());
}

#[test]
fn test_fission_track_dataset_uses_the_binomial_model() {
    let data = tracks(&[(20, 40), (22, 41), (19, 40), (21, 39), (20, 42), (18, 38)]);
    let consts = Constants::default();
    let params = FitParams::default();
    let direct = data.central_age(&consts, &params).unwrap();
    let via_dataset = central(&Dataset::FissionTracks(data), &consts, &params).unwrap();

    assert_eq!(direct, via_dataset);
    assert_eq!(direct.stats.df, 5);
    assert!(direct.disp < 0.1);
    assert!(direct.t > 0.0 && direct.se > 0.0);
    assert!(direct.ci(0.05).unwrap() > direct.se);
}

#[test]
fn test_fission_track_dispersion_grows_with_scatter() {
    let consts = Constants::default();
    let params = FitParams::default();
    let tight = tracks(&[(50, 100), (51, 99), (49, 101), (50, 98), (52, 100)])
        .central_age(&consts, &params)
        .unwrap();
    let loose = tracks(&[(20, 100), (80, 100), (45, 100), (120, 100), (35, 100)])
        .central_age(&consts, &params)
        .unwrap();
    assert!(loose.disp > tight.disp);
    assert!(loose.stats.p_value < 0.01);
}

#[test]
fn test_uthhe_central_age_of_identical_aliquots() {
    let aliquot = || {
        let v = vec![1.0e-9, 2.0e-6, 5.0e-6];
        let e = v.iter().map(|x| 0.02 * x).collect();
        Aliquot::uncorrelated(v, e).unwrap()
    };
    let data = UThHeData::new(UThHeFormat::UThHe, (0..4).map(|_| aliquot()).collect()).unwrap();
    let consts = Constants::default();
    let fit = data
        .central_age(&consts, ErrorModel::Analytical, &FitParams::default())
        .unwrap();
    let single = data.ages(&consts, &AgeOptions::default(), &FitParams::default()).unwrap()[0];

    assert_eq!(fit.stats.df, 6);
    assert!(fit.stats.chi2 < 1e-10);
    assert_relative_eq!(fit.age.t, single.t, max_relative = 1e-6);
    // four identical aliquots halve the error
    assert_relative_eq!(fit.age.se, single.se / 2.0, max_relative = 1e-3);
}
