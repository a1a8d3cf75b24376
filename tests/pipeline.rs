//! End-to-end forward/inverse tests on a centred sphere

mod common;

use common::{mean_in, z_profile, SphereScenario, TestResult};
use qsm_sim::fft::{fft3d, ifft3d};
use qsm_sim::kernels::dipole_kernel_2d;
use qsm_sim::utils::metrics::{std_dev, support_mask};
use qsm_sim::{
    ComplexVolume, Dims, DipoleKernel, NoiseConfig, RecomputeOutcome, Regularization, SlicePlane,
    Volume,
};

#[test]
fn test_sphere_field_mirror_symmetric_along_b0() {
    let scenario = SphereScenario::default();
    let engine = scenario.run(Regularization::default(), NoiseConfig::disabled());
    let field = engine.clean_field();
    let n = scenario.n;

    let peak = field.max_abs();
    for (i, j) in [(16, 16), (20, 16), (16, 11), (25, 27)] {
        let profile = z_profile(field, i, j);
        for k in 1..n {
            let mirrored = profile[n - k];
            assert!(
                (profile[k] - mirrored).abs() < 1e-10 * peak,
                "field not mirror-symmetric at ({}, {}, {}): {} vs {}",
                i, j, k, profile[k], mirrored
            );
        }
    }
}

#[test]
fn test_sphere_field_dipole_lobes() {
    let engine = SphereScenario::default().run(Regularization::default(), NoiseConfig::disabled());
    let field = engine.clean_field();

    // Above and below the sphere along B0: positive
    assert!(field.get(16, 16, 25) > 0.0, "pole {}", field.get(16, 16, 25));
    assert!(field.get(16, 16, 7) > 0.0, "pole {}", field.get(16, 16, 7));
    // Beside it, perpendicular to B0: negative
    assert!(field.get(25, 16, 16) < 0.0, "equator {}", field.get(25, 16, 16));
    assert!(field.get(16, 7, 16) < 0.0, "equator {}", field.get(16, 7, 16));
    // Pole lobe is roughly twice the equatorial one
    let ratio = field.get(16, 16, 25) / -field.get(25, 16, 16);
    assert!(ratio > 1.5 && ratio < 2.5, "pole/equator ratio {}", ratio);
}

#[test]
fn test_tikhonov_attenuation_grows_with_lambda() {
    let scenario = SphereScenario::default();
    let mut engine = scenario.run(Regularization::tikhonov(0.01), NoiseConfig::default());
    let truth = engine.susceptibility().clone();
    let mask = support_mask(truth.data());
    let field = engine.field().clone();

    let mut means = Vec::new();
    for lambda in [0.01, 0.05, 0.2] {
        engine.set_regularization(Regularization::tikhonov(lambda)).unwrap();
        engine.recompute().unwrap();
        assert_eq!(engine.field(), &field, "noise must be reused across λ");

        let recon = engine.reconstruction();
        TestResult::new(&format!("tikhonov {lambda}"), recon.data(), truth.data(), &mask).print();
        means.push(mean_in(recon, &mask));
    }

    assert!(means[0] < 1.0, "λ=0.01 peak not attenuated: {}", means[0]);
    assert!(means[0] > 0.0);
    assert!(
        means[0] > means[1] && means[1] > means[2],
        "attenuation not monotonic in λ: {:?}",
        means
    );
}

#[test]
fn test_reconstruction_resembles_sphere() {
    let scenario = SphereScenario::default();
    let engine = scenario.run(Regularization::tikhonov(0.01), NoiseConfig::default());
    let truth = engine.susceptibility();
    let recon = engine.reconstruction();

    let inside = mean_in(recon, &scenario.inner_mask(0.5));
    let everywhere = vec![1u8; recon.len()];
    let result = TestResult::new("tikhonov", recon.data(), truth.data(), &everywhere);
    result.print();

    assert!(inside > 0.3, "sphere interior mean {}", inside);
    assert!(result.correlation > 0.7, "correlation {}", result.correlation);
}

#[test]
fn test_tkd_on_same_noise() {
    let scenario = SphereScenario::default();
    let mut engine = scenario.run(Regularization::tikhonov(0.01), NoiseConfig::default());
    let field = engine.field().clone();

    engine.set_regularization(Regularization::truncated(0.0)).unwrap();
    assert_eq!(engine.recompute().unwrap(), RecomputeOutcome::InverseOnly);
    assert_eq!(engine.field(), &field);

    let recon = engine.reconstruction();
    assert!(recon.data().iter().all(|v| v.is_finite()));
    assert!(mean_in(recon, &scenario.inner_mask(0.5)) > 0.3);
}

#[test]
fn test_seeded_pipeline_is_deterministic() {
    let scenario = SphereScenario { n: 16, radius: 4.0, susceptibility: 0.5 };
    let a = scenario.run(Regularization::truncated(0.1), NoiseConfig::default());
    let b = scenario.run(Regularization::truncated(0.1), NoiseConfig::default());
    assert_eq!(a.field(), b.field());
    assert_eq!(a.reconstruction(), b.reconstruction());
}

#[test]
fn test_noise_calibration() {
    let engine = SphereScenario::default().run(Regularization::default(), NoiseConfig::default());
    let sigma = 0.02 * engine.clean_field().max_abs();
    assert!((engine.noise_sigma() - sigma).abs() < 1e-15);

    let sd = std_dev(engine.noise().data());
    assert!((sd - sigma).abs() / sigma < 0.05, "noise std {} vs sigma {}", sd, sigma);
}

#[test]
fn test_fft3d_roundtrip_relative_error() {
    let dims = Dims::new(16, 8, 32);
    let data: Vec<f64> = (0..dims.len())
        .map(|i| ((i * 7919) % 1013) as f64 / 101.3 - 5.0)
        .collect();
    let input = Volume::from_vec(dims, data).unwrap();

    let mut spectrum = ComplexVolume::from_real(&input);
    fft3d(&mut spectrum).unwrap();
    ifft3d(&mut spectrum).unwrap();

    for (orig, back) in input.data().iter().zip(spectrum.re.iter()) {
        let scale = orig.abs().max(1e-3);
        assert!((orig - back).abs() / scale < 1e-4, "{} -> {}", orig, back);
    }
    assert!(spectrum.im.iter().all(|v| v.abs() < 1e-10));
}

#[test]
fn test_kernel_dc_is_zero() {
    let dims = Dims::new(32, 32, 16);
    for tilt in [0.0, 25.0, 90.0] {
        let kernel = DipoleKernel::new(dims, tilt).unwrap();
        assert_eq!(kernel.get(16, 16, 8), 0.0);
    }
}

#[test]
fn test_axial_slice_magic_angle_degeneracy() {
    let kernel = dipole_kernel_2d(32, 32, SlicePlane::Axial).unwrap();
    assert!(kernel.iter().all(|&d| d == 1.0 / 3.0));
}

#[test]
fn test_non_power_of_two_rejected_before_compute() {
    let scenario = SphereScenario { n: 24, radius: 4.0, susceptibility: 1.0 };
    let result = qsm_sim::SimulationEngine::new(
        scenario.config(Regularization::default(), NoiseConfig::default()),
    );
    assert!(matches!(result, Err(qsm_sim::QsmError::NonPowerOfTwo { len: 24, .. })));
}
