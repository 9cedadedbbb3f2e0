//! Godrays Parameter Tests
//!
//! Tests for:
//! - Patch merging over current values
//! - Step mode exclusivity and switching
//! - Range validation (no partial application on error)
//! - JSON configuration (camelCase keys, enum spellings, color forms)
//! - StepMode::step_count bounds

use glam::Vec3;

use myth_godrays::errors::GodraysError;
use myth_godrays::resources::godrays::{
    AdaptiveSteps, BlurParams, DEFAULT_RAYMARCH_STEPS, GodraysParams, GodraysParamsPatch,
    KernelSize, StepMode, UpsampleQuality,
};

const EPSILON: f32 = 1e-6;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Defaults & merging
// ============================================================================

#[test]
fn defaults_match_documented_values() {
    let params = GodraysParams::default();
    assert!(approx(params.density(), 1.0 / 128.0));
    assert!(approx(params.max_density(), 0.5));
    assert!(approx(params.distance_attenuation(), 2.0));
    assert_eq!(params.color(), Vec3::ONE);
    assert_eq!(params.steps(), StepMode::Fixed(DEFAULT_RAYMARCH_STEPS));
    assert_eq!(params.blur(), None);
    assert!(params.gamma_correction());
    assert!(approx(params.resolution_scale(), 0.5));
    assert_eq!(params.upsample_quality(), UpsampleQuality::High);
    assert!(!params.debug_steps());
}

#[test]
fn patch_merges_over_current_values() {
    let first = GodraysParams::default()
        .apply(&GodraysParamsPatch::new().with_density(0.02).with_max_density(0.8))
        .unwrap();
    let second = first
        .apply(&GodraysParamsPatch::new().with_gamma_correction(false))
        .unwrap();

    assert!(approx(second.density(), 0.02));
    assert!(approx(second.max_density(), 0.8));
    assert!(!second.gamma_correction());
}

#[test]
fn color_is_normalized_from_hex() {
    let params = GodraysParams::from_patch(&GodraysParamsPatch::new().with_color(0xff8000_u32))
        .unwrap();
    let color = params.color();
    assert!(approx(color.x, 1.0));
    assert!(approx(color.y, 128.0 / 255.0));
    assert!(approx(color.z, 0.0));
}

// ============================================================================
// Step modes
// ============================================================================

#[test]
fn both_step_modes_in_one_patch_conflict() {
    let patch = GodraysParamsPatch::new()
        .with_raymarch_steps(32)
        .with_adaptive_steps(AdaptiveSteps::new(0.5));
    let err = GodraysParams::from_patch(&patch).unwrap_err();
    assert!(matches!(err, GodraysError::ConflictingStepModes));
}

#[test]
fn later_patch_switches_step_mode() {
    let adaptive = GodraysParams::default()
        .apply(&GodraysParamsPatch::new().with_adaptive_steps(AdaptiveSteps::new(0.25)))
        .unwrap();
    assert!(adaptive.steps().is_adaptive());

    let fixed = adaptive
        .apply(&GodraysParamsPatch::new().with_raymarch_steps(16))
        .unwrap();
    assert_eq!(fixed.steps(), StepMode::Fixed(16));
}

#[test]
fn fixed_step_count_ignores_ray_length() {
    let steps = StepMode::Fixed(60);
    assert_eq!(steps.step_count(0.1, 100.0, 1.0 / 2048.0), 60);
    assert_eq!(steps.step_count(500.0, 100.0, 1.0 / 2048.0), 60);
    assert_eq!(steps.max_steps(), 60);
}

#[test]
fn adaptive_step_count_stays_within_bounds() {
    let steps = StepMode::Adaptive(AdaptiveSteps::new(0.5).with_bounds(4, 32));

    // coarse map: texel footprint 2 * 10 * (1 / 16) = 1.25 world units
    // 1 / 0.5 = 2 steps, raised to the minimum
    assert_eq!(steps.step_count(1.0, 10.0, 1.0 / 16.0), 4);
    // 10 / 0.5 = 20 steps
    assert_eq!(steps.step_count(10.0, 10.0, 1.0 / 16.0), 20);
    // 1000 / 0.5 = 2000 steps, capped
    assert_eq!(steps.step_count(1000.0, 10.0, 1.0 / 16.0), 32);
}

#[test]
fn adaptive_steps_sample_every_shadow_texel() {
    // texel footprint: 2 * 10 * (1 / 16) = 1.25 world units, 8 texels on 10
    let steps = StepMode::Adaptive(AdaptiveSteps::new(10.0).with_bounds(1, 1000));
    assert_eq!(steps.step_count(10.0, 10.0, 1.0 / 16.0), 8);

    // 1024 texels across the ray: the step size alone would take 10
    let steps = StepMode::Adaptive(AdaptiveSteps::new(10.0).with_bounds(1, 256));
    assert_eq!(steps.step_count(100.0, 100.0, 1.0 / 2048.0), 256);
}

#[test]
fn adaptive_steps_finer_than_a_texel_are_kept() {
    // step size 0.0625 already samples every 1.25-unit texel
    let steps = StepMode::Adaptive(AdaptiveSteps::new(0.0625).with_bounds(1, 2000));
    assert_eq!(steps.step_count(10.0, 10.0, 1.0 / 16.0), 160);
}

#[test]
fn invalid_adaptive_bounds_are_rejected() {
    let patch = GodraysParamsPatch::new()
        .with_adaptive_steps(AdaptiveSteps::new(0.5).with_bounds(40, 10));
    let err = GodraysParams::from_patch(&patch).unwrap_err();
    assert!(matches!(err, GodraysError::InvalidParameter { name: "adaptiveSteps", .. }));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn rejected_patch_leaves_parameters_untouched() {
    let params = GodraysParams::default();
    let result = params.apply(
        &GodraysParamsPatch::new()
            .with_density(0.1)
            .with_max_density(1.5),
    );
    assert!(matches!(
        result,
        Err(GodraysError::InvalidParameter { name: "maxDensity", .. })
    ));
    assert_eq!(params, GodraysParams::default());
}

#[test]
fn resolution_scale_must_be_in_unit_interval() {
    for scale in [0.0, -0.5, 1.5, f32::NAN] {
        let result = GodraysParams::from_patch(&GodraysParamsPatch::new().with_resolution_scale(scale));
        assert!(result.is_err(), "scale {scale} should be rejected");
    }
    assert!(GodraysParams::from_patch(&GodraysParamsPatch::new().with_resolution_scale(1.0)).is_ok());
}

#[test]
fn zero_fixed_steps_are_rejected() {
    let result = GodraysParams::from_patch(&GodraysParamsPatch::new().with_raymarch_steps(0));
    assert!(result.is_err());
}

#[test]
fn blur_variance_must_be_positive() {
    let blur = BlurParams {
        variance: 0.0,
        kernel_size: KernelSize::Small,
    };
    let result = GodraysParams::from_patch(&GodraysParamsPatch::new().with_blur(blur));
    assert!(result.is_err());
}

// ============================================================================
// JSON
// ============================================================================

#[test]
fn json_patch_uses_camel_case_keys() {
    let patch = GodraysParamsPatch::from_json(
        r##"{
            "density": 0.0078125,
            "maxDensity": 0.5,
            "color": "#ffeedd",
            "raymarchSteps": 60,
            "blur": { "variance": 0.1, "kernelSize": "VERY_LARGE" },
            "resolutionScale": 0.25,
            "upsampleQuality": "LOW"
        }"##,
    )
    .unwrap();
    let params = GodraysParams::from_patch(&patch).unwrap();

    assert_eq!(params.steps(), StepMode::Fixed(60));
    assert_eq!(params.blur().map(|b| b.kernel_size), Some(KernelSize::VeryLarge));
    assert!(approx(params.resolution_scale(), 0.25));
    assert_eq!(params.upsample_quality(), UpsampleQuality::Low);
    assert!(approx(params.color().y, 238.0 / 255.0));
}

#[test]
fn json_blur_accepts_boolean_toggle() {
    let patch = GodraysParamsPatch::from_json(r#"{ "blur": true }"#).unwrap();
    let params = GodraysParams::from_patch(&patch).unwrap();
    assert_eq!(params.blur(), Some(BlurParams::default()));
}

#[test]
fn disabling_blur_keeps_custom_settings_for_later() {
    let custom = BlurParams {
        variance: 0.25,
        kernel_size: KernelSize::Large,
    };
    let params = GodraysParams::from_patch(&GodraysParamsPatch::new().with_blur(custom)).unwrap();

    let off = params
        .apply(&GodraysParamsPatch::from_json(r#"{ "blur": false }"#).unwrap())
        .unwrap();
    assert_eq!(off.blur(), None);

    // unrelated changes while disabled do not forget the settings
    let off = off.apply(&GodraysParamsPatch::new().with_density(0.02)).unwrap();
    let on = off
        .apply(&GodraysParamsPatch::from_json(r#"{ "blur": true }"#).unwrap())
        .unwrap();
    assert_eq!(on.blur(), Some(custom));
}

#[test]
fn json_unknown_key_is_a_config_error() {
    let err = GodraysParamsPatch::from_json(r#"{ "dens1ty": 0.1 }"#).unwrap_err();
    assert!(matches!(err, GodraysError::InvalidConfig(_)));
}

#[test]
fn serialized_params_reload_identically() {
    let params = GodraysParams::from_patch(
        &GodraysParamsPatch::new()
            .with_adaptive_steps(AdaptiveSteps::new(0.5).with_bounds(8, 64))
            .with_blur(true)
            .with_debug_steps(true),
    )
    .unwrap();

    let json = serde_json::to_string(&params).unwrap();
    let reloaded = GodraysParams::from_patch(&GodraysParamsPatch::from_json(&json).unwrap()).unwrap();
    assert_eq!(reloaded, params);
}
