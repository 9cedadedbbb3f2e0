//! Godrays Effect Configuration
//!
//! This module defines the godrays parameters as pure data, following the same
//! pattern as the other post-processing settings: a resolved, validated
//! snapshot ([`GodraysParams`]) plus a partial form ([`GodraysParamsPatch`])
//! that callers push at any time.
//!
//! # Merging
//!
//! A patch is merged over the *current* parameters: fields left unset keep
//! their previous value. On pipeline construction the current parameters are
//! the defaults. `color` is always normalized to a concrete linear RGB value.
//!
//! # Step Modes
//!
//! The raymarch either uses a fixed number of steps (`raymarchSteps`) or
//! derives the count from the ray length (`adaptiveSteps`). A single patch
//! naming both is rejected with [`GodraysError::ConflictingStepModes`].
//!
//! # JSON
//!
//! ```json
//! {
//!   "density": 0.0078125,
//!   "maxDensity": 0.5,
//!   "color": "#ffeedd",
//!   "raymarchSteps": 60,
//!   "blur": { "variance": 0.1, "kernelSize": "SMALL" },
//!   "resolutionScale": 0.5,
//!   "upsampleQuality": "HIGH"
//! }
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::errors::{GodraysError, Result};

/// Step count used when neither step mode is configured.
pub const DEFAULT_RAYMARCH_STEPS: u32 = 60;
/// Lower bound for adaptive stepping when `minSteps` is omitted.
pub const DEFAULT_MIN_ADAPTIVE_STEPS: u32 = 8;
/// Upper bound for adaptive stepping when `maxSteps` is omitted.
pub const DEFAULT_MAX_ADAPTIVE_STEPS: u32 = 256;

// ============================================================================
// Enumerations
// ============================================================================

/// Neighbourhood radius of the bilateral denoise filter.
///
/// The radius is baked into the filter shader, so switching sizes rebuilds
/// the filter pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KernelSize {
    VerySmall,
    #[default]
    Small,
    Medium,
    Large,
    VeryLarge,
    Huge,
}

impl KernelSize {
    /// Filter radius in low-resolution texels.
    #[must_use]
    pub const fn radius(self) -> u32 {
        match self {
            Self::VerySmall => 1,
            Self::Small => 2,
            Self::Medium => 3,
            Self::Large => 4,
            Self::VeryLarge => 6,
            Self::Huge => 8,
        }
    }

    /// Returns a human-readable name for the kernel size.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VerySmall => "Very Small",
            Self::Small => "Small",
            Self::Medium => "Medium",
            Self::Large => "Large",
            Self::VeryLarge => "Very Large",
            Self::Huge => "Huge",
        }
    }

    /// Returns all available kernel sizes, smallest first.
    #[must_use]
    pub const fn all() -> &'static [KernelSize] {
        &[
            Self::VerySmall,
            Self::Small,
            Self::Medium,
            Self::Large,
            Self::VeryLarge,
            Self::Huge,
        ]
    }
}

/// Neighbourhood used by the joint bilateral upsampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpsampleQuality {
    /// 2×2 low-resolution texels per output pixel.
    Low,
    /// 4×4 low-resolution texels per output pixel.
    #[default]
    High,
}

impl UpsampleQuality {
    /// Width (and height) of the sampled low-resolution neighbourhood.
    #[must_use]
    pub const fn footprint(self) -> u32 {
        match self {
            Self::Low => 2,
            Self::High => 4,
        }
    }

    /// Returns the shader define key for this quality level.
    #[must_use]
    pub(crate) const fn define_key(self) -> &'static str {
        match self {
            Self::Low => "UPSAMPLE_QUALITY_LOW",
            Self::High => "UPSAMPLE_QUALITY_HIGH",
        }
    }
}

/// How the host encoded values in a depth texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthPacking {
    /// Raw hardware depth in a depth-format texture.
    #[default]
    Basic,
    /// Depth packed into the four channels of an RGBA8 color texture.
    Rgba,
}

// ============================================================================
// Step Modes
// ============================================================================

/// Adaptive raymarch stepping: the step count follows the ray length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveSteps {
    /// World-space distance between two samples.
    pub step_size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
}

impl AdaptiveSteps {
    /// Adaptive stepping with default bounds.
    #[must_use]
    pub fn new(step_size: f32) -> Self {
        Self {
            step_size,
            min_steps: None,
            max_steps: None,
        }
    }

    /// Sets explicit step-count bounds.
    #[must_use]
    pub fn with_bounds(mut self, min_steps: u32, max_steps: u32) -> Self {
        self.min_steps = Some(min_steps);
        self.max_steps = Some(max_steps);
        self
    }

    /// Effective lower bound on the step count.
    #[inline]
    #[must_use]
    pub fn min(&self) -> u32 {
        self.min_steps.unwrap_or(DEFAULT_MIN_ADAPTIVE_STEPS)
    }

    /// Effective upper bound on the step count.
    #[inline]
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max_steps.unwrap_or(DEFAULT_MAX_ADAPTIVE_STEPS)
    }
}

/// Resolved raymarch step configuration. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepMode {
    Fixed(u32),
    Adaptive(AdaptiveSteps),
}

impl StepMode {
    /// The largest number of steps a single ray may take.
    #[must_use]
    pub fn max_steps(&self) -> u32 {
        match self {
            Self::Fixed(steps) => *steps,
            Self::Adaptive(adaptive) => adaptive.max(),
        }
    }

    #[must_use]
    pub fn is_adaptive(&self) -> bool {
        matches!(self, Self::Adaptive(_))
    }

    /// Samples taken along a ray of `ray_len` world units.
    ///
    /// Adaptive stepping takes at least one sample per shadow texel the ray
    /// crosses, a texel spanning `2 * light_far * texel_size` world units.
    /// Mirrors `step_count` in the illumination shader.
    #[must_use]
    pub fn step_count(&self, ray_len: f32, light_far: f32, texel_size: f32) -> u32 {
        match self {
            Self::Fixed(steps) => (*steps).max(1),
            Self::Adaptive(adaptive) => {
                let by_length = (ray_len / adaptive.step_size).ceil();
                let by_texel = (ray_len / (2.0 * light_far * texel_size)).ceil();
                let steps = by_length.max(by_texel).max(0.0) as u32;
                steps.max(adaptive.min()).min(adaptive.max()).max(1)
            }
        }
    }
}

impl Default for StepMode {
    fn default() -> Self {
        Self::Fixed(DEFAULT_RAYMARCH_STEPS)
    }
}

// ============================================================================
// Blur
// ============================================================================

/// Bilateral denoise configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlurParams {
    /// Range standard deviation; larger values blur across stronger edges.
    pub variance: f32,
    #[serde(default)]
    pub kernel_size: KernelSize,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            variance: 0.1,
            kernel_size: KernelSize::Small,
        }
    }
}

/// The `blur` field of a patch: `false`, `true` or a full record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlurSetting {
    Toggle(bool),
    Params(BlurParams),
}

impl From<bool> for BlurSetting {
    fn from(enabled: bool) -> Self {
        Self::Toggle(enabled)
    }
}

impl From<BlurParams> for BlurSetting {
    fn from(params: BlurParams) -> Self {
        Self::Params(params)
    }
}

impl From<Option<BlurParams>> for BlurSetting {
    fn from(params: Option<BlurParams>) -> Self {
        params.map_or(Self::Toggle(false), Self::Params)
    }
}

// ============================================================================
// Color
// ============================================================================

/// A color as written in a config: `0xffeedd`, `"#ffeedd"` or `[1.0, 0.9, 0.8]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Hex(u32),
    Rgb([f32; 3]),
    Css(String),
}

impl ColorValue {
    /// Normalizes the value to an RGB triple in `[0, 1]` per 8-bit channel.
    pub fn to_rgb(&self) -> Result<Vec3> {
        match self {
            Self::Hex(hex) => Ok(hex_to_rgb(*hex)),
            Self::Rgb(rgb) => Ok(Vec3::from_array(*rgb)),
            Self::Css(text) => {
                let digits = text.trim().trim_start_matches('#');
                if digits.len() != 6 {
                    return Err(GodraysError::InvalidParameter {
                        name: "color",
                        reason: format!("expected `#rrggbb`, got `{text}`"),
                    });
                }
                let hex = u32::from_str_radix(digits, 16).map_err(|e| {
                    GodraysError::InvalidParameter {
                        name: "color",
                        reason: format!("`{text}` is not a hex color: {e}"),
                    }
                })?;
                Ok(hex_to_rgb(hex))
            }
        }
    }
}

impl From<Vec3> for ColorValue {
    fn from(rgb: Vec3) -> Self {
        Self::Rgb(rgb.to_array())
    }
}

impl From<u32> for ColorValue {
    fn from(hex: u32) -> Self {
        Self::Hex(hex)
    }
}

fn hex_to_rgb(hex: u32) -> Vec3 {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Vec3::new(channel(16), channel(8), channel(0))
}

// ============================================================================
// GodraysParamsPatch
// ============================================================================

/// Partial godrays configuration pushed by the caller.
///
/// Every field is optional; unset fields keep their current value when the
/// patch is applied.
///
/// ```rust,ignore
/// let patch = GodraysParamsPatch::new()
///     .with_density(1.0 / 128.0)
///     .with_raymarch_steps(60)
///     .with_blur(BlurParams { variance: 0.1, kernel_size: KernelSize::Medium });
/// pipeline.set_params(patch)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GodraysParamsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_density: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_attenuation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raymarch_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_steps: Option<AdaptiveSteps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<BlurSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma_correction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upsample_quality: Option<UpsampleQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_steps: Option<bool>,
}

impl GodraysParamsPatch {
    /// Creates an empty patch (applying it changes nothing).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a patch from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = Some(density);
        self
    }

    #[must_use]
    pub fn with_max_density(mut self, max_density: f32) -> Self {
        self.max_density = Some(max_density);
        self
    }

    #[must_use]
    pub fn with_distance_attenuation(mut self, attenuation: f32) -> Self {
        self.distance_attenuation = Some(attenuation);
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<ColorValue>) -> Self {
        self.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_raymarch_steps(mut self, steps: u32) -> Self {
        self.raymarch_steps = Some(steps);
        self
    }

    #[must_use]
    pub fn with_adaptive_steps(mut self, adaptive: AdaptiveSteps) -> Self {
        self.adaptive_steps = Some(adaptive);
        self
    }

    #[must_use]
    pub fn with_blur(mut self, blur: impl Into<BlurSetting>) -> Self {
        self.blur = Some(blur.into());
        self
    }

    #[must_use]
    pub fn with_gamma_correction(mut self, enabled: bool) -> Self {
        self.gamma_correction = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_resolution_scale(mut self, scale: f32) -> Self {
        self.resolution_scale = Some(scale);
        self
    }

    #[must_use]
    pub fn with_upsample_quality(mut self, quality: UpsampleQuality) -> Self {
        self.upsample_quality = Some(quality);
        self
    }

    #[must_use]
    pub fn with_debug_steps(mut self, enabled: bool) -> Self {
        self.debug_steps = Some(enabled);
        self
    }
}

// ============================================================================
// GodraysParams
// ============================================================================

/// Resolved godrays parameters (validated, all fields concrete).
///
/// Obtained from [`GodraysParams::default`] and [`GodraysParams::apply`];
/// the fields are read-only so every instance upholds the range invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct GodraysParams {
    density: f32,
    max_density: f32,
    distance_attenuation: f32,
    color: Vec3,
    steps: StepMode,
    blur: Option<BlurParams>,
    /// Last explicit blur record; survives disabling so `blur: true` restores it.
    last_blur: BlurParams,
    gamma_correction: bool,
    resolution_scale: f32,
    upsample_quality: UpsampleQuality,
    debug_steps: bool,
}

impl Default for GodraysParams {
    fn default() -> Self {
        Self {
            density: 1.0 / 128.0,
            max_density: 0.5,
            distance_attenuation: 2.0,
            color: Vec3::ONE,
            steps: StepMode::default(),
            blur: None,
            last_blur: BlurParams::default(),
            gamma_correction: true,
            resolution_scale: 0.5,
            upsample_quality: UpsampleQuality::default(),
            debug_steps: false,
        }
    }
}

impl GodraysParams {
    /// Resolves a patch against the defaults.
    pub fn from_patch(patch: &GodraysParamsPatch) -> Result<Self> {
        Self::default().apply(patch)
    }

    /// Returns a copy of `self` with `patch` merged in.
    ///
    /// Fails without modifying anything if the patch names both step modes
    /// or if any resulting value is out of range.
    pub fn apply(&self, patch: &GodraysParamsPatch) -> Result<Self> {
        if patch.raymarch_steps.is_some() && patch.adaptive_steps.is_some() {
            return Err(GodraysError::ConflictingStepModes);
        }

        let mut next = self.clone();
        if let Some(density) = patch.density {
            next.density = density;
        }
        if let Some(max_density) = patch.max_density {
            next.max_density = max_density;
        }
        if let Some(attenuation) = patch.distance_attenuation {
            next.distance_attenuation = attenuation;
        }
        if let Some(color) = &patch.color {
            next.color = color.to_rgb()?;
        }
        if let Some(steps) = patch.raymarch_steps {
            next.steps = StepMode::Fixed(steps);
        }
        if let Some(adaptive) = patch.adaptive_steps {
            next.steps = StepMode::Adaptive(adaptive);
        }
        if let Some(blur) = patch.blur {
            next.blur = match blur {
                BlurSetting::Toggle(false) => None,
                BlurSetting::Toggle(true) => Some(self.blur.unwrap_or(self.last_blur)),
                BlurSetting::Params(params) => {
                    next.last_blur = params;
                    Some(params)
                }
            };
        }
        if let Some(gamma) = patch.gamma_correction {
            next.gamma_correction = gamma;
        }
        if let Some(scale) = patch.resolution_scale {
            next.resolution_scale = scale;
        }
        if let Some(quality) = patch.upsample_quality {
            next.upsample_quality = quality;
        }
        if let Some(debug) = patch.debug_steps {
            next.debug_steps = debug;
        }

        next.validate()?;
        Ok(next)
    }

    /// Converts the resolved parameters back into a full patch (for persistence).
    #[must_use]
    pub fn to_patch(&self) -> GodraysParamsPatch {
        let (raymarch_steps, adaptive_steps) = match self.steps {
            StepMode::Fixed(steps) => (Some(steps), None),
            StepMode::Adaptive(adaptive) => (None, Some(adaptive)),
        };
        GodraysParamsPatch {
            density: Some(self.density),
            max_density: Some(self.max_density),
            distance_attenuation: Some(self.distance_attenuation),
            color: Some(ColorValue::from(self.color)),
            raymarch_steps,
            adaptive_steps,
            blur: Some(BlurSetting::from(self.blur)),
            gamma_correction: Some(self.gamma_correction),
            resolution_scale: Some(self.resolution_scale),
            upsample_quality: Some(self.upsample_quality),
            debug_steps: Some(self.debug_steps),
        }
    }

    fn validate(&self) -> Result<()> {
        fn invalid(name: &'static str, reason: String) -> GodraysError {
            GodraysError::InvalidParameter { name, reason }
        }

        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(invalid(
                "density",
                format!("must be a finite value > 0, got {}", self.density),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_density) {
            return Err(invalid(
                "maxDensity",
                format!("must be within [0, 1], got {}", self.max_density),
            ));
        }
        if !(self.distance_attenuation.is_finite() && self.distance_attenuation >= 0.0) {
            return Err(invalid(
                "distanceAttenuation",
                format!("must be >= 0, got {}", self.distance_attenuation),
            ));
        }
        if !self.color.is_finite() || self.color.min_element() < 0.0 {
            return Err(invalid(
                "color",
                format!("components must be finite and >= 0, got {}", self.color),
            ));
        }
        match self.steps {
            StepMode::Fixed(0) => {
                return Err(invalid("raymarchSteps", "must be >= 1".to_string()));
            }
            StepMode::Fixed(_) => {}
            StepMode::Adaptive(adaptive) => {
                if !(adaptive.step_size.is_finite() && adaptive.step_size > 0.0) {
                    return Err(invalid(
                        "adaptiveSteps.stepSize",
                        format!("must be > 0, got {}", adaptive.step_size),
                    ));
                }
                if adaptive.min() == 0 || adaptive.min() > adaptive.max() {
                    return Err(invalid(
                        "adaptiveSteps",
                        format!(
                            "requires 1 <= minSteps <= maxSteps, got {}..{}",
                            adaptive.min(),
                            adaptive.max()
                        ),
                    ));
                }
            }
        }
        if let Some(blur) = self.blur
            && !(blur.variance.is_finite() && blur.variance > 0.0)
        {
            return Err(invalid(
                "blur.variance",
                format!("must be > 0, got {}", blur.variance),
            ));
        }
        if !(self.resolution_scale > 0.0 && self.resolution_scale <= 1.0) {
            return Err(invalid(
                "resolutionScale",
                format!("must be within (0, 1], got {}", self.resolution_scale),
            ));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn density(&self) -> f32 {
        self.density
    }

    #[inline]
    #[must_use]
    pub fn max_density(&self) -> f32 {
        self.max_density
    }

    #[inline]
    #[must_use]
    pub fn distance_attenuation(&self) -> f32 {
        self.distance_attenuation
    }

    /// Tint applied to the scattering, as linear RGB.
    #[inline]
    #[must_use]
    pub fn color(&self) -> Vec3 {
        self.color
    }

    #[inline]
    #[must_use]
    pub fn steps(&self) -> StepMode {
        self.steps
    }

    /// Denoise configuration, `None` when the filter is disabled.
    #[inline]
    #[must_use]
    pub fn blur(&self) -> Option<BlurParams> {
        self.blur
    }

    #[inline]
    #[must_use]
    pub fn gamma_correction(&self) -> bool {
        self.gamma_correction
    }

    #[inline]
    #[must_use]
    pub fn resolution_scale(&self) -> f32 {
        self.resolution_scale
    }

    #[inline]
    #[must_use]
    pub fn upsample_quality(&self) -> UpsampleQuality {
        self.upsample_quality
    }

    #[inline]
    #[must_use]
    pub fn debug_steps(&self) -> bool {
        self.debug_steps
    }
}

impl Serialize for GodraysParams {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_patch().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_keeps_defaults() {
        let params = GodraysParams::from_patch(&GodraysParamsPatch::new()).unwrap();
        assert_eq!(params, GodraysParams::default());
    }

    #[test]
    fn hex_colors_normalize() {
        assert_eq!(ColorValue::Hex(0xff0000).to_rgb().unwrap(), Vec3::X);
        assert_eq!(
            ColorValue::Css("#00ff00".into()).to_rgb().unwrap(),
            Vec3::Y
        );
        assert!(ColorValue::Css("#0f0".into()).to_rgb().is_err());
    }

    #[test]
    fn blur_toggle_reuses_previous_settings() {
        let custom = BlurParams {
            variance: 0.3,
            kernel_size: KernelSize::Huge,
        };
        let params = GodraysParams::default()
            .apply(&GodraysParamsPatch::new().with_blur(custom))
            .unwrap();
        let on = params.apply(&GodraysParamsPatch::new().with_blur(true)).unwrap();
        assert_eq!(on.blur(), Some(custom));

        let off = params.apply(&GodraysParamsPatch::new().with_blur(false)).unwrap();
        assert_eq!(off.blur(), None);
        let on_again = off.apply(&GodraysParamsPatch::new().with_blur(true)).unwrap();
        assert_eq!(on_again.blur(), Some(custom));
    }

    #[test]
    fn kernel_radii_grow_monotonically() {
        let radii: Vec<u32> = KernelSize::all().iter().map(|k| k.radius()).collect();
        assert!(radii.windows(2).all(|w| w[0] < w[1]));
    }
}
