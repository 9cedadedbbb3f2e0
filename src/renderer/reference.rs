//! CPU Reference Kernels
//!
//! Scalar ports of the illumination, denoise and compositor shaders. They
//! follow the WGSL line for line (texel addressing, clamping, fallbacks) so
//! the effect can be validated and tuned without a GPU adapter.
//!
//! | Shader | Port |
//! |--------|------|
//! | `godrays_illum` | [`ReferenceRaymarcher`] |
//! | `godrays_denoise` | [`bilateral_filter`] |
//! | `godrays_composite` | [`joint_bilateral_upsample`] + [`composite_texel`] |

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::errors::{GodraysError, Result};
use crate::renderer::graph::light_geometry::{ClipPlanes, LightGeometry};
use crate::renderer::graph::passes::compositor::DEPTH_SIGMA;
use crate::renderer::graph::passes::denoise::spatial_sigma;
use crate::resources::godrays::{GodraysParams, KernelSize, UpsampleQuality};
use crate::scene::light::{LightSource, ShadowCamera};

// ============================================================================
// Shadow lookups
// ============================================================================

/// Answers the per-step shadow query of the raymarch.
pub trait ShadowTest {
    fn is_occluded(&self, point: Vec3) -> bool;
}

impl<F: Fn(Vec3) -> bool> ShadowTest for F {
    fn is_occluded(&self, point: Vec3) -> bool {
        self(point)
    }
}

/// Axis-aligned box that casts shadow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occluder {
    pub min: Vec3,
    pub max: Vec3,
}

impl Occluder {
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    /// First hit along `from -> to` as a fraction of the segment.
    #[must_use]
    pub fn intersect_segment(&self, from: Vec3, to: Vec3) -> Option<f32> {
        let dir = to - from;
        let mut t_min = 0.0_f32;
        let mut t_max = 1.0_f32;

        for axis in 0..3 {
            let (o, d) = (from[axis], dir[axis]);
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let (t0, t1) = {
                let a = (lo - o) * inv;
                let b = (hi - o) * inv;
                (a.min(b), a.max(b))
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// CPU counterpart of a directional light's 2-D shadow map.
#[derive(Debug, Clone)]
pub struct DirectionalShadowMap {
    view_projection: Mat4,
    size: u32,
    depths: Vec<f32>,
}

impl DirectionalShadowMap {
    /// Rasterizes `occluders` through an orthographic shadow camera.
    ///
    /// Each texel stores the normalized depth of the nearest hit, or `1.0`.
    #[must_use]
    pub fn render(camera: &ShadowCamera, size: u32, occluders: &[Occluder]) -> Self {
        let size = size.max(1);
        let view_projection = camera.view_projection();
        let inverse = view_projection.inverse();
        let mut depths = Vec::with_capacity(size as usize * size as usize);

        for y in 0..size {
            for x in 0..size {
                let u = (x as f32 + 0.5) / size as f32;
                let v = (y as f32 + 0.5) / size as f32;
                let ndc_x = u * 2.0 - 1.0;
                let ndc_y = 1.0 - v * 2.0;
                let near = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
                let far = inverse.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));

                // orthographic depth is linear along the texel's ray
                let depth = occluders
                    .iter()
                    .filter_map(|o| o.intersect_segment(near, far))
                    .fold(1.0_f32, f32::min);
                depths.push(depth);
            }
        }

        Self {
            view_projection,
            size,
            depths,
        }
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Comparison bias, `1 / (2 * size)`, as uploaded to the shader.
    #[inline]
    #[must_use]
    pub fn texel_size(&self) -> f32 {
        1.0 / (self.size as f32 * 2.0)
    }

    #[must_use]
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        let x = x.min(self.size - 1);
        let y = y.min(self.size - 1);
        self.depths[(y * self.size + x) as usize]
    }
}

impl ShadowTest for DirectionalShadowMap {
    fn is_occluded(&self, point: Vec3) -> bool {
        let clip = self.view_projection * point.extend(1.0);
        let ndc = clip.xyz() / clip.w;
        let u = ndc.x * 0.5 + 0.5;
        let v = 0.5 - ndc.y * 0.5;
        let dims = self.size as i32;
        let tx = ((u * self.size as f32) as i32).clamp(0, dims - 1);
        let ty = ((v * self.size as f32) as i32).clamp(0, dims - 1);
        let stored = self.depth_at(tx as u32, ty as u32);
        ndc.z > stored + self.texel_size()
    }
}

// ============================================================================
// Raymarch
// ============================================================================

/// Scalar port of the illumination fragment shader.
pub struct ReferenceRaymarcher<'a, S: ShadowTest> {
    params: &'a GodraysParams,
    planes: &'a ClipPlanes,
    shadow: &'a S,
    light_position: Vec3,
    light_far: f32,
    texel_size: f32,
}

impl<'a, S: ShadowTest> ReferenceRaymarcher<'a, S> {
    /// `geometry` must already be updated for `light`.
    pub fn new(
        params: &'a GodraysParams,
        geometry: &'a LightGeometry,
        light: &LightSource,
        shadow: &'a S,
        texel_size: f32,
    ) -> Result<Self> {
        let camera = light
            .shadow
            .as_ref()
            .map(|s| s.camera)
            .ok_or(GodraysError::LightWithoutShadow)?;
        Ok(Self {
            params,
            planes: geometry.planes(),
            shadow,
            light_position: light.position,
            light_far: camera.far,
            texel_size,
        })
    }

    #[must_use]
    pub fn step_count(&self, ray_len: f32) -> u32 {
        self.params
            .steps()
            .step_count(ray_len, self.light_far, self.texel_size)
    }

    /// Scattering accumulated between `camera_position` and `surface`.
    ///
    /// `jitter` is the noise value in `[0, 1)` offsetting every sample.
    #[must_use]
    pub fn scatter(&self, camera_position: Vec3, surface: Vec3, jitter: f32) -> f32 {
        let ray = surface - camera_position;
        let ray_len = ray.length();
        if ray_len <= 0.0 {
            return 0.0;
        }
        let dir = ray / ray_len;

        let steps = self.step_count(ray_len);
        let step_len = ray_len / steps as f32;

        let mut scattering = 0.0;
        for i in 0..steps {
            let p = camera_position + dir * ((i as f32 + jitter) * step_len);
            if !self.planes.contains(p) || self.shadow.is_occluded(p) {
                continue;
            }
            let d = p.distance(self.light_position) / self.light_far;
            scattering += self.params.density() * (-self.params.distance_attenuation() * d).exp();
        }

        if self.params.debug_steps() {
            return steps as f32 / self.params.steps().max_steps().max(1) as f32;
        }
        scattering.min(self.params.max_density())
    }
}

// ============================================================================
// Images
// ============================================================================

/// Low-resolution scattering image: `x` = scattering, `y` = linear depth.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterImage {
    width: u32,
    height: u32,
    texels: Vec<Vec2>,
}

impl ScatterImage {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_fn(width, height, |_, _| Vec2::ZERO)
    }

    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Vec2) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Clamp-to-edge load, like `textureLoad` on a clamped coordinate.
    #[must_use]
    pub fn load(&self, x: i32, y: i32) -> Vec2 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.texels[(y * self.width + x) as usize]
    }

    pub fn store(&mut self, x: u32, y: u32, value: Vec2) {
        if x < self.width && y < self.height {
            self.texels[(y * self.width + x) as usize] = value;
        }
    }

    #[must_use]
    pub fn texels(&self) -> &[Vec2] {
        &self.texels
    }
}

// ============================================================================
// Denoise
// ============================================================================

/// Bilateral filter of the scattering channel; depth passes through.
#[must_use]
pub fn bilateral_filter(input: &ScatterImage, kernel: KernelSize, variance: f32) -> ScatterImage {
    let radius = kernel.radius() as i32;
    let sigma = spatial_sigma(kernel);
    let inv_range = 1.0 / (2.0 * variance * variance);
    let inv_spatial = 1.0 / (2.0 * sigma * sigma);

    ScatterImage::from_fn(input.width(), input.height(), |x, y| {
        let (cx, cy) = (x as i32, y as i32);
        let center = input.load(cx, cy);

        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let s = input.load(cx + dx, cy + dy).x;
                let dr = s - center.x;
                let w = (-((dx * dx + dy * dy) as f32) * inv_spatial - dr * dr * inv_range).exp();
                sum += s * w;
                weight_sum += w;
            }
        }
        Vec2::new(sum / weight_sum, center.y)
    })
}

// ============================================================================
// Composite
// ============================================================================

/// Upsamples the scattering channel to `full_width`×`full_height`.
///
/// `linear_depth(x, y)` yields the full-resolution linear view depth. The
/// result is row-major.
#[must_use]
pub fn joint_bilateral_upsample(
    low: &ScatterImage,
    full_width: u32,
    full_height: u32,
    quality: UpsampleQuality,
    linear_depth: impl Fn(u32, u32) -> f32,
) -> Vec<f32> {
    let (footprint, first_tap, tent_radius) = match quality {
        UpsampleQuality::Low => (2, 0, 1.0),
        UpsampleQuality::High => (4, -1, 2.0),
    };
    let lo_dims = Vec2::new(low.width() as f32, low.height() as f32);

    let mut out = Vec::with_capacity(full_width as usize * full_height as usize);
    for y in 0..full_height {
        for x in 0..full_width {
            let uv = Vec2::new(
                (x as f32 + 0.5) / full_width as f32,
                (y as f32 + 0.5) / full_height as f32,
            );
            let z_hi = linear_depth(x, y);
            let lo_pos = uv * lo_dims - 0.5;
            let base = lo_pos.floor();
            let frac = lo_pos - base;

            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for j in 0..footprint {
                for i in 0..footprint {
                    let offset = Vec2::new((i + first_tap) as f32, (j + first_tap) as f32);
                    let s = low.load(
                        base.x as i32 + i + first_tap,
                        base.y as i32 + j + first_tap,
                    );
                    let d = (offset - frac).abs();
                    let spatial = (1.0 - d.x / tent_radius).max(0.0)
                        * (1.0 - d.y / tent_radius).max(0.0);
                    let similarity = (-(s.y - z_hi).abs() / (z_hi * DEPTH_SIGMA)).exp();
                    let w = spatial * similarity;
                    sum += s.x * w;
                    weight_sum += w;
                }
            }

            let value = if weight_sum > 1e-5 {
                sum / weight_sum
            } else {
                let nearest = (lo_pos + 0.5).floor();
                low.load(nearest.x as i32, nearest.y as i32).x
            };
            out.push(value);
        }
    }
    out
}

/// Adds the tinted scattering over one scene color texel.
#[must_use]
pub fn composite_texel(scene: Vec3, scattering: f32, color: Vec3, gamma_correction: bool) -> Vec3 {
    let mut contribution = color * scattering;
    if gamma_correction {
        contribution = contribution.powf(1.0 / 2.2);
    }
    scene + contribution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_hits_box_from_outside() {
        let occluder = Occluder::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = occluder
            .intersect_segment(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -5.0, 0.0))
            .unwrap();
        assert!((t - 0.4).abs() < 1e-5);
        assert!(occluder
            .intersect_segment(Vec3::new(3.0, 5.0, 0.0), Vec3::new(3.0, -5.0, 0.0))
            .is_none());
    }

    #[test]
    fn bilateral_filter_keeps_flat_image() {
        let image = ScatterImage::from_fn(8, 8, |_, _| Vec2::new(0.25, 3.0));
        let filtered = bilateral_filter(&image, KernelSize::Large, 0.1);
        for texel in filtered.texels() {
            assert!((texel.x - 0.25).abs() < 1e-5);
            assert_eq!(texel.y, 3.0);
        }
    }

    #[test]
    fn upsample_of_flat_image_is_flat() {
        let low = ScatterImage::from_fn(4, 4, |_, _| Vec2::new(0.5, 10.0));
        for quality in [UpsampleQuality::Low, UpsampleQuality::High] {
            let full = joint_bilateral_upsample(&low, 8, 8, quality, |_, _| 10.0);
            assert_eq!(full.len(), 64);
            assert!(full.iter().all(|v| (v - 0.5).abs() < 1e-5));
        }
    }

    #[test]
    fn gamma_applies_to_contribution_only() {
        let out = composite_texel(Vec3::splat(0.1), 0.25, Vec3::ONE, true);
        let expected = 0.1 + 0.25_f32.powf(1.0 / 2.2);
        assert!((out.x - expected).abs() < 1e-5);
    }
}
