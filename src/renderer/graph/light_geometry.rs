//! Light Geometry
//!
//! Bounds the region in which the raymarch may accumulate scattering and
//! provides the matrix that maps world positions into shadow space.
//!
//! Every variant produces exactly six planes with inward normals: a point `p`
//! lies inside the volume when `dot(n, p) + c >= 0` holds for all of them.
//!
//! | Light | Volume |
//! |-------|--------|
//! | Point | axis-aligned cube of half-size `shadow.far` centered on the light |
//! | Directional | frustum of the shadow camera's `projection * view` |

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use crate::errors::{GodraysError, Result};
use crate::resources::uniforms::UniformArray;
use crate::scene::light::{
    DirectionalLight, LightKind, LightSource, PointLight, ShadowCamera,
};

// ============================================================================
// Planes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    /// Plane through `point` with (normalized) `normal`.
    #[must_use]
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            constant: -normal.dot(point),
        }
    }

    /// Normalizes a raw `(a, b, c, d)` plane equation.
    #[must_use]
    pub fn from_equation(eq: Vec4) -> Self {
        let length = eq.xyz().length();
        Self {
            normal: eq.xyz() / length,
            constant: eq.w / length,
        }
    }

    /// Signed distance, positive on the side the normal points to.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    #[inline]
    #[must_use]
    pub fn to_vec4(self) -> Vec4 {
        self.normal.extend(self.constant)
    }
}

/// Fixed arena of the six bounding planes, rewritten in place.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipPlanes(pub [Plane; 6]);

impl ClipPlanes {
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        self.0.iter().all(|p| p.distance_to_point(point) >= 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plane> {
        self.0.iter()
    }

    #[must_use]
    pub fn to_uniform(&self) -> UniformArray<Vec4, 6> {
        UniformArray(self.0.map(Plane::to_vec4))
    }
}

// ============================================================================
// ShadowVolume
// ============================================================================

/// Per-light-type geometry. Implemented once for each light variant.
pub trait ShadowVolume {
    /// Writes the six inward-facing bounding planes into `planes`.
    fn write_clip_planes(&self, position: Vec3, camera: &ShadowCamera, planes: &mut ClipPlanes);

    /// World to shadow clip space.
    fn light_space_matrix(&self, camera: &ShadowCamera) -> Mat4 {
        camera.view_projection()
    }
}

impl ShadowVolume for PointLight {
    fn write_clip_planes(&self, position: Vec3, camera: &ShadowCamera, planes: &mut ClipPlanes) {
        const AXES: [Vec3; 6] = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for (plane, axis) in planes.0.iter_mut().zip(AXES) {
            *plane = Plane::from_normal_and_point(-axis, position + axis * camera.far);
        }
    }
}

impl ShadowVolume for DirectionalLight {
    fn write_clip_planes(&self, _position: Vec3, camera: &ShadowCamera, planes: &mut ClipPlanes) {
        // Gribb-Hartmann extraction; wgpu clip depth is 0..1 so near is row 2 alone.
        let m = camera.view_projection();
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let equations = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[2],           // near
            rows[3] - rows[2], // far
        ];
        for (plane, eq) in planes.0.iter_mut().zip(equations) {
            *plane = Plane::from_equation(eq);
        }
    }
}

impl ShadowVolume for LightKind {
    fn write_clip_planes(&self, position: Vec3, camera: &ShadowCamera, planes: &mut ClipPlanes) {
        match self {
            Self::Point(light) => light.write_clip_planes(position, camera, planes),
            Self::Directional(light) => light.write_clip_planes(position, camera, planes),
        }
    }

    fn light_space_matrix(&self, camera: &ShadowCamera) -> Mat4 {
        match self {
            Self::Point(light) => light.light_space_matrix(camera),
            Self::Directional(light) => light.light_space_matrix(camera),
        }
    }
}

// ============================================================================
// LightGeometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct GeometryKey {
    kind: LightKind,
    position: Vec3,
    camera: ShadowCamera,
}

/// Cached clip planes and light matrix for the pipeline's light.
#[derive(Debug, Default)]
pub struct LightGeometry {
    planes: ClipPlanes,
    light_matrix: Mat4,
    key: Option<GeometryKey>,
    recomputes: u64,
}

impl LightGeometry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refreshes the cache if the light moved or its shadow camera changed.
    ///
    /// Returns `true` when the planes were recomputed.
    pub fn update(&mut self, light: &LightSource) -> Result<bool> {
        let shadow = light.shadow.as_ref().ok_or(GodraysError::LightWithoutShadow)?;
        let key = GeometryKey {
            kind: light.kind,
            position: light.position,
            camera: shadow.camera,
        };
        if self.key == Some(key) {
            return Ok(false);
        }

        light
            .kind
            .write_clip_planes(light.position, &shadow.camera, &mut self.planes);
        self.light_matrix = light.kind.light_space_matrix(&shadow.camera);
        self.key = Some(key);
        self.recomputes += 1;
        Ok(true)
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &ClipPlanes {
        &self.planes
    }

    #[inline]
    #[must_use]
    pub fn light_space_matrix(&self) -> Mat4 {
        self.light_matrix
    }

    /// How many times the planes have been rebuilt.
    #[inline]
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}
