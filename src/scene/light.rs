use glam::{Mat4, Vec3};

use crate::renderer::core::Tracked;

/// Texture-to-texture copies require identical formats on both ends.
const COPY_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ============================================================================
// Shadow camera
// ============================================================================

/// The camera the external shadow system renders the light's depth with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCamera {
    pub projection: Mat4,
    /// World-to-light transform (inverse of the camera's world matrix).
    pub view: Mat4,
    pub near: f32,
    pub far: f32,
}

impl ShadowCamera {
    /// Orthographic camera for a directional light, looking from `position`
    /// toward `target` and covering `half_extent` units on each side.
    #[must_use]
    pub fn orthographic(position: Vec3, target: Vec3, half_extent: f32, near: f32, far: f32) -> Self {
        let up = if (target - position).normalize_or_zero().abs().y > 0.99 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        Self {
            projection: Mat4::orthographic_rh(
                -half_extent,
                half_extent,
                -half_extent,
                half_extent,
                near,
                far,
            ),
            view: Mat4::look_at_rh(position, target, up),
            near,
            far,
        }
    }

    /// 90° camera for one face of a point light's cube map.
    #[must_use]
    pub fn cube(position: Vec3, near: f32, far: f32) -> Self {
        Self {
            projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far),
            view: Mat4::from_translation(-position),
            near,
            far,
        }
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// View matrix of cube layer `face` around `position`.
    ///
    /// Cube maps are addressed left-handed, so the depth lookup mirrors z and
    /// layers 4/5 look down world -Z/+Z respectively.
    #[must_use]
    pub fn cube_face_view(position: Vec3, face: usize) -> Mat4 {
        let (forward, up) = match face {
            0 => (Vec3::X, Vec3::Y),
            1 => (Vec3::NEG_X, Vec3::Y),
            2 => (Vec3::Y, Vec3::Z),
            3 => (Vec3::NEG_Y, Vec3::NEG_Z),
            4 => (Vec3::NEG_Z, Vec3::Y),
            _ => (Vec3::Z, Vec3::Y),
        };
        Mat4::look_to_rh(position, forward, up)
    }
}

// ============================================================================
// Shadow map
// ============================================================================

/// A depth texture produced by the external shadow system.
///
/// Directional lights use a 2-D texture; point lights a 6-layer cube.
/// The host bumps [`version`](Self::version) each time it re-renders the map.
#[derive(Debug, Clone)]
pub struct ShadowMap {
    pub texture: wgpu::Texture,
    pub view: Tracked<wgpu::TextureView>,
    pub size: u32,
    pub format: wgpu::TextureFormat,
    /// Comparison function configured by the host for this map, if any.
    pub compare: Option<wgpu::CompareFunction>,
    pub version: u64,
}

impl ShadowMap {
    /// Wraps an existing depth texture. 6-layer textures are viewed as cubes.
    #[must_use]
    pub fn from_texture(texture: wgpu::Texture, compare: Option<wgpu::CompareFunction>) -> Self {
        let dimension = if texture.depth_or_array_layers() == 6 {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Shadow Map View"),
            dimension: Some(dimension),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });
        Self {
            size: texture.height(),
            format: texture.format(),
            texture,
            view: Tracked::new(view),
            compare,
            version: 0,
        }
    }

    /// Allocates an empty shadow map that can be rendered to, sampled and copied.
    #[must_use]
    pub fn allocate(
        device: &wgpu::Device,
        size: u32,
        cube: bool,
        format: wgpu::TextureFormat,
        compare: Option<wgpu::CompareFunction>,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: if cube { 6 } else { 1 },
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self::from_texture(texture, compare)
    }

    /// Records that the host rendered new depth into the map.
    pub fn mark_updated(&mut self) {
        self.version += 1;
    }

    #[inline]
    #[must_use]
    pub fn is_cube(&self) -> bool {
        self.texture.depth_or_array_layers() == 6
    }

    #[inline]
    #[must_use]
    pub fn layers(&self) -> u32 {
        self.texture.depth_or_array_layers()
    }

    /// Whether the map must be copied before the raymarch can read it.
    #[inline]
    #[must_use]
    pub fn requires_compat_copy(&self) -> bool {
        self.compare.is_some()
    }

    /// Whether a plain texture copy into `Depth32Float` is possible.
    #[must_use]
    pub fn supports_texture_copy(&self) -> bool {
        self.format == COPY_TARGET_FORMAT
            && self.texture.usage().contains(wgpu::TextureUsages::COPY_SRC)
    }
}

#[derive(Debug, Clone)]
pub struct LightShadow {
    pub camera: ShadowCamera,
    /// `None` until the shadow system has rendered the first map.
    pub map: Option<ShadowMap>,
}

// ============================================================================
// Light
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub target: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointLight {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional(DirectionalLight),
    Point(PointLight),
}

impl LightKind {
    #[inline]
    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point(_))
    }

    /// Shader define selecting the shadow lookup.
    #[must_use]
    pub(crate) fn define_key(&self) -> &'static str {
        match self {
            Self::Directional(_) => "IS_DIRECTIONAL_LIGHT",
            Self::Point(_) => "IS_POINT_LIGHT",
        }
    }
}

/// The single light a pipeline instance renders scattering for.
#[derive(Debug, Clone)]
pub struct LightSource {
    pub kind: LightKind,
    /// World-space position.
    pub position: Vec3,
    pub shadow: Option<LightShadow>,
}

impl LightSource {
    /// Shadow-casting point light with a cube shadow camera.
    #[must_use]
    pub fn point(position: Vec3, shadow_near: f32, shadow_far: f32) -> Self {
        Self {
            kind: LightKind::Point(PointLight {}),
            position,
            shadow: Some(LightShadow {
                camera: ShadowCamera::cube(position, shadow_near, shadow_far),
                map: None,
            }),
        }
    }

    /// Shadow-casting directional light shining from `position` toward `target`.
    #[must_use]
    pub fn directional(position: Vec3, target: Vec3, half_extent: f32, near: f32, far: f32) -> Self {
        Self {
            kind: LightKind::Directional(DirectionalLight { target }),
            position,
            shadow: Some(LightShadow {
                camera: ShadowCamera::orthographic(position, target, half_extent, near, far),
                map: None,
            }),
        }
    }

    /// Light without shadow casting. Rejected by the pipeline.
    #[must_use]
    pub fn without_shadow(mut self) -> Self {
        self.shadow = None;
        self
    }

    #[inline]
    #[must_use]
    pub fn casts_shadow(&self) -> bool {
        self.shadow.is_some()
    }

    #[inline]
    #[must_use]
    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow.as_ref().and_then(|s| s.map.as_ref())
    }

    /// Moves the light, keeping the shadow camera attached.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        let Some(shadow) = self.shadow.as_mut() else {
            return;
        };
        shadow.camera = match self.kind {
            LightKind::Point(_) => ShadowCamera::cube(position, shadow.camera.near, shadow.camera.far),
            LightKind::Directional(DirectionalLight { target }) => {
                let half_extent = 1.0 / shadow.camera.projection.x_axis.x;
                ShadowCamera::orthographic(
                    position,
                    target,
                    half_extent,
                    shadow.camera.near,
                    shadow.camera.far,
                )
            }
        };
    }

    /// Installs or replaces the shadow map (called by the shadow system).
    pub fn set_shadow_map(&mut self, map: ShadowMap) {
        if let Some(shadow) = self.shadow.as_mut() {
            shadow.map = Some(map);
        }
    }
}
