//! GPU Uniform Blocks
//!
//! Each pass owns one uniform block. The Rust struct is the single source of
//! truth: [`define_uniform_struct!`] generates the `#[repr(C)]` Pod type, its
//! `Default`, and the matching WGSL `struct` declaration that is injected into
//! the shader templates through the `struct_definitions` define.
//!
//! Blocks are laid out by hand so that no implicit padding exists (bytemuck
//! rejects padded `Pod` types) and every `vec3` starts on a 16-byte boundary
//! followed by a scalar.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::borrow::Cow;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

// ============================================================================
// Rust type -> WGSL type name
// ============================================================================

pub trait WgslType {
    fn wgsl_type_name() -> Cow<'static, str>;

    fn collect_wgsl_defs(_defs: &mut Vec<String>, _inserted: &mut HashSet<String>) {}
}

impl WgslType for f32 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "f32".into()
    }
}
impl WgslType for u32 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "u32".into()
    }
}
impl WgslType for Vec2 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "vec2<f32>".into()
    }
}
impl WgslType for Vec3 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "vec3<f32>".into()
    }
}
impl WgslType for Vec4 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "vec4<f32>".into()
    }
}
impl WgslType for Mat4 {
    fn wgsl_type_name() -> Cow<'static, str> {
        "mat4x4<f32>".into()
    }
}

/// Fixed-size array usable as a uniform field (`array<T, N>` in WGSL).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformArray<T: Pod, const N: usize>(pub [T; N]);

// SAFETY: `#[repr(transparent)]` over `[T; N]` with `T: Pod`.
unsafe impl<T: Pod, const N: usize> Zeroable for UniformArray<T, N> {}
unsafe impl<T: Pod, const N: usize> Pod for UniformArray<T, N> {}

impl<T: WgslType + Pod, const N: usize> WgslType for UniformArray<T, N> {
    fn wgsl_type_name() -> Cow<'static, str> {
        format!("array<{}, {}>", T::wgsl_type_name(), N).into()
    }

    fn collect_wgsl_defs(defs: &mut Vec<String>, inserted: &mut HashSet<String>) {
        T::collect_wgsl_defs(defs, inserted);
    }
}

impl<T: Default + Pod, const N: usize> Default for UniformArray<T, N> {
    fn default() -> Self {
        Self([T::default(); N])
    }
}

impl<T: Pod, const N: usize> Deref for UniformArray<T, N> {
    type Target = [T; N];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Pod, const N: usize> DerefMut for UniformArray<T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Pod, const N: usize> From<[T; N]> for UniformArray<T, N> {
    fn from(arr: [T; N]) -> Self {
        Self(arr)
    }
}

/// A top-level uniform block with a generated WGSL declaration.
pub trait WgslStruct: Pod + Zeroable {
    fn wgsl_struct_def(struct_name: &str) -> String;
}

// ============================================================================
// Struct generator
// ============================================================================

/// Declares a uniform block. Fields starting with `__` are padding and are
/// left out of the WGSL declaration.
macro_rules! define_uniform_struct {
    (
        $(#[$meta:meta])* struct $name:ident {
            $(
                $vis:vis $field_name:ident : $field_type:ty $(= $default_val:expr)?
            ),* $(,)?
        }
    ) => {
        #[repr(C)]
        #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        $(#[$meta])*
        pub struct $name {
            $( $vis $field_name : $field_type, )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field_name: define_uniform_struct!(@val_or_default $field_type $(, $default_val)?), )*
                }
            }
        }

        impl $crate::resources::uniforms::WgslStruct for $name {
            fn wgsl_struct_def(struct_name: &str) -> String {
                let mut defs = Vec::new();
                let mut inserted = std::collections::HashSet::new();
                $(
                    <$field_type as $crate::resources::uniforms::WgslType>::collect_wgsl_defs(
                        &mut defs,
                        &mut inserted,
                    );
                )*

                let mut code = format!("struct {struct_name} {{\n");
                $(
                    if !stringify!($field_name).starts_with("__") {
                        code.push_str(&format!(
                            "    {}: {},\n",
                            stringify!($field_name),
                            <$field_type as $crate::resources::uniforms::WgslType>::wgsl_type_name()
                        ));
                    }
                )*
                code.push_str("};\n");

                defs.push(code);
                defs.join("\n")
            }
        }
    };

    (@val_or_default $type:ty, $val:expr) => { $val };
    (@val_or_default $type:ty) => { <$type as Default>::default() };
}

// ============================================================================
// Pass uniform blocks
// ============================================================================

define_uniform_struct!(
    /// Illumination (raymarch) pass, 368 bytes.
    struct IlluminationUniforms {
        pub camera_projection_inverse: Mat4 = Mat4::IDENTITY,
        pub camera_world: Mat4 = Mat4::IDENTITY,
        pub light_view_proj: Mat4 = Mat4::IDENTITY,

        pub light_position: Vec3 = Vec3::ZERO,
        pub density: f32 = 1.0 / 128.0,

        pub camera_position: Vec3 = Vec3::ZERO,
        pub max_density: f32 = 0.5,

        pub resolution: Vec2 = Vec2::ONE,
        pub noise_resolution: Vec2 = Vec2::ONE,

        pub distance_attenuation: f32 = 2.0,
        pub light_near: f32 = 0.1,
        pub light_far: f32 = 1000.0,
        pub texel_size: f32 = 1.0 / 2048.0,

        pub step_size: f32 = 1.0,
        pub min_steps: u32 = 8,
        pub max_steps: u32 = 60,
        pub fixed_steps: u32 = 60,

        pub planes: UniformArray<Vec4, 6>,
    }
);

define_uniform_struct!(
    /// Bilateral denoise pass, 16 bytes.
    struct DenoiseUniforms {
        pub texel_size: Vec2 = Vec2::ONE,
        pub variance: f32 = 0.1,
        pub spatial_sigma: f32 = 1.0,
    }
);

define_uniform_struct!(
    /// Joint bilateral upsample / composite pass, 48 bytes.
    struct CompositorUniforms {
        pub color: Vec3 = Vec3::ONE,
        pub gamma_correction: u32 = 1,

        pub low_res_size: Vec2 = Vec2::ONE,
        pub full_size: Vec2 = Vec2::ONE,

        pub camera_near: f32 = 0.1,
        pub camera_far: f32 = 1000.0,
        pub depth_sigma: f32 = 0.1,
        pub(crate) __padding: f32,
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn blocks_are_16_byte_multiples() {
        assert_eq!(mem::size_of::<IlluminationUniforms>(), 368);
        assert_eq!(mem::size_of::<DenoiseUniforms>(), 16);
        assert_eq!(mem::size_of::<CompositorUniforms>(), 48);
    }

    #[test]
    fn padding_fields_are_hidden_from_wgsl() {
        let wgsl = CompositorUniforms::wgsl_struct_def("CompositorUniforms");
        assert!(wgsl.starts_with("struct CompositorUniforms {"));
        assert!(wgsl.contains("depth_sigma: f32"));
        assert!(!wgsl.contains("__padding"));
    }

    #[test]
    fn arrays_render_with_length() {
        let wgsl = IlluminationUniforms::wgsl_struct_def("Uniforms");
        assert!(wgsl.contains("planes: array<vec4<f32>, 6>"));
        assert!(wgsl.contains("light_view_proj: mat4x4<f32>"));
    }
}
