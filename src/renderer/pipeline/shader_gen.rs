//! Shader Code Generator
//!
//! Renders the WGSL templates with the defines of one pipeline variant.

use std::collections::BTreeMap;

use serde::Serialize;

use super::shader_manager::get_env;

/// Shader compilation options.
///
/// Holds every define a template is rendered with. Defines double as the
/// identity of a pipeline variant: two option sets with equal defines
/// produce the same WGSL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ShaderCompilationOptions {
    defines: BTreeMap<String, String>,
}

impl ShaderCompilationOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_define(&mut self, key: &str, value: &str) {
        self.defines.insert(key.to_string(), value.to_string());
    }

    /// Adds `key` only when `enabled`, for boolean feature switches.
    pub fn add_flag(&mut self, key: &str, enabled: bool) {
        if enabled {
            self.add_define(key, "1");
        }
    }

    #[inline]
    #[must_use]
    pub fn defines(&self) -> &BTreeMap<String, String> {
        &self.defines
    }
}

#[derive(Serialize)]
struct ShaderContext<'a> {
    #[serde(flatten)]
    defines: &'a BTreeMap<String, String>,
}

pub struct ShaderGenerator;

impl ShaderGenerator {
    /// Renders `template_name` with the given defines.
    ///
    /// Templates are compiled into the binary, so a missing template or a
    /// render failure is a programming error.
    #[must_use]
    pub fn generate_shader(template_name: &str, options: &ShaderCompilationOptions) -> String {
        let env = get_env();

        let ctx = ShaderContext {
            defines: &options.defines,
        };

        let template = env
            .get_template(template_name)
            .expect("Shader template not found");

        let source = template.render(&ctx).expect("Shader render failed");

        format!("// === Auto-generated Godrays Shader ({template_name}) ===\n{source}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::uniforms::{CompositorUniforms, IlluminationUniforms, WgslStruct};

    #[test]
    fn flags_only_appear_when_enabled() {
        let mut options = ShaderCompilationOptions::new();
        options.add_flag("DEBUG_STEPS", false);
        options.add_flag("ADAPTIVE_STEPS", true);
        assert!(!options.defines().contains_key("DEBUG_STEPS"));
        assert_eq!(options.defines().get("ADAPTIVE_STEPS").map(String::as_str), Some("1"));
    }

    #[test]
    fn denoise_template_bakes_kernel_radius() {
        let mut options = ShaderCompilationOptions::new();
        options.add_define("KSIZE", "3");
        options.add_define("struct_definitions", "struct DenoiseUniforms { variance: f32, };");
        let source = ShaderGenerator::generate_shader("passes/godrays_denoise", &options);
        assert!(source.contains("const KSIZE: i32 = 3;"));
    }

    fn render(template: &str, defines: &[&str], uniforms: &str) -> String {
        let mut options = ShaderCompilationOptions::new();
        for define in defines {
            options.add_define(define, "1");
        }
        options.add_define("struct_definitions", uniforms);
        ShaderGenerator::generate_shader(template, &options)
    }

    #[test]
    fn depth_textures_are_sampled_not_loaded() {
        let illum = IlluminationUniforms::wgsl_struct_def("IlluminationUniforms");
        let composite = CompositorUniforms::wgsl_struct_def("CompositorUniforms");
        let sources = [
            render("passes/godrays_illum", &["IS_DIRECTIONAL_LIGHT"], &illum),
            render("passes/godrays_illum", &["IS_POINT_LIGHT", "ADAPTIVE_STEPS"], &illum),
            render("passes/godrays_composite", &["UPSAMPLE_QUALITY_HIGH"], &composite),
            render("passes/depth_blit", &[], ""),
        ];

        for source in &sources {
            for depth in ["scene_depth", "shadow_map", "source_depth"] {
                assert!(
                    !source.contains(&format!("textureLoad({depth}")),
                    "{depth} is loaded in:\n{source}"
                );
            }
        }
        assert!(sources[0].contains("textureSampleLevel(scene_depth, depth_sampler"));
        assert!(sources[0].contains("textureSampleLevel(shadow_map, depth_sampler"));
        assert!(sources[2].contains("textureSampleLevel(scene_depth, depth_sampler"));
        assert!(sources[3].contains("textureSampleLevel(source_depth, source_sampler"));
    }

    #[test]
    fn adaptive_step_count_keeps_the_texel_lower_bound() {
        let illum = IlluminationUniforms::wgsl_struct_def("IlluminationUniforms");
        let source = render("passes/godrays_illum", &["IS_DIRECTIONAL_LIGHT", "ADAPTIVE_STEPS"], &illum);
        assert!(source.contains("u32(max(by_length, by_texel))"));
    }
}
