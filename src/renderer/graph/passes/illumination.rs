//! Godrays Illumination Pass
//!
//! Raymarches from the camera toward each scene surface at low resolution and
//! accumulates in-scattered light wherever the light's shadow map sees the
//! sample. Output is `Rg16Float`: scattering in `r`, linear view depth in `g`
//! (the guide the compositor upsamples with).
//!
//! # Variants
//!
//! The light type is fixed per pass instance and selects the shadow lookup
//! (`IS_POINT_LIGHT` cube vs `IS_DIRECTIONAL_LIGHT` 2-D). Stepping mode and
//! the step-count heatmap are compile-time switches:
//!
//! | Define | Source |
//! |--------|--------|
//! | `ADAPTIVE_STEPS` | `StepMode::Adaptive` |
//! | `DEBUG_STEPS` | `debug_steps` |
//!
//! Pipelines are cached per variant, so toggling back and forth compiles once.
//!
//! # Shadow readiness
//!
//! Until a shadow view is wired into the frame the pass only clears its target,
//! which the compositor turns into a zero contribution.

use glam::Vec2;
use rustc_hash::FxHashMap;

use crate::renderer::core::{BindGroupKey, CachedBindGroup, Tracked};
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::targets::SCATTERING_FORMAT;
use crate::renderer::pipeline::{
    FullscreenPipelineDesc, ShaderCompilationOptions, create_fullscreen_pipeline, replace_target,
};
use crate::resources::godrays::StepMode;
use crate::resources::uniform_slot::UniformSlot;
use crate::resources::uniforms::{IlluminationUniforms, WgslStruct};
use crate::scene::light::LightKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct IlluminationVariant {
    adaptive: bool,
    debug_steps: bool,
}

impl IlluminationUniforms {
    /// Gathers the raymarch inputs of the current frame.
    pub(crate) fn from_frame(ctx: &PrepareContext) -> Self {
        let params = ctx.params;
        let camera = ctx.camera;
        let resources = ctx.resources;

        let (light_near, light_far) = ctx
            .light
            .shadow
            .as_ref()
            .map_or((0.1, 1000.0), |s| (s.camera.near, s.camera.far));
        // half a shadow texel: depth bias and the adaptive step floor
        let map_size = ctx.light.shadow_map().map_or(1, |map| map.size.max(1));
        let texel_size = 1.0 / (map_size as f32 * 2.0);

        let (step_size, min_steps, max_steps, fixed_steps) = match params.steps() {
            StepMode::Fixed(steps) => (1.0, steps, steps, steps),
            StepMode::Adaptive(adaptive) => {
                (adaptive.step_size, adaptive.min(), adaptive.max(), adaptive.max())
            }
        };

        Self {
            camera_projection_inverse: camera.projection_matrix_inverse(),
            camera_world: camera.world_matrix(),
            light_view_proj: ctx.geometry.light_space_matrix(),
            light_position: ctx.light.position,
            density: params.density(),
            camera_position: camera.position(),
            max_density: params.max_density(),
            resolution: resources.low_res.as_vec2(),
            noise_resolution: Vec2::new(
                resources.noise_size.0.max(1) as f32,
                resources.noise_size.1.max(1) as f32,
            ),
            distance_attenuation: params.distance_attenuation(),
            light_near,
            light_far,
            texel_size,
            step_size,
            min_steps,
            max_steps,
            fixed_steps,
            planes: ctx.geometry.planes().to_uniform(),
        }
    }
}

pub struct IlluminationPass {
    // === GPU Resources ===
    /// [uniforms, scene depth, shadow map, blue noise, sampler]
    layout: Tracked<wgpu::BindGroupLayout>,
    /// Nearest, non-filtering. All depth reads are samples: GLSL has no
    /// `textureLoad` for depth textures.
    sampler: Tracked<wgpu::Sampler>,
    uniforms: UniformSlot<IlluminationUniforms>,

    // === Cache State ===
    light_define: &'static str,
    pipelines: FxHashMap<IlluminationVariant, wgpu::RenderPipeline>,
    bind_group: CachedBindGroup,

    // === Runtime State ===
    current_variant: Option<IlluminationVariant>,
    bound_shadow: Option<u64>,
}

impl IlluminationPass {
    #[must_use]
    pub fn new(device: &wgpu::Device, light: &LightKind) -> Self {
        let shadow_dimension = if light.is_point() {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };

        let entries = [
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: shadow_dimension,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ];

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Godrays Illumination Layout"),
            entries: &entries,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Godrays Depth Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Self {
            layout: Tracked::new(layout),
            sampler: Tracked::new(sampler),
            uniforms: UniformSlot::new(IlluminationUniforms::default(), "Godrays Illumination Uniforms"),
            light_define: light.define_key(),
            pipelines: FxHashMap::default(),
            bind_group: CachedBindGroup::default(),
            current_variant: None,
            bound_shadow: None,
        }
    }

    fn ensure_pipeline(&mut self, ctx: &mut PrepareContext, variant: IlluminationVariant) {
        if self.pipelines.contains_key(&variant) {
            return;
        }

        log::debug!(
            "Compiling godrays illumination pipeline {variant:?} ({})",
            self.light_define
        );

        let mut options = ShaderCompilationOptions::new();
        options.add_define(self.light_define, "1");
        options.add_flag("ADAPTIVE_STEPS", variant.adaptive);
        options.add_flag("DEBUG_STEPS", variant.debug_steps);
        options.add_define(
            "struct_definitions",
            &IlluminationUniforms::wgsl_struct_def("IlluminationUniforms"),
        );

        let (module, _) =
            ctx.shader_manager
                .get_or_compile_template(ctx.device, "passes/godrays_illum", &options);

        let pipeline = create_fullscreen_pipeline(
            ctx.device,
            &FullscreenPipelineDesc {
                label: "Godrays Illumination Pipeline",
                module,
                bind_group_layouts: &[&self.layout],
                color_target: replace_target(SCATTERING_FORMAT),
                depth_stencil: None,
            },
        );
        self.pipelines.insert(variant, pipeline);
    }

    /// Id of the shadow view bound for the raymarch, `None` while clearing.
    #[inline]
    #[must_use]
    pub fn bound_shadow(&self) -> Option<u64> {
        self.bound_shadow
    }

    /// Forces a uniform re-upload and a bind group rebuild on the next prepare.
    pub fn invalidate(&mut self) {
        self.uniforms.mark_dirty();
        self.bind_group.invalidate();
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn release(&mut self) {
        self.pipelines.clear();
        self.bind_group.invalidate();
        self.uniforms.release();
        self.current_variant = None;
        self.bound_shadow = None;
    }
}

impl RenderNode for IlluminationPass {
    fn name(&self) -> &'static str {
        "Godrays Illumination Pass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        // =====================================================================
        // 1. Uniforms (uploaded only when the bytes changed)
        // =====================================================================
        self.uniforms.set(IlluminationUniforms::from_frame(ctx));
        self.uniforms.sync(ctx.device, ctx.queue);

        let Some(shadow) = ctx.resources.shadow else {
            self.current_variant = None;
            self.bound_shadow = None;
            return;
        };

        // =====================================================================
        // 2. Pipeline variant
        // =====================================================================
        let variant = IlluminationVariant {
            adaptive: ctx.params.steps().is_adaptive(),
            debug_steps: ctx.params.debug_steps(),
        };
        self.ensure_pipeline(ctx, variant);
        self.current_variant = Some(variant);

        // =====================================================================
        // 3. Bind group
        // =====================================================================
        let Some(buffer) = self.uniforms.buffer() else {
            return;
        };
        let scene_depth = ctx.resources.scene_depth;
        let noise = ctx.resources.noise;

        let key = BindGroupKey::new(self.layout.id())
            .with_resource(buffer.id())
            .with_resource(scene_depth.id())
            .with_resource(shadow.id())
            .with_resource(noise.id())
            .with_resource(self.sampler.id());

        let device = ctx.device;
        let layout = &self.layout;
        let sampler = &self.sampler;
        self.bind_group.get_or_build(key, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Godrays Illumination BindGroup"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(scene_depth),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(shadow),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(noise),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            })
        });
        self.bound_shadow = Some(shadow.id());
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let raymarch = self
            .current_variant
            .and_then(|variant| self.pipelines.get(&variant))
            .zip(self.bind_group.get());

        // Without a shadow map the cleared target is the whole result.
        let load = if raymarch.is_some() {
            wgpu::LoadOp::DontCare(wgpu::LoadOpDontCare::default())
        } else {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Godrays Illumination Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.resources.scattering,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });

        if let Some((pipeline, bind_group)) = raymarch {
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}
