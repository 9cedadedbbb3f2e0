//! Godrays Compositor Pass
//!
//! Joint bilateral upsample of the low-resolution scattering, guided by
//! full-resolution scene depth, blended additively over the scene color.
//!
//! # Data Flow
//!
//! ```text
//! scene color ─┐
//! scene depth ─┼─> CompositorPass ─> output (screen or intermediate)
//! scattering  ─┘   (raw or denoised, chosen by the frame plan)
//! ```
//!
//! Pipelines are cached by `(upsample quality, output format, debug)`.

use rustc_hash::FxHashMap;

use crate::renderer::core::{BindGroupKey, CachedBindGroup, Tracked};
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::pipeline::{
    FullscreenPipelineDesc, ShaderCompilationOptions, create_fullscreen_pipeline, replace_target,
};
use crate::resources::godrays::UpsampleQuality;
use crate::resources::uniform_slot::UniformSlot;
use crate::resources::uniforms::{CompositorUniforms, WgslStruct};

/// Relative depth tolerance of the upsample weights.
pub(crate) const DEPTH_SIGMA: f32 = 0.1;

type PipelineCacheKey = (UpsampleQuality, wgpu::TextureFormat, bool);

/// Ids of the three textures the compositor read in its last prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeInputs {
    pub scene_color: u64,
    pub scene_depth: u64,
    pub scattering: u64,
}

pub struct CompositorPass {
    /// [uniforms, scene color, scene depth, scattering, depth sampler]
    layout: Tracked<wgpu::BindGroupLayout>,
    depth_sampler: Tracked<wgpu::Sampler>,
    uniforms: UniformSlot<CompositorUniforms>,

    local_cache: FxHashMap<PipelineCacheKey, wgpu::RenderPipeline>,
    bind_group: CachedBindGroup,

    current_key: Option<PipelineCacheKey>,
    inputs: Option<CompositeInputs>,
}

impl CompositorPass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let texture_entry = |binding: u32, sample_type: wgpu::TextureSampleType| {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }
        };
        let unfilterable = wgpu::TextureSampleType::Float { filterable: false };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Godrays Compositor Layout"),
            entries: &[
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
                texture_entry(1, unfilterable),
                texture_entry(2, wgpu::TextureSampleType::Depth),
                texture_entry(3, unfilterable),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let depth_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Godrays Compositor Depth Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Self {
            layout: Tracked::new(layout),
            depth_sampler: Tracked::new(depth_sampler),
            uniforms: UniformSlot::new(CompositorUniforms::default(), "Godrays Compositor Uniforms"),
            local_cache: FxHashMap::default(),
            bind_group: CachedBindGroup::default(),
            current_key: None,
            inputs: None,
        }
    }

    fn ensure_pipeline(&mut self, ctx: &mut PrepareContext, key: PipelineCacheKey) {
        if self.local_cache.contains_key(&key) {
            return;
        }
        let (quality, format, debug_steps) = key;

        log::debug!(
            "Compiling godrays compositor pipeline for {quality:?}, format {format:?}, debug {debug_steps}"
        );

        let mut options = ShaderCompilationOptions::new();
        options.add_define(quality.define_key(), "1");
        options.add_flag("DEBUG_STEPS", debug_steps);
        options.add_define(
            "struct_definitions",
            &CompositorUniforms::wgsl_struct_def("CompositorUniforms"),
        );

        let (module, _) =
            ctx.shader_manager
                .get_or_compile_template(ctx.device, "passes/godrays_composite", &options);

        let pipeline = create_fullscreen_pipeline(
            ctx.device,
            &FullscreenPipelineDesc {
                label: "Godrays Compositor Pipeline",
                module,
                bind_group_layouts: &[&self.layout],
                color_target: replace_target(format),
                depth_stencil: None,
            },
        );
        self.local_cache.insert(key, pipeline);
    }

    /// Textures consumed by the last prepared frame.
    #[inline]
    #[must_use]
    pub fn inputs(&self) -> Option<CompositeInputs> {
        self.inputs
    }

    pub fn invalidate(&mut self) {
        self.uniforms.mark_dirty();
        self.bind_group.invalidate();
    }

    pub fn release(&mut self) {
        self.local_cache.clear();
        self.bind_group.invalidate();
        self.uniforms.release();
        self.current_key = None;
        self.inputs = None;
    }
}

impl RenderNode for CompositorPass {
    fn name(&self) -> &'static str {
        "Godrays Compositor Pass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        let params = ctx.params;
        let resources = ctx.resources;

        // near/far are re-read every frame; the host may change them freely
        self.uniforms.set(CompositorUniforms {
            color: params.color(),
            gamma_correction: u32::from(params.gamma_correction()),
            low_res_size: resources.low_res.as_vec2(),
            full_size: resources.full.as_vec2(),
            camera_near: ctx.camera.near,
            camera_far: ctx.camera.far,
            depth_sigma: DEPTH_SIGMA,
            __padding: 0.0,
        });
        self.uniforms.sync(ctx.device, ctx.queue);

        let key = (
            params.upsample_quality(),
            resources.output.format,
            params.debug_steps(),
        );
        self.ensure_pipeline(ctx, key);
        self.current_key = Some(key);

        let Some(buffer) = self.uniforms.buffer() else {
            return;
        };
        let scene_color = resources.scene_color;
        let scene_depth = resources.scene_depth;
        let scattering = resources.composite_input();

        let bind_key = BindGroupKey::new(self.layout.id())
            .with_resource(buffer.id())
            .with_resource(scene_color.id())
            .with_resource(scene_depth.id())
            .with_resource(scattering.id())
            .with_resource(self.depth_sampler.id());

        let device = ctx.device;
        let layout = &self.layout;
        let depth_sampler = &self.depth_sampler;
        self.bind_group.get_or_build(bind_key, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Godrays Compositor BindGroup"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(scene_color),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(scene_depth),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(scattering),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(depth_sampler),
                    },
                ],
            })
        });

        self.inputs = Some(CompositeInputs {
            scene_color: scene_color.id(),
            scene_depth: scene_depth.id(),
            scattering: scattering.id(),
        });
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let Some(pipeline) = self.current_key.and_then(|key| self.local_cache.get(&key)) else {
            return;
        };
        let Some(bind_group) = self.bind_group.get() else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Godrays Compositor Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: ctx.resources.output.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::DontCare(wgpu::LoadOpDontCare::default()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
