//! Godrays Denoise Pass
//!
//! Edge-preserving bilateral filter over the low-resolution scattering
//! target. The kernel radius is a compile-time constant (`KSIZE`), so a
//! kernel change rebuilds the pipeline while a variance change is a uniform
//! update only. The linear depth channel passes through untouched.

use crate::renderer::core::{BindGroupKey, CachedBindGroup, Tracked};
use crate::renderer::graph::context::{ExecuteContext, PrepareContext};
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::targets::SCATTERING_FORMAT;
use crate::renderer::pipeline::{
    FullscreenPipelineDesc, ShaderCompilationOptions, create_fullscreen_pipeline, replace_target,
};
use crate::resources::godrays::{BlurParams, KernelSize};
use crate::resources::uniform_slot::UniformSlot;
use crate::resources::uniforms::{DenoiseUniforms, WgslStruct};

/// What a blur parameter change requires from the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenoiseChange {
    None,
    /// Variance changed: rewrite the uniform block.
    Uniform,
    /// Kernel changed (or first use): rebuild the pipeline.
    Rebuild,
}

/// Tracks the blur configuration the current pipeline was built for.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoiseState {
    kernel: Option<KernelSize>,
    variance: f32,
    generation: u64,
}

impl DenoiseState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts `blur` and reports what must be redone.
    pub fn reconcile(&mut self, blur: &BlurParams) -> DenoiseChange {
        if self.kernel != Some(blur.kernel_size) {
            self.kernel = Some(blur.kernel_size);
            self.variance = blur.variance;
            self.generation += 1;
            return DenoiseChange::Rebuild;
        }
        if self.variance.to_bits() != blur.variance.to_bits() {
            self.variance = blur.variance;
            return DenoiseChange::Uniform;
        }
        DenoiseChange::None
    }

    #[inline]
    #[must_use]
    pub fn kernel(&self) -> Option<KernelSize> {
        self.kernel
    }

    /// Bumped on every pipeline rebuild.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reset(&mut self) {
        self.kernel = None;
    }
}

/// Spatial standard deviation in texels for a kernel radius.
pub(crate) fn spatial_sigma(kernel: KernelSize) -> f32 {
    (kernel.radius() as f32 * 0.5).max(1.0)
}

pub struct DenoisePass {
    /// [uniforms, input]
    layout: Tracked<wgpu::BindGroupLayout>,
    uniforms: UniformSlot<DenoiseUniforms>,

    state: DenoiseState,
    pipeline: Option<wgpu::RenderPipeline>,
    bind_group: CachedBindGroup,
}

impl DenoisePass {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Godrays Denoise Layout"),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        Self {
            layout: Tracked::new(layout),
            uniforms: UniformSlot::new(DenoiseUniforms::default(), "Godrays Denoise Uniforms"),
            state: DenoiseState::new(),
            pipeline: None,
            bind_group: CachedBindGroup::default(),
        }
    }

    fn build_pipeline(&self, ctx: &mut PrepareContext, kernel: KernelSize) -> wgpu::RenderPipeline {
        log::debug!(
            "Compiling godrays denoise pipeline for kernel {} (radius {})",
            kernel.name(),
            kernel.radius()
        );

        let mut options = ShaderCompilationOptions::new();
        options.add_define("KSIZE", &kernel.radius().to_string());
        options.add_define(
            "struct_definitions",
            &DenoiseUniforms::wgsl_struct_def("DenoiseUniforms"),
        );

        let (module, _) =
            ctx.shader_manager
                .get_or_compile_template(ctx.device, "passes/godrays_denoise", &options);

        create_fullscreen_pipeline(
            ctx.device,
            &FullscreenPipelineDesc {
                label: "Godrays Denoise Pipeline",
                module,
                bind_group_layouts: &[&self.layout],
                color_target: replace_target(SCATTERING_FORMAT),
                depth_stencil: None,
            },
        )
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &DenoiseState {
        &self.state
    }

    pub fn invalidate(&mut self) {
        self.uniforms.mark_dirty();
        self.bind_group.invalidate();
    }

    pub fn release(&mut self) {
        self.pipeline = None;
        self.state.reset();
        self.bind_group.invalidate();
        self.uniforms.release();
    }
}

impl RenderNode for DenoisePass {
    fn name(&self) -> &'static str {
        "Godrays Denoise Pass"
    }

    fn prepare(&mut self, ctx: &mut PrepareContext) {
        let Some(blur) = ctx.params.blur() else {
            return;
        };

        // =====================================================================
        // 1. Kernel / variance reconciliation
        // =====================================================================
        if self.state.reconcile(&blur) == DenoiseChange::Rebuild || self.pipeline.is_none() {
            // the old pipeline is dropped before the replacement is built
            self.pipeline = None;
            self.pipeline = Some(self.build_pipeline(ctx, blur.kernel_size));
        }

        let low_res = ctx.resources.low_res.as_vec2();
        self.uniforms.set(DenoiseUniforms {
            texel_size: low_res.recip(),
            variance: blur.variance,
            spatial_sigma: spatial_sigma(blur.kernel_size),
        });
        self.uniforms.sync(ctx.device, ctx.queue);

        // =====================================================================
        // 2. Bind group (input = raw scattering)
        // =====================================================================
        let Some(buffer) = self.uniforms.buffer() else {
            return;
        };
        let input = ctx.resources.scattering;
        let key = BindGroupKey::new(self.layout.id())
            .with_resource(buffer.id())
            .with_resource(input.id());

        let device = ctx.device;
        let layout = &self.layout;
        self.bind_group.get_or_build(key, || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Godrays Denoise BindGroup"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                ],
            })
        });
    }

    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder) {
        let (Some(pipeline), Some(bind_group), Some(output)) =
            (&self.pipeline, self.bind_group.get(), ctx.resources.denoised)
        else {
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Godrays Denoise Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_change_rebuilds_and_variance_change_does_not() {
        let mut state = DenoiseState::new();
        let small = BlurParams::default();
        assert_eq!(state.reconcile(&small), DenoiseChange::Rebuild);
        assert_eq!(state.generation(), 1);
        assert_eq!(state.reconcile(&small), DenoiseChange::None);

        let softer = BlurParams {
            variance: 0.4,
            ..small
        };
        assert_eq!(state.reconcile(&softer), DenoiseChange::Uniform);
        assert_eq!(state.generation(), 1);

        let large = BlurParams {
            kernel_size: KernelSize::Large,
            ..softer
        };
        assert_eq!(state.reconcile(&large), DenoiseChange::Rebuild);
        assert_eq!(state.generation(), 2);
        assert_eq!(state.kernel(), Some(KernelSize::Large));
    }

    #[test]
    fn spatial_sigma_is_at_least_one_texel() {
        for &kernel in KernelSize::all() {
            assert!(spatial_sigma(kernel) >= 1.0);
        }
    }
}
