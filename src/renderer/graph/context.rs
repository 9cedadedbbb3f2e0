//! Pass Contexts
//!
//! Two phase-separated views of one frame:
//!
//! - [`PrepareContext`]: mutable access to the shader cache plus everything a
//!   pass needs to build pipelines, upload uniforms and assemble bind groups.
//! - [`ExecuteContext`]: read-only; passes only record GPU commands.
//!
//! Both borrow the per-frame [`FrameResources`], so the orchestrator decides
//! the wiring (which texture feeds which pass) once and every pass sees the
//! same answer.

use crate::renderer::core::Tracked;
use crate::renderer::graph::frame::ScatteringSource;
use crate::renderer::graph::light_geometry::LightGeometry;
use crate::renderer::graph::targets::TargetExtent;
use crate::renderer::pipeline::ShaderManager;
use crate::resources::godrays::GodraysParams;
use crate::scene::camera::ViewCamera;
use crate::scene::light::LightSource;

/// Where the compositor writes.
#[derive(Debug, Clone, Copy)]
pub struct OutputTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

/// Texture wiring of one frame.
pub struct FrameResources<'a> {
    pub scene_color: &'a Tracked<wgpu::TextureView>,
    pub scene_depth: &'a Tracked<wgpu::TextureView>,
    /// Illumination output (low resolution).
    pub scattering: &'a Tracked<wgpu::TextureView>,
    /// Denoise output, allocated only while blur is enabled.
    pub denoised: Option<&'a Tracked<wgpu::TextureView>>,
    /// The depth view the raymarch samples (original map or its compatible copy).
    pub shadow: Option<&'a Tracked<wgpu::TextureView>>,
    pub noise: &'a Tracked<wgpu::TextureView>,
    pub noise_size: (u32, u32),
    pub output: OutputTarget<'a>,
    pub low_res: TargetExtent,
    pub full: TargetExtent,
    pub composite_source: ScatteringSource,
}

impl FrameResources<'_> {
    /// The texture the compositor upsamples this frame.
    #[must_use]
    pub fn composite_input(&self) -> &Tracked<wgpu::TextureView> {
        match (self.composite_source, self.denoised) {
            (ScatteringSource::Denoised, Some(view)) => view,
            _ => self.scattering,
        }
    }
}

/// Mutable context for the prepare phase.
pub struct PrepareContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub shader_manager: &'a mut ShaderManager,
    pub params: &'a GodraysParams,
    pub camera: &'a ViewCamera,
    pub light: &'a LightSource,
    pub geometry: &'a LightGeometry,
    pub resources: &'a FrameResources<'a>,
}

/// Read-only context for the execute phase.
pub struct ExecuteContext<'a> {
    pub resources: &'a FrameResources<'a>,
}
