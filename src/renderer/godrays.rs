//! Godrays Pipeline
//!
//! Owns the passes, their render targets and the state that sequences them
//! frame to frame. One instance renders the scattering of exactly one light.
//!
//! # Frame
//!
//! ```text
//! poll noise ─> size targets ─> shadow latch ─> [depth copy] ─> plan
//!            ─> prepare passes ─> record passes ─> restore shadow binding
//! ```
//!
//! # Lifecycle
//!
//! Targets are allocated lazily on the first frame after `set_size` and are
//! recreated only when the size, resolution scale or blur toggle demand it.
//! `dispose` releases every GPU resource and is safe to call repeatedly; it
//! also runs on drop.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::errors::{GodraysError, Result};
use crate::renderer::core::Tracked;
use crate::renderer::graph::context::{ExecuteContext, FrameResources, OutputTarget, PrepareContext};
use crate::renderer::graph::frame::{FramePlan, FrameStep, PlanInputs, ScatteringSource};
use crate::renderer::graph::latch::{DepthBinding, ResourceLatch};
use crate::renderer::graph::light_geometry::LightGeometry;
use crate::renderer::graph::node::RenderNode;
use crate::renderer::graph::passes::{
    CompositeInputs, CompositorPass, DenoisePass, DepthCopyPass, IlluminationPass,
};
use crate::renderer::graph::targets::{ResizeState, SCATTERING_FORMAT, TargetExtent, TargetSlot};
use crate::renderer::pipeline::ShaderManager;
use crate::resources::godrays::{DepthPacking, GodraysParams, GodraysParamsPatch};
use crate::resources::noise::{NoiseImage, NoiseLoader, NoisePoll};
use crate::scene::camera::ViewCamera;
use crate::scene::light::LightSource;

bitflags! {
    /// State changed since the last rendered frame.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DirtyFlags: u32 {
        /// Parameters changed: every pass re-pushes its uniforms.
        const PARAMS   = 1 << 0;
        /// Output size or resolution scale changed.
        const TARGETS  = 1 << 1;
        /// A bound texture was replaced: bind groups are rebuilt.
        const BINDINGS = 1 << 2;
    }
}

/// Per-frame inputs borrowed from the host.
pub struct GodraysFrame<'a> {
    pub light: &'a LightSource,
    pub camera: &'a ViewCamera,
    /// Scene color the scattering is added over.
    pub input_color: &'a Tracked<wgpu::TextureView>,
    /// Format of `input_color`; also the format of the intermediate output.
    pub input_format: wgpu::TextureFormat,
    /// Presentation view, written when the pipeline renders to screen.
    pub output: Option<OutputTarget<'a>>,
}

/// Where the compositor wrote this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDestination {
    Screen,
    /// The pipeline's own target, see [`GodraysPipeline::output_view`].
    Intermediate(u64),
}

/// What one `render` call did, by resource identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub plan: FramePlan,
    pub low_res: TargetExtent,
    pub full: TargetExtent,
    pub shadow_ready: bool,
    /// Textures the compositor read.
    pub composite_inputs: Option<CompositeInputs>,
    /// Shadow view bound for the raymarch (the compatible copy when one ran).
    pub illumination_shadow: Option<u64>,
    /// Shadow binding after the frame, i.e. the host's original view.
    pub restored_shadow: Option<u64>,
    pub depth_copied: bool,
    pub denoise_generation: u64,
    pub output: OutputDestination,
    /// Scattering textures created so far.
    pub scattering_allocations: u32,
    /// Names of the passes recorded, in order.
    pub passes: SmallVec<[&'static str; 3]>,
}

impl FrameReport {
    #[must_use]
    pub fn composite_source(&self) -> ScatteringSource {
        self.plan.composite_source()
    }
}

/// Jitter texture currently bound to the raymarch.
struct NoiseBinding {
    texture: wgpu::Texture,
    view: Tracked<wgpu::TextureView>,
    size: (u32, u32),
}

impl NoiseBinding {
    /// 1x1 zero texel: no jitter until a real image arrives.
    fn placeholder(device: &wgpu::Device) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Godrays Noise Placeholder"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view: Tracked::new(view),
            size: (1, 1),
        }
    }

    fn upload(device: &wgpu::Device, queue: &wgpu::Queue, image: &NoiseImage) -> Self {
        let texture = image.upload(device, queue);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view: Tracked::new(view),
            size: (image.width(), image.height()),
        }
    }
}

pub struct GodraysPipeline {
    params: GodraysParams,
    geometry: LightGeometry,
    resize: ResizeState,
    dirty: DirtyFlags,
    render_to_screen: bool,
    light_is_point: bool,

    shader_manager: ShaderManager,
    illumination: IlluminationPass,
    denoise: Option<DenoisePass>,
    compositor: CompositorPass,
    depth_copy: Option<DepthCopyPass>,

    scattering: TargetSlot,
    denoised: TargetSlot,
    output: TargetSlot,

    scene_depth: Option<Tracked<wgpu::TextureView>>,
    shadow_binding: DepthBinding<Tracked<wgpu::TextureView>>,
    latch: ResourceLatch,

    noise: Option<NoiseBinding>,
    pending_noise: Option<NoiseImage>,
    noise_loader: Option<NoiseLoader>,

    disposed: bool,
}

impl GodraysPipeline {
    /// Creates the pipeline for `light`.
    ///
    /// Fails if the light does not cast shadows or the patch is invalid.
    pub fn new(
        device: &wgpu::Device,
        light: &LightSource,
        camera: &ViewCamera,
        patch: &GodraysParamsPatch,
    ) -> Result<Self> {
        let params = GodraysParams::from_patch(patch)?;

        let mut geometry = LightGeometry::new();
        geometry.update(light)?;

        log::debug!(
            "Creating godrays pipeline ({}, camera near {} far {})",
            light.kind.define_key(),
            camera.near,
            camera.far
        );

        Ok(Self {
            resize: ResizeState::new(params.resolution_scale()),
            params,
            geometry,
            dirty: DirtyFlags::all(),
            render_to_screen: false,
            light_is_point: light.kind.is_point(),
            shader_manager: ShaderManager::new(),
            illumination: IlluminationPass::new(device, &light.kind),
            denoise: None,
            compositor: CompositorPass::new(device),
            depth_copy: None,
            scattering: TargetSlot::new("Godrays Scattering"),
            denoised: TargetSlot::new("Godrays Denoised"),
            output: TargetSlot::new("Godrays Output"),
            scene_depth: None,
            shadow_binding: DepthBinding::new(),
            latch: ResourceLatch::new(),
            noise: Some(NoiseBinding::placeholder(device)),
            pending_noise: None,
            noise_loader: None,
            disposed: false,
        })
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Merges `patch` over the current parameters.
    ///
    /// On error the current parameters are left untouched.
    pub fn set_params(&mut self, patch: &GodraysParamsPatch) -> Result<()> {
        self.ensure_alive()?;
        let next = self.params.apply(patch)?;
        if next == self.params {
            return Ok(());
        }
        if self.resize.set_scale(next.resolution_scale()) {
            self.dirty |= DirtyFlags::TARGETS;
        }
        self.params = next;
        self.dirty |= DirtyFlags::PARAMS;
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &GodraysParams {
        &self.params
    }

    /// Sets the full output size. Repeating the current size is a no-op.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.resize.set_size(width, height) {
            self.dirty |= DirtyFlags::TARGETS;
        }
    }

    /// Sets the scene depth the raymarch reconstructs positions from.
    pub fn set_depth_texture(
        &mut self,
        view: Tracked<wgpu::TextureView>,
        packing: DepthPacking,
    ) -> Result<()> {
        self.ensure_alive()?;
        if packing != DepthPacking::Basic {
            return Err(GodraysError::UnsupportedDepthPacking(packing));
        }
        if self.scene_depth.as_ref().map(Tracked::id) != Some(view.id()) {
            self.scene_depth = Some(view);
            self.dirty |= DirtyFlags::BINDINGS;
        }
        Ok(())
    }

    /// Replaces the jitter noise; uploaded on the next frame.
    pub fn set_noise_texture(&mut self, image: NoiseImage) {
        self.pending_noise = Some(image);
        self.noise_loader = None;
    }

    /// Polls `loader` every frame until the noise arrives.
    pub fn set_noise_loader(&mut self, loader: NoiseLoader) {
        self.noise_loader = Some(loader);
    }

    /// Writes straight to the frame's output view instead of the intermediate target.
    pub fn set_render_to_screen(&mut self, render_to_screen: bool) {
        self.render_to_screen = render_to_screen;
    }

    #[inline]
    #[must_use]
    pub fn render_to_screen(&self) -> bool {
        self.render_to_screen
    }

    /// The intermediate output, when not rendering to screen.
    #[must_use]
    pub fn output_view(&self) -> Option<&Tracked<wgpu::TextureView>> {
        self.output.view()
    }

    #[inline]
    #[must_use]
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.disposed {
            return Err(GodraysError::Disposed);
        }
        Ok(())
    }

    // ========================================================================
    // Per-frame steps
    // ========================================================================

    fn poll_noise(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if let Some(loader) = &self.noise_loader {
            match loader.poll() {
                NoisePoll::Pending => {}
                NoisePoll::Ready(Ok(image)) => {
                    log::debug!("Noise texture ready ({}x{})", image.width(), image.height());
                    self.pending_noise = Some(image);
                    self.noise_loader = None;
                }
                NoisePoll::Ready(Err(err)) => {
                    log::warn!("Noise texture failed to load, rendering without jitter: {err}");
                    self.noise_loader = None;
                }
                NoisePoll::Disconnected => {
                    log::warn!("Noise loader disconnected, rendering without jitter");
                    self.noise_loader = None;
                }
            }
        }

        if let Some(image) = self.pending_noise.take() {
            if let Some(old) = self.noise.take() {
                old.texture.destroy();
            }
            self.noise = Some(NoiseBinding::upload(device, queue, &image));
            self.dirty |= DirtyFlags::BINDINGS;
        }
    }

    /// Tracks the host's shadow map: latch, binding identity, compat copy.
    ///
    /// Returns `(shadow_ready, depth_copied)`.
    fn sync_shadow(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        light: &LightSource,
    ) -> (bool, bool) {
        let map = light.shadow_map();

        if self.latch.observe(map.is_some()) {
            log::debug!("Shadow map available, godrays enabled");
            self.dirty |= DirtyFlags::PARAMS | DirtyFlags::BINDINGS;
        }

        let Some(map) = map else {
            self.shadow_binding.unbind();
            return (false, false);
        };

        if self.shadow_binding.original().map(Tracked::id) != Some(map.view.id()) {
            self.shadow_binding.bind(map.view.clone());
            self.dirty |= DirtyFlags::BINDINGS;
        }

        let mut copied = false;
        if map.requires_compat_copy() {
            let depth_copy = self
                .depth_copy
                .get_or_insert_with(|| DepthCopyPass::new(device));
            if depth_copy.prepare(device, &mut self.shader_manager, map) {
                depth_copy.encode(encoder, map);
                copied = true;
            }
            if let Some(view) = depth_copy.view() {
                self.shadow_binding.substitute(view.clone());
            }
        } else if let Some(mut depth_copy) = self.depth_copy.take() {
            depth_copy.release();
        }

        (self.latch.is_ready(), copied)
    }

    fn invalidate_passes(&mut self) {
        self.illumination.invalidate();
        if let Some(denoise) = &mut self.denoise {
            denoise.invalidate();
        }
        self.compositor.invalidate();
    }

    /// Renders one frame of godrays into `encoder`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        frame: &GodraysFrame,
    ) -> Result<FrameReport> {
        self.ensure_alive()?;

        let Some(full) = self.resize.full() else {
            return Err(GodraysError::SizeNotSet);
        };
        let Some(low_res) = self.resize.low_res() else {
            return Err(GodraysError::SizeNotSet);
        };
        if self.scene_depth.is_none() {
            log::warn!("Godrays frame skipped: no scene depth texture");
            return Err(GodraysError::MissingSceneDepth);
        }

        // =====================================================================
        // 1. Light
        // =====================================================================
        if frame.light.kind.is_point() != self.light_is_point {
            log::debug!("Light type changed to {}", frame.light.kind.define_key());
            self.illumination.release();
            self.illumination = IlluminationPass::new(device, &frame.light.kind);
            self.light_is_point = frame.light.kind.is_point();
            self.latch.reset();
            self.shadow_binding.unbind();
        }
        if self.geometry.update(frame.light)? {
            log::trace!("Light geometry recomputed");
        }

        // =====================================================================
        // 2. Noise, shadow latch, depth compatibility copy
        // =====================================================================
        self.poll_noise(device, queue);
        let (shadow_ready, depth_copied) = self.sync_shadow(device, encoder, frame.light);

        let blur = self.params.blur().is_some();
        let plan = FramePlan::build(PlanInputs {
            shadow_ready,
            copy_shadow_depth: depth_copied,
            blur,
        });

        if self.dirty.intersects(DirtyFlags::PARAMS | DirtyFlags::BINDINGS) {
            self.invalidate_passes();
        }
        if self.dirty.contains(DirtyFlags::TARGETS) {
            log::debug!(
                "Godrays targets {}x{} (full {}x{})",
                low_res.width,
                low_res.height,
                full.width,
                full.height
            );
        }

        // =====================================================================
        // 3. Targets
        // =====================================================================
        let scattering = self.scattering.ensure(device, low_res, SCATTERING_FORMAT);
        let denoised = if plan.contains(FrameStep::Denoise) {
            Some(self.denoised.ensure(device, low_res, SCATTERING_FORMAT))
        } else {
            if !blur {
                self.denoised.release();
            }
            None
        };

        let (output, destination) = match (self.render_to_screen, frame.output) {
            (true, Some(target)) => {
                self.output.release();
                (target, OutputDestination::Screen)
            }
            (to_screen, _) => {
                if to_screen {
                    log::warn!("render_to_screen is set but the frame has no output view");
                }
                let view = self.output.ensure(device, full, frame.input_format);
                (
                    OutputTarget {
                        view,
                        format: frame.input_format,
                    },
                    OutputDestination::Intermediate(view.id()),
                )
            }
        };

        let Some(scene_depth) = self.scene_depth.as_ref() else {
            return Err(GodraysError::MissingSceneDepth);
        };
        let Some(noise) = self.noise.as_ref() else {
            return Err(GodraysError::Disposed);
        };

        // =====================================================================
        // 4. Prepare + record
        // =====================================================================
        let resources = FrameResources {
            scene_color: frame.input_color,
            scene_depth,
            scattering,
            denoised,
            shadow: if shadow_ready {
                self.shadow_binding.active()
            } else {
                None
            },
            noise: &noise.view,
            noise_size: noise.size,
            output,
            low_res,
            full,
            composite_source: plan.composite_source(),
        };

        let mut ctx = PrepareContext {
            device,
            queue,
            shader_manager: &mut self.shader_manager,
            params: &self.params,
            camera: frame.camera,
            light: frame.light,
            geometry: &self.geometry,
            resources: &resources,
        };

        self.illumination.prepare(&mut ctx);
        if plan.contains(FrameStep::Denoise) {
            self.denoise
                .get_or_insert_with(|| DenoisePass::new(device))
                .prepare(&mut ctx);
        }
        self.compositor.prepare(&mut ctx);

        let exec = ExecuteContext {
            resources: &resources,
        };

        let mut nodes: SmallVec<[&dyn RenderNode; 3]> = SmallVec::new();
        nodes.push(&self.illumination);
        if plan.contains(FrameStep::Denoise)
            && let Some(denoise) = &self.denoise
        {
            nodes.push(denoise);
        }
        nodes.push(&self.compositor);

        encoder.push_debug_group("Godrays");
        for node in &nodes {
            encoder.push_debug_group(node.name());
            node.run(&exec, encoder);
            encoder.pop_debug_group();
        }
        encoder.pop_debug_group();
        let passes = nodes.iter().map(|node| node.name()).collect();

        // =====================================================================
        // 5. Restore + report
        // =====================================================================
        let illumination_shadow = self.illumination.bound_shadow();
        self.shadow_binding.restore();
        self.dirty = DirtyFlags::empty();

        Ok(FrameReport {
            plan,
            low_res,
            full,
            shadow_ready,
            composite_inputs: self.compositor.inputs(),
            illumination_shadow,
            restored_shadow: self.shadow_binding.active().map(Tracked::id),
            depth_copied,
            denoise_generation: self
                .denoise
                .as_ref()
                .map_or(0, |denoise| denoise.state().generation()),
            output: destination,
            scattering_allocations: self.scattering.allocations(),
            passes,
        })
    }

    // ========================================================================
    // Disposal
    // ========================================================================

    /// Releases every GPU resource. Further calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        log::debug!("Disposing godrays pipeline");

        self.illumination.release();
        if let Some(mut denoise) = self.denoise.take() {
            denoise.release();
        }
        self.compositor.release();
        if let Some(mut depth_copy) = self.depth_copy.take() {
            depth_copy.release();
        }

        self.scattering.release();
        self.denoised.release();
        self.output.release();

        if let Some(noise) = self.noise.take() {
            noise.texture.destroy();
        }
        self.pending_noise = None;
        self.noise_loader = None;
        self.scene_depth = None;
        self.shadow_binding.unbind();
        self.shader_manager.clear();
        self.disposed = true;
    }
}

impl Drop for GodraysPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}
