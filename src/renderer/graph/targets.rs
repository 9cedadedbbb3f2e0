//! Render Targets
//!
//! Sizing and lazy allocation of the textures the pipeline owns. Targets are
//! never shared with the host and are recreated only when their extent
//! actually changes.

use glam::Vec2;

use crate::renderer::core::Tracked;

/// Low-resolution scattering format: r = scattering, g = linear view depth.
pub const SCATTERING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetExtent {
    pub width: u32,
    pub height: u32,
}

impl TargetExtent {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `ceil(w * scale) x ceil(h * scale)`, never smaller than 1x1.
    #[must_use]
    pub fn scaled(self, scale: f32) -> Self {
        let scale_dim = |v: u32| ((v as f32 * scale).ceil() as u32).max(1);
        Self {
            width: scale_dim(self.width),
            height: scale_dim(self.height),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    #[inline]
    #[must_use]
    pub fn to_extent3d(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

// ============================================================================
// ResizeState
// ============================================================================

/// Output size and resolution scale, plus the low-resolution extent they imply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeState {
    full: Option<TargetExtent>,
    scale: f32,
}

impl ResizeState {
    #[must_use]
    pub fn new(scale: f32) -> Self {
        Self { full: None, scale }
    }

    /// Returns `true` if the size differs from the current one.
    pub fn set_size(&mut self, width: u32, height: u32) -> bool {
        let extent = TargetExtent::new(width.max(1), height.max(1));
        if self.full == Some(extent) {
            return false;
        }
        self.full = Some(extent);
        true
    }

    /// Returns `true` if the scale differs from the current one.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        if (self.scale - scale).abs() <= f32::EPSILON {
            return false;
        }
        self.scale = scale;
        true
    }

    #[inline]
    #[must_use]
    pub fn full(&self) -> Option<TargetExtent> {
        self.full
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn low_res(&self) -> Option<TargetExtent> {
        self.full.map(|full| full.scaled(self.scale))
    }
}

// ============================================================================
// TargetSlot
// ============================================================================

#[derive(Debug)]
struct Allocation {
    texture: wgpu::Texture,
    view: Tracked<wgpu::TextureView>,
    extent: TargetExtent,
    format: wgpu::TextureFormat,
}

/// A lazily allocated color target.
#[derive(Debug)]
pub struct TargetSlot {
    label: &'static str,
    allocation: Option<Allocation>,
    allocations: u32,
}

impl TargetSlot {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            allocation: None,
            allocations: 0,
        }
    }

    #[must_use]
    pub fn needs_allocation(&self, extent: TargetExtent, format: wgpu::TextureFormat) -> bool {
        self.allocation
            .as_ref()
            .is_none_or(|a| a.extent != extent || a.format != format)
    }

    /// Returns the target view, (re)allocating when the extent or format differ.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        extent: TargetExtent,
        format: wgpu::TextureFormat,
    ) -> &Tracked<wgpu::TextureView> {
        let allocation = match self.allocation.take() {
            Some(current) if current.extent == extent && current.format == format => current,
            previous => {
                if let Some(previous) = previous {
                    previous.texture.destroy();
                }
                self.allocations += 1;
                self.allocate(device, extent, format)
            }
        };
        &self.allocation.insert(allocation).view
    }

    fn allocate(
        &self,
        device: &wgpu::Device,
        extent: TargetExtent,
        format: wgpu::TextureFormat,
    ) -> Allocation {
        log::debug!(
            "Allocating {} target {}x{} ({format:?})",
            self.label,
            extent.width,
            extent.height
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(self.label),
            size: extent.to_extent3d(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Allocation {
            texture,
            view: Tracked::new(view),
            extent,
            format,
        }
    }

    #[inline]
    #[must_use]
    pub fn view(&self) -> Option<&Tracked<wgpu::TextureView>> {
        self.allocation.as_ref().map(|a| &a.view)
    }

    #[inline]
    #[must_use]
    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.allocation.as_ref().map(|a| &a.texture)
    }

    #[inline]
    #[must_use]
    pub fn extent(&self) -> Option<TargetExtent> {
        self.allocation.as_ref().map(|a| a.extent)
    }

    /// Number of textures created over the slot's lifetime.
    #[inline]
    #[must_use]
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    pub fn release(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            allocation.texture.destroy();
        }
    }
}
